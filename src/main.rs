use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use sns_notifier::config::{Overrides, Settings};
use sns_notifier::console::OperatorGate;
use sns_notifier::error::Result;
use sns_notifier::local::{DEFAULT_PAGE_SIZE, LocalOptions, LocalSns, MAX_PAGE_SIZE};
use sns_notifier::model::{Message, Protocol};
use sns_notifier::session::{OutputFormat, Session, Walkthrough};
use sns_notifier::{Notifier, SnsService};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Publish, subscribe and manage topics on the notification service.
#[derive(Parser, Debug)]
#[command(name = "sns-notifier", version, about)]
struct Cli {
    /// TOML file with region, credential_source, default_topic, default_recipient, endpoint_url
    #[arg(long, env = "NOTIFIER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[arg(long, env = "NOTIFIER_REGION", global = true)]
    region: Option<String>,

    /// default | profile:<name> | static:<access-key-id>:<secret-access-key>
    #[arg(long = "credentials", env = "NOTIFIER_CREDENTIALS", global = true)]
    credential_source: Option<String>,

    /// Topic ARN used when a command is not given one.
    #[arg(long, env = "NOTIFIER_DEFAULT_TOPIC", global = true)]
    default_topic: Option<String>,

    /// Subscription endpoint used when a command is not given one.
    #[arg(long, env = "NOTIFIER_DEFAULT_RECIPIENT", global = true)]
    default_recipient: Option<String>,

    /// Send requests to this endpoint instead of the regional one.
    #[arg(long, env = "NOTIFIER_ENDPOINT_URL", global = true)]
    endpoint_url: Option<String>,

    /// Do not wait for the operator after out-of-band steps.
    #[arg(long, env = "NOTIFIER_NO_WAIT", global = true)]
    no_wait: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Notify(NotifyCommand),
    /// Run the in-memory SNS-compatible endpoint.
    ServeLocal {
        #[arg(long, default_value = "127.0.0.1:9911")]
        listen: SocketAddr,
        #[arg(
            long,
            default_value_t = DEFAULT_PAGE_SIZE,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_PAGE_SIZE as u64)
        )]
        page_size: usize,
    },
}

#[derive(Subcommand, Debug)]
enum NotifyCommand {
    /// Publish one message to a topic.
    Publish {
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        message: String,
    },
    /// Subscribe an endpoint to a topic.
    Subscribe {
        #[arg(long)]
        topic: Option<String>,
        #[arg(long, default_value = "email")]
        protocol: Protocol,
        #[arg(long)]
        endpoint: Option<String>,
    },
    /// List every topic with its attributes.
    ListTopics {
        /// Continue an interrupted listing from this token.
        #[arg(long)]
        starting_token: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Create a topic and set its display name.
    CreateTopic {
        #[arg(long)]
        name: String,
        #[arg(long)]
        display_name: String,
    },
    /// Delete a topic. Deleting a missing topic is not an error.
    DeleteTopic {
        #[arg(long)]
        topic: Option<String>,
    },
    /// Create, subscribe, publish, list and delete in one run.
    Walkthrough {
        #[arg(long)]
        name: String,
        #[arg(long)]
        display_name: String,
        #[arg(long)]
        recipient: Option<String>,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        message: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every remote step succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let overrides = Overrides {
        region: cli.region,
        credential_source: cli.credential_source,
        default_topic: cli.default_topic,
        default_recipient: cli.default_recipient,
        endpoint_url: cli.endpoint_url,
        no_wait: cli.no_wait,
    };
    let settings = Settings::load(cli.config.as_deref(), overrides)?;

    match cli.command {
        Command::ServeLocal { listen, page_size } => {
            serve_local(&settings, listen, page_size).await?;
            Ok(true)
        }
        Command::Notify(command) => notify(&settings, command).await,
    }
}

async fn serve_local(settings: &Settings, listen: SocketAddr, page_size: usize) -> Result<()> {
    let options = LocalOptions {
        region: settings
            .region
            .clone()
            .unwrap_or_else(|| LocalOptions::default().region),
        page_size,
    };
    let listener = TcpListener::bind(listen).await?;
    LocalSns::new(options).serve(listener).await?;
    Ok(())
}

async fn notify(settings: &Settings, command: NotifyCommand) -> Result<bool> {
    tracing::info!(
        region = ?settings.region,
        endpoint_url = ?settings.endpoint_url.as_ref().map(|u| u.as_str()),
        "connecting to notification service"
    );
    let mut session = Session::new(
        Notifier::new(SnsService::connect(settings).await),
        OperatorGate::stdin(settings.wait_for_operator),
    );

    match command {
        NotifyCommand::Publish { topic, subject, message } => {
            let topic = settings.topic_or_default(topic)?;
            session.publish(Message::new(topic, subject, message)).await?;
        }
        NotifyCommand::Subscribe { topic, protocol, endpoint } => {
            let topic = settings.topic_or_default(topic)?;
            let endpoint = settings.recipient_or_default(endpoint)?;
            session.subscribe(&topic, protocol, &endpoint).await?;
        }
        NotifyCommand::ListTopics { starting_token, format } => {
            session.list(starting_token, format).await?;
        }
        NotifyCommand::CreateTopic { name, display_name } => {
            session.create(&name, &display_name).await;
        }
        NotifyCommand::DeleteTopic { topic } => {
            let topic = settings.topic_or_default(topic)?;
            session.delete(&topic).await;
        }
        NotifyCommand::Walkthrough {
            name,
            display_name,
            recipient,
            subject,
            message,
        } => {
            let plan = Walkthrough {
                name,
                display_name,
                recipient: settings.recipient_or_default(recipient)?,
                subject,
                body: message,
            };
            session.walkthrough(plan).await?;
        }
    }

    Ok(session.succeeded())
}
