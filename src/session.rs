//! Step-by-step operator runs over a [`Notifier`].
//!
//! A failed remote step is logged and the run carries on with the next one.
//! The failure only shows in [`Session::succeeded`], which the binary turns
//! into its exit status.

use crate::console::{self, OperatorGate};
use crate::driver::{Notifier, TopicPager};
use crate::error::{RemoteServiceError, Result};
use crate::model::{DeleteOutcome, Message, Protocol};
use crate::service::NotificationService;
use tokio::io::AsyncBufRead;

pub const RECEIVE_PROMPT: &str = "Please check your email and press enter when you receive the message...";
pub const SUBSCRIBE_PROMPT: &str = "Please check your email and press enter when you are subscribed...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Inputs of a full create, subscribe, publish, list and delete run.
#[derive(Debug, Clone)]
pub struct Walkthrough {
    pub name: String,
    pub display_name: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

pub struct Session<S, R> {
    notifier: Notifier<S>,
    gate: OperatorGate<R>,
    failed: bool,
}

impl<S: NotificationService, R: AsyncBufRead + Unpin> Session<S, R> {
    pub fn new(notifier: Notifier<S>, gate: OperatorGate<R>) -> Self {
        Self {
            notifier,
            gate,
            failed: false,
        }
    }

    pub fn gate(&self) -> &OperatorGate<R> {
        &self.gate
    }

    /// Whether every remote step so far succeeded.
    pub fn succeeded(&self) -> bool {
        !self.failed
    }

    fn settle<T>(&mut self, result: std::result::Result<T, RemoteServiceError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                console::report(&e);
                self.failed = true;
                None
            }
        }
    }

    /// Publishes, then waits for the operator to see the message arrive.
    pub async fn publish(&mut self, message: Message) -> Result<()> {
        let result = self.notifier.publish(&message).await;
        if let Some(message_id) = self.settle(result) {
            match message_id {
                Some(id) => println!("Published message {id}"),
                None => println!("Published message"),
            }
            self.gate.wait(RECEIVE_PROMPT).await?;
        }
        Ok(())
    }

    /// Subscribes, then waits for the operator while the subscription is
    /// unconfirmed. A failed subscription that would have needed
    /// confirmation still waits.
    pub async fn subscribe(&mut self, topic_arn: &str, protocol: Protocol, endpoint: &str) -> Result<()> {
        let result = self.notifier.subscribe(topic_arn, protocol, endpoint).await;
        let pending = match self.settle(result) {
            Some(receipt) => match &receipt.subscription_arn {
                Some(arn) => {
                    println!("Subscribed {endpoint}: {arn}");
                    false
                }
                None => {
                    println!("Subscription for {endpoint} is pending confirmation");
                    true
                }
            },
            None => protocol.requires_confirmation(),
        };
        if pending {
            self.gate.wait(SUBSCRIBE_PROMPT).await?;
        }
        Ok(())
    }

    pub async fn list(&mut self, starting_token: Option<String>, format: OutputFormat) -> Result<()> {
        let mut pager = TopicPager::resume(self.notifier.service(), starting_token);
        let mut records = Vec::new();
        let mut interrupted = None;
        loop {
            match pager.next_page().await {
                Ok(Some(page)) => match format {
                    OutputFormat::Text => print!("{}", console::render_topics(&page)),
                    OutputFormat::Json => records.extend(page),
                },
                Ok(None) => break,
                Err(e) => {
                    if let Some(token) = pager.next_token() {
                        tracing::warn!(token, "listing interrupted, resume with --starting-token");
                    }
                    interrupted = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = interrupted {
            console::report(&e);
            self.failed = true;
        }

        if format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Ok(())
    }

    /// Returns the topic ARN when the topic exists afterwards, even if its
    /// display name could not be set.
    pub async fn create(&mut self, name: &str, display_name: &str) -> Option<String> {
        let result = self.notifier.create_topic(name, display_name).await;
        let created = self.settle(result)?;
        println!("Created topic {}", created.topic_arn);
        if let Some(e) = &created.attribute_error {
            console::report(e);
            self.failed = true;
        }
        Some(created.topic_arn)
    }

    pub async fn delete(&mut self, topic_arn: &str) {
        let result = self.notifier.delete_topic(topic_arn).await;
        match self.settle(result) {
            Some(DeleteOutcome::Deleted) => println!("Deleted topic {topic_arn}"),
            Some(DeleteOutcome::AlreadyDeleted) => println!("Topic {topic_arn} was already deleted"),
            None => {}
        }
    }

    /// Runs every step in order. Only a failed create stops the run, since
    /// there is no topic for the later steps to work on.
    pub async fn walkthrough(&mut self, plan: Walkthrough) -> Result<()> {
        let Some(topic_arn) = self.create(&plan.name, &plan.display_name).await else {
            return Ok(());
        };
        self.subscribe(&topic_arn, Protocol::Email, &plan.recipient).await?;
        self.publish(Message::new(topic_arn.clone(), plan.subject, plan.body))
            .await?;
        self.list(None, OutputFormat::Text).await?;
        self.delete(&topic_arn).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::local::state::Fault;
    use crate::local::{LocalOptions, LocalSns};
    use crate::service::SnsService;
    use url::Url;

    type LocalSession = Session<SnsService, &'static [u8]>;

    async fn start(input: &'static [u8]) -> (LocalSns, LocalSession) {
        let local = LocalSns::new(LocalOptions {
            region: "eu-central-1".to_string(),
            page_size: 2,
        });
        let (addr, _server) = local.spawn().await.unwrap();
        let endpoint = Url::parse(&format!("http://{addr}")).unwrap();
        let settings = Settings::local(endpoint, local.region());
        let notifier = Notifier::new(SnsService::connect(&settings).await);
        (local, Session::new(notifier, OperatorGate::new(input, true)))
    }

    fn plan() -> Walkthrough {
        Walkthrough {
            name: "Muster".to_string(),
            display_name: "Muster".to_string(),
            recipient: "ops@example.com".to_string(),
            subject: "S".to_string(),
            body: "M".to_string(),
        }
    }

    #[tokio::test]
    async fn clean_walkthrough_succeeds() {
        let (local, mut session) = start(b"\n\n").await;

        session.walkthrough(plan()).await.unwrap();

        assert!(session.succeeded());
        assert_eq!(session.gate().acknowledged(), 2);
        assert_eq!(local.calls_for("Publish").len(), 1);
        assert_eq!(local.calls_for("DeleteTopic").len(), 1);
        assert!(local.topic_arns().is_empty());
    }

    #[tokio::test]
    async fn failed_step_marks_the_run_failed() {
        let (local, mut session) = start(b"\n").await;
        let topic_arn = session.create("zebra", "Zebra").await.unwrap();
        assert!(session.succeeded());
        local.inject_fault("Publish", Fault::internal("backend unavailable"));

        session.publish(Message::new(topic_arn, "S", "M")).await.unwrap();

        assert!(!session.succeeded());
        assert_eq!(session.gate().acknowledged(), 0);
    }

    #[tokio::test]
    async fn walkthrough_continues_after_failed_publish() {
        let (local, mut session) = start(b"\n\n").await;
        local.inject_fault("Publish", Fault::internal("backend unavailable"));

        session.walkthrough(plan()).await.unwrap();

        assert!(!session.succeeded());
        assert_eq!(local.calls_for("Publish").len(), 1);
        assert_eq!(local.calls_for("ListTopics").len(), 1);
        assert_eq!(local.calls_for("DeleteTopic").len(), 1);
        assert!(local.topic_arns().is_empty());
        // Only the subscription gate was reached.
        assert_eq!(session.gate().acknowledged(), 1);
    }

    #[tokio::test]
    async fn failed_create_stops_the_walkthrough() {
        let (local, mut session) = start(b"\n\n").await;
        local.inject_fault("CreateTopic", Fault::internal("backend unavailable"));

        session.walkthrough(plan()).await.unwrap();

        assert!(!session.succeeded());
        assert!(local.calls_for("Subscribe").is_empty());
        assert!(local.calls_for("DeleteTopic").is_empty());
    }

    #[tokio::test]
    async fn one_gate_line_per_pending_subscription() {
        let (_local, mut session) = start(b"first\nsecond\nthird\n").await;
        let topic_arn = session.create("zebra", "Zebra").await.unwrap();

        session.subscribe(&topic_arn, Protocol::Email, "ops@example.com").await.unwrap();
        session
            .subscribe(&topic_arn, Protocol::Sqs, "arn:aws:sqs:eu-central-1:000000000000:inbox")
            .await
            .unwrap();
        session.subscribe(&topic_arn, Protocol::Https, "https://hooks.example.com").await.unwrap();

        assert_eq!(session.gate().acknowledged(), 2);
        assert!(session.succeeded());
    }

    #[tokio::test]
    async fn failed_email_subscription_still_waits() {
        let (local, mut session) = start(b"\n").await;
        let topic_arn = session.create("zebra", "Zebra").await.unwrap();
        local.inject_fault("Subscribe", Fault::internal("backend unavailable"));

        session.subscribe(&topic_arn, Protocol::Email, "ops@example.com").await.unwrap();

        assert!(!session.succeeded());
        assert_eq!(session.gate().acknowledged(), 1);
    }

    #[tokio::test]
    async fn interrupted_listing_marks_the_run_failed() {
        let (local, mut session) = start(b"").await;
        session.create("zebra", "Zebra").await.unwrap();
        local.inject_fault("GetTopicAttributes", Fault::internal("backend unavailable"));

        session.list(None, OutputFormat::Json).await.unwrap();

        assert!(!session.succeeded());
        assert_eq!(local.calls_for("GetTopicAttributes").len(), 1);
    }
}
