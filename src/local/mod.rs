//! In-memory SNS-compatible endpoint.
//!
//! Speaks the subset of the AWS Query protocol the notifier uses, records
//! every request it receives and can be told to fail chosen actions. Point
//! the notifier at it with `--endpoint-url` to run without an AWS account.

mod error;
mod handlers;
mod responses;
pub mod state;

use crate::local::handlers::handle_aws_request;
use crate::local::state::{AppState, Fault, Message, RecordedCall, SharedState, Topic};
use axum::Router;
use axum::routing::post;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Default number of topics per `ListTopics` page, as on the real service.
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// Largest page size `serve-local` accepts.
pub const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
pub struct LocalOptions {
    pub region: String,
    pub page_size: usize,
}

impl Default for LocalOptions {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Handle on a local endpoint's state. Cheap to clone.
#[derive(Clone)]
pub struct LocalSns {
    state: SharedState,
}

impl LocalSns {
    pub fn new(options: LocalOptions) -> Self {
        Self {
            state: Arc::new(AppState::new(options.region, options.page_size)),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", post(handle_aws_request))
            .with_state(self.state.clone())
    }

    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!("listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router().into_make_service()).await
    }

    /// Serves on an ephemeral loopback port in the background.
    pub async fn spawn(&self) -> std::io::Result<(SocketAddr, JoinHandle<std::io::Result<()>>)> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(self.clone().serve(listener));
        Ok((addr, handle))
    }

    pub fn region(&self) -> &str {
        &self.state.region
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    pub fn calls_for(&self, action: &str) -> Vec<RecordedCall> {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|call| call.request.action == action)
            .cloned()
            .collect()
    }

    /// Makes every following request for `action` fail with `fault`.
    pub fn inject_fault(&self, action: &str, fault: Fault) {
        self.state.faults.insert(action.to_string(), fault);
    }

    pub fn clear_faults(&self) {
        self.state.faults.clear();
    }

    pub fn topic_arns(&self) -> Vec<String> {
        let mut arns = self
            .state
            .topics
            .iter()
            .map(|topic| topic.arn.clone())
            .collect::<Vec<_>>();
        arns.sort();
        arns
    }

    /// Registers a topic under exactly `topic_arn`, whatever its form.
    pub fn insert_topic(&self, topic_arn: &str) {
        self.state
            .topics
            .entry(topic_arn.to_string())
            .or_insert_with(|| Topic::with_arn(topic_arn));
    }

    /// Messages published to the topic with this ARN.
    pub fn messages(&self, topic_arn: &str) -> Vec<Message> {
        self.state
            .topics
            .get(topic_arn)
            .map(|topic| topic.messages.clone())
            .unwrap_or_default()
    }
}

impl Default for LocalSns {
    fn default() -> Self {
        Self::new(LocalOptions::default())
    }
}
