use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Account id used in every ARN the local endpoint hands out.
pub const ACCOUNT_ID: &str = "000000000000";

// 1. Core Data Structures
#[derive(Debug, Clone)]
pub struct Topic {
    pub name: String,
    pub arn: String,
    pub attributes: BTreeMap<String, String>,
    pub subscriptions: Vec<Subscription>,
    pub messages: Vec<Message>,
}

impl Topic {
    pub fn new(name: String, region: &str) -> Self {
        let arn = format!("arn:aws:sns:{region}:{ACCOUNT_ID}:{name}");
        Self {
            name,
            arn,
            attributes: BTreeMap::new(),
            subscriptions: vec![],
            messages: vec![],
        }
    }

    /// A topic registered under an ARN handed in from outside, in any form.
    pub fn with_arn(arn: &str) -> Self {
        Self {
            name: arn.rsplit(':').next().unwrap_or_default().to_string(),
            arn: arn.to_string(),
            attributes: BTreeMap::new(),
            subscriptions: vec![],
            messages: vec![],
        }
    }

    pub fn pending_subscriptions(&self) -> usize {
        self.subscriptions.iter().filter(|s| s.pending).count()
    }

    pub fn confirmed_subscriptions(&self) -> usize {
        self.subscriptions.len() - self.pending_subscriptions()
    }
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub endpoint: String,
    pub protocol: String,
    pub topic_arn: String,
    pub subscription_arn: String,
    pub pending: bool,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub subject: Option<String>,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

/// An SNS error answer: either produced by a handler or injected by a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: String,
    pub message: String,
    pub status: StatusCode,
}

impl Fault {
    pub fn new(code: impl Into<String>, message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new("InvalidParameter", message, StatusCode::BAD_REQUEST)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFound", message, StatusCode::NOT_FOUND)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("InternalError", message, StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self {
        Fault::internal(format!("failed to render response: {err}"))
    }
}

/// A request as it reached the endpoint.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: SnsRequest,
    pub received_at: DateTime<Utc>,
}

// 2. In-Memory Storage
pub struct AppState {
    pub region: String,
    pub page_size: usize,
    /// Keyed by the full topic ARN.
    pub topics: DashMap<String, Topic>,
    pub faults: DashMap<String, Fault>,
    pub calls: Mutex<Vec<RecordedCall>>,
}

impl AppState {
    pub fn new(region: String, page_size: usize) -> Self {
        Self {
            region,
            page_size: page_size.max(1),
            topics: DashMap::new(),
            faults: DashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn record(&self, request: &SnsRequest) {
        self.calls.lock().push(RecordedCall {
            request: request.clone(),
            received_at: Utc::now(),
        });
    }
}

pub type SharedState = Arc<AppState>;

// 3. SNS Actions
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "PascalCase")]
pub struct SnsRequest {
    pub action: String,
    pub name: Option<String>,
    pub topic_arn: Option<String>,
    pub endpoint: Option<String>,
    pub protocol: Option<String>,
    pub message: Option<String>,
    pub subject: Option<String>,
    pub attribute_name: Option<String>,
    pub attribute_value: Option<String>,
    pub next_token: Option<String>,
}
