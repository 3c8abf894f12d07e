//! Operator tool for a pub/sub notification service: publish, subscribe,
//! list, create and delete topics through the AWS SNS client, plus a local
//! SNS-compatible endpoint for offline runs.

pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod local;
pub mod model;
pub mod service;
pub mod session;

pub use config::{CredentialSource, Settings};
pub use driver::{Notifier, TopicPager};
pub use error::{ErrorCategory, NotifierError, RemoteServiceError};
pub use model::{CreatedTopic, DeleteOutcome, Message, Protocol, SubscriptionReceipt, TopicRecord};
pub use service::{NotificationService, SnsService};
pub use session::{OutputFormat, Session, Walkthrough};
