use crate::error::RemoteServiceError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Attribute carrying a topic's human-friendly name.
pub const DISPLAY_NAME: &str = "DisplayName";

/// A message forwarded once to a topic. Nothing about it is kept locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic_arn: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    pub fn new(topic_arn: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            topic_arn: topic_arn.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Delivery protocols understood by the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Email,
    EmailJson,
    Http,
    Https,
    Sqs,
    Sms,
    Lambda,
    Application,
    Firehose,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Email => "email",
            Protocol::EmailJson => "email-json",
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Sqs => "sqs",
            Protocol::Sms => "sms",
            Protocol::Lambda => "lambda",
            Protocol::Application => "application",
            Protocol::Firehose => "firehose",
        }
    }

    /// Subscriptions over these protocols stay pending until the endpoint
    /// owner confirms them out of band.
    pub fn requires_confirmation(&self) -> bool {
        matches!(
            self,
            Protocol::Email | Protocol::EmailJson | Protocol::Http | Protocol::Https
        )
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown delivery protocol `{0}`")]
pub struct UnknownProtocol(pub String);

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Ok(Protocol::Email),
            "email-json" => Ok(Protocol::EmailJson),
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            "sqs" => Ok(Protocol::Sqs),
            "sms" => Ok(Protocol::Sms),
            "lambda" => Ok(Protocol::Lambda),
            "application" => Ok(Protocol::Application),
            "firehose" => Ok(Protocol::Firehose),
            _ => Err(UnknownProtocol(s.to_string())),
        }
    }
}

/// One page of a topic listing as returned by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicPage {
    pub topic_arns: Vec<String>,
    pub next_token: Option<String>,
}

/// A topic together with the attributes fetched for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicRecord {
    pub topic_arn: String,
    pub attributes: BTreeMap<String, String>,
}

impl TopicRecord {
    pub fn display_name(&self) -> Option<&str> {
        self.attributes.get(DISPLAY_NAME).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReceipt {
    pub topic_arn: String,
    pub protocol: Protocol,
    pub endpoint: String,
    /// `None` while the subscription waits for confirmation.
    pub subscription_arn: Option<String>,
}

impl SubscriptionReceipt {
    pub fn is_pending(&self) -> bool {
        self.subscription_arn.is_none()
    }
}

/// Result of the two-step topic creation.
///
/// The topic exists as soon as `topic_arn` is known. Setting the display
/// name is a second call; when it fails the error is kept here and the
/// topic is left without a friendly name.
#[derive(Debug, Clone)]
pub struct CreatedTopic {
    pub topic_arn: String,
    pub display_name: Option<String>,
    pub attribute_error: Option<RemoteServiceError>,
}

impl CreatedTopic {
    pub fn is_fully_configured(&self) -> bool {
        self.attribute_error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyDeleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_parses_wire_tags() {
        assert_eq!("email".parse::<Protocol>().unwrap(), Protocol::Email);
        assert_eq!("EMAIL-JSON".parse::<Protocol>().unwrap(), Protocol::EmailJson);
        assert_eq!("sqs".parse::<Protocol>().unwrap(), Protocol::Sqs);
        assert!("pigeon".parse::<Protocol>().is_err());
    }

    #[test]
    fn only_human_facing_protocols_need_confirmation() {
        assert!(Protocol::Email.requires_confirmation());
        assert!(Protocol::Https.requires_confirmation());
        assert!(!Protocol::Sqs.requires_confirmation());
        assert!(!Protocol::Lambda.requires_confirmation());
    }

    #[test]
    fn record_exposes_display_name() {
        let mut attributes = BTreeMap::new();
        attributes.insert(DISPLAY_NAME.to_string(), "Zebra News".to_string());
        let record = TopicRecord {
            topic_arn: "arn:aws:sns:eu-central-1:000000000000:zebra".to_string(),
            attributes,
        };
        assert_eq!(record.display_name(), Some("Zebra News"));
    }
}
