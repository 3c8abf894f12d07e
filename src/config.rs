//! Layered configuration: command line / environment over a TOML file over
//! defaults.

use crate::error::{NotifierError, Result};
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_sns::config::{Credentials, Region};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use url::Url;

/// Provider name attached to credentials supplied through configuration.
const STATIC_PROVIDER: &str = "notifier-config";

/// Where the SDK obtains credentials from.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum CredentialSource {
    /// The SDK's default provider chain (environment, profile, instance role).
    #[default]
    Default,
    /// A named profile from the shared config files.
    Profile(String),
    Static {
        access_key_id: String,
        secret_access_key: String,
    },
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Default => f.write_str("Default"),
            CredentialSource::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
            CredentialSource::Static { access_key_id, .. } => f
                .debug_struct("Static")
                .field("access_key_id", access_key_id)
                .field("secret_access_key", &"** redacted **")
                .finish(),
        }
    }
}

impl FromStr for CredentialSource {
    type Err = NotifierError;

    /// Accepts `default`, `profile:<name>` or `static:<key-id>:<secret>`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("default") {
            return Ok(CredentialSource::Default);
        }
        if let Some(name) = s.strip_prefix("profile:") {
            if name.is_empty() {
                return Err(NotifierError::Config("profile name is empty".to_string()));
            }
            return Ok(CredentialSource::Profile(name.to_string()));
        }
        if let Some(keys) = s.strip_prefix("static:") {
            return match keys.split_once(':') {
                Some((id, secret)) if !id.is_empty() && !secret.is_empty() => {
                    Ok(CredentialSource::Static {
                        access_key_id: id.to_string(),
                        secret_access_key: secret.to_string(),
                    })
                }
                _ => Err(NotifierError::Config(
                    "static credentials must look like static:<access-key-id>:<secret-access-key>"
                        .to_string(),
                )),
            };
        }
        Err(NotifierError::Config(format!(
            "unknown credential source `{s}` (expected default, profile:<name> or static:<id>:<secret>)"
        )))
    }
}

/// Contents of the optional TOML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub region: Option<String>,
    pub credential_source: Option<String>,
    pub default_topic: Option<String>,
    pub default_recipient: Option<String>,
    pub endpoint_url: Option<String>,
    pub wait_for_operator: Option<bool>,
}

impl FileConfig {
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| NotifierError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            NotifierError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub region: Option<String>,
    pub credential_source: Option<String>,
    pub default_topic: Option<String>,
    pub default_recipient: Option<String>,
    pub endpoint_url: Option<String>,
    pub no_wait: bool,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` defers to the SDK's region provider chain.
    pub region: Option<String>,
    pub credentials: CredentialSource,
    pub default_topic: Option<String>,
    pub default_recipient: Option<String>,
    pub endpoint_url: Option<Url>,
    pub wait_for_operator: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            region: None,
            credentials: CredentialSource::Default,
            default_topic: None,
            default_recipient: None,
            endpoint_url: None,
            wait_for_operator: true,
        }
    }
}

impl Settings {
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self> {
        let credentials = overrides
            .credential_source
            .or(file.credential_source)
            .map(|s| s.parse::<CredentialSource>())
            .transpose()?
            .unwrap_or_default();

        let endpoint_url = overrides
            .endpoint_url
            .or(file.endpoint_url)
            .map(|raw| parse_endpoint(&raw))
            .transpose()?;

        Ok(Self {
            region: overrides.region.or(file.region),
            credentials,
            default_topic: overrides.default_topic.or(file.default_topic),
            default_recipient: overrides.default_recipient.or(file.default_recipient),
            endpoint_url,
            wait_for_operator: !overrides.no_wait && file.wait_for_operator.unwrap_or(true),
        })
    }

    /// Reads the config file, if one is given, and applies the overrides.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let file = match path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, overrides)
    }

    /// Settings for a local endpoint, with throwaway credentials.
    pub fn local(endpoint_url: Url, region: &str) -> Self {
        Self {
            region: Some(region.to_string()),
            credentials: CredentialSource::Static {
                access_key_id: "local".to_string(),
                secret_access_key: "local".to_string(),
            },
            endpoint_url: Some(endpoint_url),
            wait_for_operator: false,
            ..Default::default()
        }
    }

    pub fn topic_or_default(&self, topic: Option<String>) -> Result<String> {
        topic
            .or_else(|| self.default_topic.clone())
            .ok_or(NotifierError::MissingSetting("topic ARN"))
    }

    pub fn recipient_or_default(&self, recipient: Option<String>) -> Result<String> {
        recipient
            .or_else(|| self.default_recipient.clone())
            .ok_or(NotifierError::MissingSetting("recipient"))
    }

    /// Builds the SDK configuration. Retries are disabled: every call is
    /// attempted exactly once.
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).retry_config(RetryConfig::disabled());

        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        match &self.credentials {
            CredentialSource::Default => {}
            CredentialSource::Profile(name) => loader = loader.profile_name(name),
            CredentialSource::Static {
                access_key_id,
                secret_access_key,
            } => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key_id,
                    secret_access_key,
                    None,
                    None,
                    STATIC_PROVIDER,
                ));
            }
        }
        if let Some(url) = &self.endpoint_url {
            loader = loader.endpoint_url(url.as_str().trim_end_matches('/'));
        }

        loader.load().await
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| NotifierError::Config(format!("invalid endpoint url `{raw}`: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NotifierError::Config(format!(
            "endpoint url `{raw}` uses unsupported scheme `{other}`"
        ))),
    }
}
