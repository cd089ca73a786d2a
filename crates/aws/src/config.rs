use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

/// Region applied by hosts when no region was supplied at all.
pub const DEFAULT_REGION: &str = "eu-west-1";

/// API version used when none is configured.
pub const DEFAULT_VERSION: &str = "latest";

/// Errors raised while resolving a [`Configuration`].
///
/// These are fatal: a host that cannot resolve its configuration must not
/// start serving requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No access key and no named profile.
    #[error("missing access key")]
    MissingAccessKey,

    /// No secret key and no named profile.
    #[error("missing secret key")]
    MissingSecretKey,

    /// No region, or an empty one.
    #[error("missing region")]
    MissingRegion,

    /// An option was present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Unvalidated configuration options, as read from a file or the environment.
///
/// ```toml
/// [aws]
/// access_key = "AKIA..."
/// secret_key = "..."
/// region = "eu-west-1"
/// version = "latest"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    /// AWS access key id.
    pub access_key: Option<String>,
    /// AWS secret access key.
    pub secret_key: Option<SecretString>,
    /// AWS region (e.g. `"eu-west-1"`).
    pub region: Option<String>,
    /// API version; `"latest"` when absent.
    pub version: Option<String>,
    /// Named credential profile. Takes precedence over explicit keys.
    pub profile: Option<String>,
    /// Endpoint URL override for local development (e.g. `LocalStack`).
    pub endpoint_url: Option<String>,
    /// Transport connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Transport read timeout in milliseconds.
    pub read_timeout_ms: Option<u64>,
    /// Whole-operation timeout in milliseconds (including SDK retries).
    pub operation_timeout_ms: Option<u64>,
    /// Optional IAM role ARN to assume via STS.
    pub role_arn: Option<String>,
    /// STS session name for the assumed role.
    pub session_name: Option<String>,
    /// External ID for cross-account trust policies.
    pub external_id: Option<String>,
}

impl RawConfig {
    /// Fill absent options from the standard AWS environment variables.
    ///
    /// Credentials are taken as a unit: explicit keys suppress
    /// `AWS_PROFILE`, and a named profile suppresses the env key pair.
    ///
    /// `lookup` is usually `|name| std::env::var(name).ok()`.
    #[must_use]
    pub fn overlay_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let has_keys = self.access_key.as_deref().is_some_and(|k| !k.trim().is_empty())
            || self.secret_key.is_some();
        let has_profile = self.profile.as_deref().is_some_and(|p| !p.trim().is_empty());

        if !has_profile {
            if self.access_key.is_none() {
                self.access_key = lookup("AWS_ACCESS_KEY_ID");
            }
            if self.secret_key.is_none() {
                self.secret_key = lookup("AWS_SECRET_ACCESS_KEY").map(SecretString::new);
            }
        }
        if !has_keys && !has_profile {
            self.profile = lookup("AWS_PROFILE").or(self.profile);
        }
        if self.region.is_none() {
            self.region = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION"));
        }
        self
    }

    /// Use [`DEFAULT_REGION`] when no region was given. An explicitly empty
    /// region is kept so that resolution still rejects it.
    #[must_use]
    pub fn or_default_region(mut self) -> Self {
        if self.region.is_none() {
            self.region = Some(DEFAULT_REGION.to_owned());
        }
        self
    }
}

/// Where the SDK obtains credentials from.
#[derive(Clone)]
pub enum CredentialSource {
    /// Explicit access key pair.
    Static {
        access_key: String,
        secret_key: SecretString,
    },
    /// A named profile from the shared credentials/config files.
    Profile(String),
}

impl std::fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static { .. } => f
                .debug_struct("Static")
                .field("access_key", &"[REDACTED]")
                .field("secret_key", &"[REDACTED]")
                .finish(),
            Self::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
        }
    }
}

/// STS assume-role settings layered over the base credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRole {
    pub role_arn: String,
    pub session_name: Option<String>,
    pub external_id: Option<String>,
}

/// Transport timeouts handed through to the SDK untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportTimeouts {
    pub connect: Option<Duration>,
    pub read: Option<Duration>,
    pub operation: Option<Duration>,
}

impl TransportTimeouts {
    /// Whether any timeout is set.
    pub fn is_empty(&self) -> bool {
        self.connect.is_none() && self.read.is_none() && self.operation.is_none()
    }
}

/// Validated, immutable AWS configuration shared by every service client.
#[derive(Clone)]
pub struct Configuration {
    credentials: CredentialSource,
    region: String,
    version: String,
    endpoint_url: Option<String>,
    timeouts: TransportTimeouts,
    assume_role: Option<AssumeRole>,
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("credentials", &self.credentials)
            .field("region", &self.region)
            .field("version", &self.version)
            .field("endpoint_url", &self.endpoint_url)
            .field("timeouts", &self.timeouts)
            .field(
                "assume_role",
                &self.assume_role.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Configuration {
    /// Validate raw options into a [`Configuration`].
    ///
    /// A profile, when present, wins over explicit keys. Region is always
    /// required.
    pub fn resolve(raw: RawConfig) -> Result<Self, ConfigError> {
        let profile = non_empty(raw.profile);
        let access_key = non_empty(raw.access_key);
        let secret_key = raw
            .secret_key
            .filter(|s| !s.expose_secret().trim().is_empty());

        let credentials = match (profile, access_key, secret_key) {
            (Some(profile), _, _) => CredentialSource::Profile(profile),
            (None, None, _) => return Err(ConfigError::MissingAccessKey),
            (None, Some(_), None) => return Err(ConfigError::MissingSecretKey),
            (None, Some(access_key), Some(secret_key)) => CredentialSource::Static {
                access_key,
                secret_key,
            },
        };

        let region = non_empty(raw.region).ok_or(ConfigError::MissingRegion)?;
        let version = non_empty(raw.version).unwrap_or_else(|| DEFAULT_VERSION.to_owned());

        let endpoint_url = non_empty(raw.endpoint_url);
        if let Some(url) = &endpoint_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "endpoint_url must start with http:// or https://, got '{url}'"
                )));
            }
        }

        let assume_role = non_empty(raw.role_arn).map(|role_arn| AssumeRole {
            role_arn,
            session_name: non_empty(raw.session_name),
            external_id: non_empty(raw.external_id),
        });

        Ok(Self {
            credentials,
            region,
            version,
            endpoint_url,
            timeouts: TransportTimeouts {
                connect: raw.connect_timeout_ms.map(Duration::from_millis),
                read: raw.read_timeout_ms.map(Duration::from_millis),
                operation: raw.operation_timeout_ms.map(Duration::from_millis),
            },
            assume_role,
        })
    }

    pub fn credentials(&self) -> &CredentialSource {
        &self.credentials
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.endpoint_url.as_deref()
    }

    pub fn timeouts(&self) -> TransportTimeouts {
        self.timeouts
    }

    pub fn assume_role(&self) -> Option<&AssumeRole> {
        self.assume_role.as_ref()
    }
}
