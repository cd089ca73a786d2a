mod access;
mod frontend;
mod server;
mod telemetry;

#[cfg(test)]
mod tests;

pub use access::*;
pub use frontend::*;
pub use server::*;
pub use telemetry::*;

use std::collections::HashMap;

use serde::Deserialize;
use stratus_aws::config::{ConfigError, Configuration, RawConfig};

/// Message overrides per translation domain.
///
/// ```toml
/// [translations.aws]
/// "SNS Topic {0} added correctly" = "Tema SNS {0} creado correctamente"
/// ```
pub type TranslationsConfig = HashMap<String, HashMap<String, String>>;

/// Top-level configuration for the Stratus server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct StratusConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// AWS credentials, region, and transport options.
    #[serde(default)]
    pub aws: RawConfig,
    /// Role gate for the dashboards.
    #[serde(default)]
    pub access: AccessConfig,
    /// Dashboard visibility.
    #[serde(default)]
    pub frontend: FrontendConfig,
    /// Flash message translations.
    #[serde(default)]
    pub translations: TranslationsConfig,
    /// OpenTelemetry distributed tracing configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl StratusConfig {
    /// Resolve the `[aws]` section, filling gaps from the process environment.
    pub fn aws_configuration(&self) -> Result<Configuration, ConfigError> {
        self.aws_configuration_with(|name| std::env::var(name).ok())
    }

    /// Like [`aws_configuration`](Self::aws_configuration) with an explicit
    /// environment lookup. File values win over the environment; the region
    /// falls back to `eu-west-1`.
    pub fn aws_configuration_with<F>(&self, lookup: F) -> Result<Configuration, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = self.aws.clone().overlay_env(lookup).or_default_region();
        Configuration::resolve(raw)
    }
}
