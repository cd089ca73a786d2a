use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// OTLP transport used by the span exporter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtlpProtocol {
    #[default]
    Grpc,
    Http,
}

impl OtlpProtocol {
    /// Collector endpoint used when none is configured.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Grpc => "http://localhost:4317",
            Self::Http => "http://localhost:4318/v1/traces",
        }
    }
}

impl fmt::Display for OtlpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grpc => "grpc",
            Self::Http => "http",
        })
    }
}

/// `[telemetry]`: span export for dashboard requests and the AWS calls
/// behind them.
///
/// ```toml
/// [telemetry]
/// enabled = true
/// protocol = "http"
/// sample_ratio = 0.25
///
/// [telemetry.resource_attributes]
/// "deployment.environment" = "staging"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Collector endpoint. Defaults to the local collector port for `protocol`.
    pub endpoint: Option<String>,
    pub protocol: OtlpProtocol,
    /// Reported as `service.name`.
    pub service_name: String,
    /// Fraction of traces kept; values outside `0.0..=1.0` are clamped.
    pub sample_ratio: f64,
    pub timeout_seconds: u64,
    /// Extra resource attributes attached to every span.
    pub resource_attributes: HashMap<String, String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            protocol: OtlpProtocol::default(),
            service_name: "stratus".to_owned(),
            sample_ratio: 1.0,
            timeout_seconds: 10,
            resource_attributes: HashMap::new(),
        }
    }
}

impl TelemetryConfig {
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.protocol.default_endpoint())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}
