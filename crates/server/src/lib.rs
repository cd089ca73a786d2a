//! Role-gated AWS dashboards over the `stratus-aws` facades.

pub mod api;
pub mod config;
pub mod error;
pub mod flash;
pub mod i18n;
pub mod telemetry;
pub mod views;
