use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};

use stratus_aws::ClientFactory;
use stratus_server::api::AppState;
use stratus_server::config::StratusConfig;
use stratus_server::error::ServerError;
use stratus_server::i18n::Translator;
use stratus_server::views::Views;

/// Stratus AWS dashboard server.
#[derive(Parser, Debug)]
#[command(name = "stratus-server", about = "Role-gated AWS dashboards")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "stratus.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let config_found = Path::new(&cli.config).exists();
    let config: StratusConfig = if config_found {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)
            .map_err(|e| ServerError::Config(format!("{}: {e}", cli.config)))?
    } else {
        StratusConfig::default()
    };

    let telemetry_guard = stratus_server::telemetry::init(&config.telemetry);

    if !config_found {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    // Unresolvable credentials or region are fatal: nothing is served.
    let aws = match config.aws_configuration() {
        Ok(aws) => aws,
        Err(e) => {
            error!(error = %e, "invalid AWS configuration");
            telemetry_guard.shutdown();
            return Err(e.into());
        }
    };
    info!(region = %aws.region(), version = %aws.version(), "AWS configuration resolved");

    let state = AppState {
        factory: Arc::new(ClientFactory::new(aws)),
        access: Arc::new(config.access),
        frontend: Arc::new(config.frontend),
        translator: Arc::new(Translator::new(config.translations)),
        views: Arc::new(Views::new()?),
    };
    let app = stratus_server::api::router(state);

    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "stratus-server listening");

    // In-flight requests get `shutdown_timeout_seconds` to finish once a
    // shutdown signal arrives.
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    let drain_deadline = async move {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        () = drain_deadline => {
            warn!(
                timeout_secs = config.server.shutdown_timeout_seconds,
                "shutdown timeout exceeded, dropping open connections"
            );
        }
    }

    telemetry_guard.shutdown();
    info!("stratus-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
