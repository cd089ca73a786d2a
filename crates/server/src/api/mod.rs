pub mod dashboards;
pub mod gate;
pub mod health;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use stratus_aws::ClientFactory;
use tower_http::trace::TraceLayer;

use crate::config::{AccessConfig, FrontendConfig};
use crate::i18n::Translator;
use crate::views::Views;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Lazily built AWS clients.
    pub factory: Arc<ClientFactory>,
    /// Role gate settings.
    pub access: Arc<AccessConfig>,
    /// Hidden dashboards.
    pub frontend: Arc<FrontendConfig>,
    /// Flash message translations.
    pub translator: Arc<Translator>,
    /// Compiled dashboard templates.
    pub views: Arc<Views>,
}

/// Build the Axum router: public health check plus the role-gated
/// dashboards.
pub fn router(state: AppState) -> Router {
    let public = Router::new().route("/health", get(health::health));

    // Layers run outside-in: the frontend filter answers 404 for hidden
    // dashboards before the role gate is consulted.
    let dashboards = Router::new()
        .route("/aws/s3", get(dashboards::s3))
        .route("/aws/ses", get(dashboards::ses))
        .route("/aws/sns", get(dashboards::sns))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gate::require_aws_role,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gate::frontend_filter,
        ));

    public
        .merge(dashboards)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
