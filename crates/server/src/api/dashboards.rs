//! `GET /aws/{s3,ses,sns}` dashboard pages.
//!
//! Client construction and provider failures never fail the page; they
//! show up as flash errors next to an "unavailable" client handle.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use stratus_aws::{Outcome, OutcomeReporter, Service};
use tracing::instrument;

use super::AppState;
use crate::error::ServerError;
use crate::flash::FlashBag;
use crate::views::{ClientHandle, DashboardPage};

fn visible(state: &AppState) -> Vec<Service> {
    Service::ALL
        .into_iter()
        .filter(|s| !state.frontend.is_hidden(*s))
        .collect()
}

fn page(state: &AppState, service: Service, ready: bool, flash: &FlashBag) -> DashboardPage {
    DashboardPage {
        nav: visible(state),
        client: ClientHandle::new(service, state.factory.configuration(), ready),
        flashes: flash.take(),
        buckets: Vec::new(),
    }
}

fn render(state: &AppState, service: Service, page: &DashboardPage) -> Result<Html<String>, ServerError> {
    state.views.dashboard(service, page).map(Html)
}

/// `GET /aws/s3` -- bucket listing plus client handle.
#[instrument(skip_all)]
pub async fn s3(State(state): State<AppState>) -> Result<Html<String>, ServerError> {
    let flash = Arc::new(FlashBag::new(state.translator.clone()));

    let (ready, buckets) = match state.factory.s3().await {
        Outcome::Success(facade) => {
            let buckets = facade
                .with_reporter(flash.clone())
                .list_buckets()
                .await
                .unwrap_or_default();
            (true, buckets)
        }
        Outcome::Failure { kind, message } => {
            flash.error(kind, &message);
            (false, Vec::new())
        }
    };

    let mut view = page(&state, Service::S3, ready, &flash);
    view.buckets = buckets;
    render(&state, Service::S3, &view)
}

/// `GET /aws/ses` -- client handle.
#[instrument(skip_all)]
pub async fn ses(State(state): State<AppState>) -> Result<Html<String>, ServerError> {
    client_only(&state, Service::Ses).await
}

/// `GET /aws/sns` -- client handle.
#[instrument(skip_all)]
pub async fn sns(State(state): State<AppState>) -> Result<Html<String>, ServerError> {
    client_only(&state, Service::Sns).await
}

async fn client_only(state: &AppState, service: Service) -> Result<Html<String>, ServerError> {
    let flash = FlashBag::new(state.translator.clone());
    let ready = match state.factory.get_client(service).await {
        Outcome::Success(_) => true,
        Outcome::Failure { kind, message } => {
            flash.error(kind, &message);
            false
        }
    };
    render(state, service, &page(state, service, ready, &flash))
}
