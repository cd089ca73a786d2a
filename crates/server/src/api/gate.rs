//! Access middleware for the AWS dashboards.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use stratus_aws::Service;
use tracing::{debug, warn};

use super::AppState;
use crate::error::ServerError;

/// The dashboard a request path points at, from its last segment.
pub fn dashboard_of(path: &str) -> Option<Service> {
    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    Service::ALL.into_iter().find(|s| s.as_str() == segment)
}

/// Reject callers without one of the configured AWS roles.
pub async fn require_aws_role(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let roles = request
        .headers()
        .get(state.access.role_header.as_str())
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if state.access.allows(roles) {
        debug!(path = %request.uri().path(), "AWS role granted");
        return next.run(request).await;
    }

    warn!(
        path = %request.uri().path(),
        roles = %roles,
        "AWS dashboard access denied"
    );
    ServerError::Forbidden(format!(
        "one of the roles [{}] is required",
        state.access.aws_roles.join(", ")
    ))
    .into_response()
}

/// Answer 404 for dashboards hidden by `[frontend] hidden`.
pub async fn frontend_filter(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match dashboard_of(request.uri().path()) {
        Some(service) if state.frontend.is_hidden(service) => {
            ServerError::NotFound("Page not found".to_owned()).into_response()
        }
        _ => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_from_path() {
        assert_eq!(dashboard_of("/aws/s3"), Some(Service::S3));
        assert_eq!(dashboard_of("/aws/sns/"), Some(Service::Sns));
        assert_eq!(dashboard_of("/aws/ec2"), None);
        assert_eq!(dashboard_of("/"), None);
    }
}
