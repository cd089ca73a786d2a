use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors that can occur when running the Stratus server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller lacks a role allowed to use the AWS dashboards.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The page does not exist or is hidden.
    #[error("{0}")]
    NotFound(String),

    /// A dashboard template failed to render.
    #[error("render error: {0}")]
    Render(#[from] minijinja::Error),
}

impl From<stratus_aws::ConfigError> for ServerError {
    fn from(err: stratus_aws::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Render(e) => {
                tracing::error!(error = %e, "dashboard render failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to render page".to_owned(),
                )
            }
        };

        (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn aws_config_error_becomes_internal_error() {
        let err = ServerError::from(stratus_aws::ConfigError::MissingAccessKey);
        assert!(matches!(err, ServerError::Config(_)));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("access"));
    }

    #[tokio::test]
    async fn forbidden_and_not_found_keep_their_message() {
        let response = ServerError::NotFound("Page not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Page not found");

        let response = ServerError::Forbidden("no role".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn io_error_converts() {
        let err = ServerError::from(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address in use",
        ));
        assert_eq!(err.to_string(), "io error: address in use");
    }
}
