use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::placement::router::error_status;
use crate::workflows::placement::ApplicationServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Process-level failure: startup, serving, or a scripted walkthrough that went wrong.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Workflow(ApplicationServiceError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Workflow(err) => error_status(err),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, AppError::Workflow(err) if err.is_retryable())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {err}"),
            AppError::Telemetry(err) => write!(f, "telemetry error: {err}"),
            AppError::Io(err) => write!(f, "io error: {err}"),
            AppError::Server(err) => write!(f, "server error: {err}"),
            AppError::Workflow(err) => write!(f, "placement workflow error: {err}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Workflow(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ApplicationServiceError> for AppError {
    fn from(value: ApplicationServiceError) -> Self {
        Self::Workflow(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::placement::{
        ApplicationId, DocumentRef, ProviderError, RepositoryError, SideEffectError,
    };

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    #[tokio::test]
    async fn workflow_errors_use_the_api_status_mapping() {
        let delivery = AppError::from(ApplicationServiceError::SideEffect(
            SideEffectError::DeliveryFailed {
                application_id: ApplicationId("app-000007".to_string()),
                document: DocumentRef("KZ-000007".to_string()),
                source: ProviderError::Unavailable("smtp relay timeout".to_string()),
            },
        ));
        let response = delivery.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body(response).await["retryable"], true);

        let missing = AppError::from(ApplicationServiceError::NotFound(ApplicationId(
            "app-000404".to_string(),
        )));
        assert!(missing.to_string().contains("app-000404"));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let outage = AppError::from(ApplicationServiceError::Repository(
            RepositoryError::Unavailable("replica lag".to_string()),
        ));
        let response = outage.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await["retryable"], true);
    }

    #[test]
    fn process_errors_are_internal() {
        let config = AppError::from(ConfigError::InvalidPort);
        assert_eq!(
            config.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
