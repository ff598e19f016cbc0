use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::designs::DesignError;
use crate::application::error::ErrorReport;
use crate::application::layers::LayerFetchError;
use crate::domain::error::DomainError;

/// JSON error body: `{ "error": .., "status"?: .., "details"?: .. }`.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    source: &'static str,
    status: StatusCode,
    error: String,
    remote_status: Option<u16>,
    details: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(source: &'static str, status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            source,
            status,
            error: error.into(),
            remote_status: None,
            details: None,
            report: None,
        }
    }

    pub fn bad_request(source: &'static str, error: impl Into<String>) -> Self {
        Self::new(source, StatusCode::BAD_REQUEST, error)
    }

    pub fn not_found(source: &'static str, error: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, error)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_remote_status(mut self, status: Option<u16>) -> Self {
        self.remote_status = status;
        self
    }

    /// Keep the full source chain of `err` for the response logger.
    fn with_report_of(mut self, err: &dyn std::error::Error) -> Self {
        self.report = Some(ErrorReport::from_error(self.source, self.status, err));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn from_domain(source: &'static str, err: DomainError) -> Self {
        match err {
            DomainError::Validation { message } => Self::bad_request(source, message),
        }
    }

    pub fn from_design(source: &'static str, err: DesignError) -> Self {
        let api = match &err {
            DesignError::NotFound => Self::not_found(source, "design not found"),
            DesignError::Lookup { label, source: repo } => {
                Self::new(source, StatusCode::BAD_GATEWAY, *label)
                    .with_remote_status(repo.status())
                    .with_details(repo.details())
            }
            DesignError::Repo { label, source: repo } => {
                Self::new(source, StatusCode::INTERNAL_SERVER_ERROR, *label)
                    .with_remote_status(repo.status())
                    .with_details(repo.details())
            }
            DesignError::Storage {
                label,
                source: storage,
            } => Self::new(source, StatusCode::INTERNAL_SERVER_ERROR, *label)
                .with_remote_status(storage.status())
                .with_details(storage.details()),
        };
        api.with_report_of(&err)
    }

    /// Any failed blob fetch is reported as not found, carrying the remote
    /// status and body.
    pub fn from_layer_fetch(source: &'static str, err: LayerFetchError) -> Self {
        Self::not_found(source, "layer fetch failed")
            .with_remote_status(err.source.status())
            .with_details(err.source.details())
            .with_report_of(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            let message = match self.details.as_deref() {
                Some(details) => format!("{}: {details}", self.error),
                None => self.error.clone(),
            };
            ErrorReport::from_message(self.source, self.status, message)
        });
        let body = ApiErrorBody {
            error: self.error,
            status: self.remote_status,
            details: self.details,
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use super::*;
    use crate::application::repos::{RepoError, StorageError};

    async fn body_json(response: Response) -> Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn design_errors_map_to_statuses() {
        let cases = [
            (DesignError::NotFound, StatusCode::NOT_FOUND),
            (
                DesignError::Lookup {
                    label: "design list failed",
                    source: RepoError::transport("timeout"),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                DesignError::Repo {
                    label: "layers upsert failed",
                    source: RepoError::Status {
                        status: 409,
                        body: "conflict".to_string(),
                    },
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DesignError::Storage {
                    label: "storage upload failed",
                    source: StorageError::transport("reset"),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from_design("test", err).status(), expected);
        }
    }

    #[test]
    fn design_failures_report_their_source_chain() {
        let err = DesignError::Storage {
            label: "storage delete failed",
            source: StorageError::Status {
                status: 500,
                body: "bucket delete refused".to_string(),
            },
        };
        let response = ApiError::from_design("test", err).into_response();

        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("error report attached");
        assert_eq!(report.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            report.messages,
            vec![
                "storage delete failed".to_string(),
                "blob store replied 500: bucket delete refused".to_string(),
            ]
        );
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let err = ApiError::from_domain("test", DomainError::validation("bad id"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn layer_fetch_failures_carry_remote_status() {
        let err = LayerFetchError {
            path: "layers/d1/layer_0.png".to_string(),
            source: StorageError::Status {
                status: 400,
                body: "Object not found".to_string(),
            },
        };
        let response = ApiError::from_layer_fetch("test", err).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorReport>().is_some());
        assert_eq!(
            body_json(response).await,
            json!({
                "error": "layer fetch failed",
                "status": 400,
                "details": "Object not found",
            })
        );
    }

    #[tokio::test]
    async fn optional_fields_are_omitted() {
        let response = ApiError::not_found("test", "design not found").into_response();
        assert_eq!(body_json(response).await, json!({ "error": "design not found" }));
    }
}
