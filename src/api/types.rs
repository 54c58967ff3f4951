//! API response types and the error body every failing route returns.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::pvwatts::ServiceError;
use crate::ssc::{ModuleInfo, SscError};

/// One row of `GET /ssc/modules`.
#[derive(Debug, Serialize)]
pub struct ModuleListing {
    pub name: String,
    pub description: String,
    pub version: i32,
    /// Route describing this module.
    pub url: String,
}

impl From<ModuleInfo> for ModuleListing {
    fn from(info: ModuleInfo) -> Self {
        Self {
            url: format!("/ssc/modules/{}", info.name),
            name: info.name,
            description: info.description,
            version: info.version,
        }
    }
}

/// JSON body of an error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status_code: u16,
    /// Stable machine-readable code: `UnknownModuleName`, `InvalidRequest`
    /// or `ServerError`.
    pub error_code: &'static str,
    pub details: String,
}

/// A failed request, rendered as [`ErrorResponse`].
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub details: String,
}

impl ApiError {
    pub fn unknown_module(name: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error_code: "UnknownModuleName",
            details: format!("The module with the name {name} does not exist"),
        }
    }

    pub fn invalid_request(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error_code: "InvalidRequest",
            details: details.into(),
        }
    }

    pub fn server(details: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error_code: "ServerError",
            details: details.into(),
        }
    }
}

impl From<SscError> for ApiError {
    fn from(err: SscError) -> Self {
        match err {
            SscError::UnknownModule(name) => Self::unknown_module(&name),
            SscError::InvalidArgument { .. } => Self::invalid_request(err.to_string()),
            other => {
                error!(error = %other, "simulation failed");
                Self::server(other.to_string())
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(details) => Self::invalid_request(details),
            ServiceError::Ssc(err) => err.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status_code: self.status.as_u16(),
            error_code: self.error_code,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}
