//! Maps [`pdp_core::CoreError`] onto HTTP status codes: every
//! error kind gets its own status, plus a `JSON {"error": "<message>"}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdp_core::CoreError;
use pdp_types::{ErrorKind, PdpError};
use serde_json::json;

pub struct HttpError(PdpError);

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        Self(err.into())
    }
}

impl From<PdpError> for HttpError {
    fn from(err: PdpError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0.message, "internal error handling request");
        }
        (status, Json(json!({ "error": self.0.message }))).into_response()
    }
}

pub type HttpResult<T> = Result<T, HttpError>;
