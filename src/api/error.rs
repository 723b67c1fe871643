//! HTTP rendering of gateway errors

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Error;

/// Gateway error as returned from a handler
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Shorthand for a 400 with `message`
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(Error::Validation(message.into()))
    }
}

/// Decode a JSON body regardless of content type; an empty body reads as `{}`
///
/// Handlers take raw `Bytes` and decode here so malformed bodies get the same
/// error shape as every other failure.
pub fn json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code) = match &self.0 {
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::NotConfigured(_) => (StatusCode::SERVICE_UNAVAILABLE, "not_configured"),
            Error::ProviderUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable"),
            Error::Provider(_) | Error::Http(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
            Error::Ai(_) => (StatusCode::BAD_GATEWAY, "ai_error"),
            Error::Config(_)
            | Error::Storage(_)
            | Error::Io(_)
            | Error::Serialization(_)
            | Error::Toml(_)
            | Error::Database(_)
            | Error::Sqlite(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        // Send failures carry the provider's own explanation verbatim
        let message = match self.0 {
            Error::Validation(msg) | Error::ProviderUnavailable(msg) => msg,
            other => {
                if status.is_server_error() {
                    tracing::warn!(error = %other, status = status.as_u16(), "request failed");
                }
                other.to_string()
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
