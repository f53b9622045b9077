//! JSON error responses for the admin API

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyhold_core::{Error, FieldError};
use serde::Serialize;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<FieldError>>,
}

/// Error returned by admin handlers: `{ error, message, fields? }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorBody {
                error: "Unauthorized",
                message: message.into(),
                fields: None,
            },
        }
    }

    /// Body that could not be decoded into `document`.
    ///
    /// Decoder text quotes the offending values, so it never reaches the
    /// caller or the log.
    pub fn invalid_body(rejection: JsonRejection, document: &str) -> Self {
        let message = match &rejection {
            JsonRejection::JsonDataError(_) => {
                format!("request body is not a valid {}", document)
            }
            JsonRejection::JsonSyntaxError(_) => "request body is not valid JSON".to_string(),
            JsonRejection::MissingJsonContentType(_) => {
                "expected Content-Type: application/json".to_string()
            }
            _ => "unable to read request body".to_string(),
        };
        debug!(status = %rejection.status(), document, "Rejected admin request body");

        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "InvalidArgument",
                message,
                fields: None,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.error
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = err.code(), error = %err, "Admin request failed");
        }

        Self {
            status,
            body: ErrorBody {
                error: err.code(),
                message: err.public_message(),
                fields: err.field_errors().map(|f| f.to_vec()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
