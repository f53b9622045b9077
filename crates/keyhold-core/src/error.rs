//! Error types for Keyhold

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Access Errors
    #[error("Administrator privilege required")]
    PermissionDenied,

    // Validation Errors
    #[error("Invalid configuration: {0}")]
    Validation(ValidationErrors),

    // Directory Errors
    #[error("Unable to reach directory server: {0}")]
    Connect(String),

    #[error("Unable to secure directory connection: {0}")]
    Encryption(String),

    #[error("Directory bind failed: {0}")]
    Auth(String),

    #[error("Directory search failed: {0}")]
    Query(String),

    // Store Errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unable to save configuration: {0}")]
    StoreWrite(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // Internal Errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::PermissionDenied => "PermissionDenied",
            Error::Validation(_) => "ValidationError",
            Error::Connect(_) => "ConnectError",
            Error::Encryption(_) => "EncryptionError",
            Error::Auth(_) => "AuthError",
            Error::Query(_) => "QueryError",
            Error::NotFound(_) => "NotFound",
            Error::StoreWrite(_) => "StoreWriteError",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::DatabaseError(_)
            | Error::InternalError(_)
            | Error::Io(_)
            | Error::Other(_) => "InternalError",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Error::InvalidArgument(_) => 400,

            Error::PermissionDenied => 403,

            Error::NotFound(_) => 404,

            Error::Validation(_) => 422,

            Error::Connect(_) | Error::Encryption(_) | Error::Auth(_) | Error::Query(_) => 502,

            _ => 500,
        }
    }

    /// Message that is safe to hand back to the caller.
    ///
    /// Internal failures collapse to a generic text; their detail only goes
    /// to the server log.
    pub fn public_message(&self) -> String {
        match self {
            Error::StoreWrite(_) => "Unable to save configuration".to_string(),
            Error::DatabaseError(_) | Error::InternalError(_) | Error::Io(_) | Error::Other(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Field-level detail for validation failures
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Error::Validation(errors) => Some(errors.as_slice()),
            _ => None,
        }
    }

    /// Errors raised while talking to a directory server
    pub fn is_directory_error(&self) -> bool {
        matches!(
            self,
            Error::Connect(_) | Error::Encryption(_) | Error::Auth(_) | Error::Query(_)
        )
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(ValidationErrors::single(field, message))
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Error::Validation(errors)
    }
}

/// One rejected field, addressed by its wire name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every field error found in one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![FieldError::new(field, message)])
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[FieldError] {
        &self.0
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
