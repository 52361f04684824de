//! Error types for directory operations.
//!
//! [`Error`] is the error returned by every public operation in the workspace.
//! [`TransportError`] describes a failure reported by the directory transport
//! itself and is wrapped by [`Error`] depending on which operation triggered it.

use thiserror::Error;

/// Failure reported by a directory transport.
///
/// The `Display` output is the transport's human-readable description of the
/// most recent failure and is what callers see inside [`Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No bound connection is available.
    #[error("not bound to a directory server")]
    NotBound,

    /// The server answered with a non-success result code.
    #[error("{message} (result code {code})")]
    Rejected {
        /// LDAP result code.
        code: u32,
        /// Diagnostic message returned by the server.
        message: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The operation did not complete within the configured timeout.
    #[error("operation timed out: {0}")]
    Timeout(String),
}

impl TransportError {
    /// Builds a [`TransportError::Rejected`] from a result code and diagnostic text.
    ///
    /// Servers frequently return an empty diagnostic; a generic description of
    /// the code is used in that case.
    #[must_use]
    pub fn rejected(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            describe_result_code(code).to_string()
        } else {
            message
        };
        Self::Rejected { code, message }
    }
}

/// Main error type for directory operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An attribute mapping was rejected, locally or by the directory.
    #[error("Attribute error: {0}")]
    Attribute(String),

    /// A batch modify against an entry failed; the local snapshot is unchanged.
    #[error("Directory operation on `{dn}` failed: {source}")]
    DirectoryOperation {
        /// Distinguished name the batch was submitted against.
        dn: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },

    /// A transport-level operation (bind, search, add, delete) failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A raw attribute value could not be interpreted.
    #[error("Invalid attribute value: {0}")]
    InvalidAttribute(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Attribute(_) => "ATTRIBUTE_ERROR",
            Self::DirectoryOperation { .. } => "DIRECTORY_OPERATION_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::InvalidAttribute(_) => "INVALID_ATTRIBUTE",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns the transport failure behind this error, if any.
    #[must_use]
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::DirectoryOperation { source, .. } | Self::Transport(source) => Some(source),
            _ => None,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_) | Self::Transport(_) | Self::DirectoryOperation { .. }
        )
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidAttribute(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}

fn describe_result_code(code: u32) -> &'static str {
    match code {
        1 => "operations error",
        2 => "protocol error",
        3 => "time limit exceeded",
        16 => "no such attribute",
        17 => "undefined attribute type",
        19 => "constraint violation",
        20 => "attribute or value exists",
        21 => "invalid attribute syntax",
        32 => "no such object",
        34 => "invalid DN syntax",
        49 => "invalid credentials",
        50 => "insufficient access rights",
        51 => "busy",
        52 => "unavailable",
        53 => "unwilling to perform",
        64 => "naming violation",
        65 => "object class violation",
        67 => "not allowed on RDN",
        68 => "entry already exists",
        _ => "unknown error",
    }
}
