//! Error types for the shim runtime
//!
//! Platform failures, handler validation failures and script-level failures
//! are kept apart so the interpreter can decide which ones halt execution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

use super::script::ScriptLocation;

/// Classification code attached to every platform API failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    /// The request itself was malformed (caller bug).
    BadRequest,
    /// The player is not signed in.
    Unauthorized,
    /// The player may not perform the operation.
    Forbidden,
    /// Platform-side fault.
    InternalServerError,
    /// Too many calls in a short period.
    ApiCallLimitExceeded,
    /// Any code this crate does not know about.
    #[serde(untagged)]
    Unknown(String),
}

impl ApiErrorCode {
    /// Parse a wire code, mapping unlisted values to [`ApiErrorCode::Unknown`].
    pub fn from_code(code: &str) -> Self {
        match code {
            "BAD_REQUEST" => Self::BadRequest,
            "UNAUTHORIZED" => Self::Unauthorized,
            "FORBIDDEN" => Self::Forbidden,
            "INTERNAL_SERVER_ERROR" => Self::InternalServerError,
            "API_CALL_LIMIT_EXCEEDED" => Self::ApiCallLimitExceeded,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire representation of the code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::ApiCallLimitExceeded => "API_CALL_LIMIT_EXCEEDED",
            Self::Unknown(code) => code,
        }
    }

    /// Whether the failure is the caller's fault and must halt the script.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::BadRequest)
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned by a platform API call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// Classification code.
    pub code: ApiErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ApiError {
    /// Build an error from a code and message.
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Convenience result alias for platform API calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Recoverable platform failure tagged with the instruction that issued the
/// call. This is what failure continuations receive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{location}: {error}")]
pub struct CallFailure {
    /// Instruction that bound the call
    pub location: ScriptLocation,
    /// Failure reported by the platform
    #[source]
    pub error: ApiError,
}

/// Errors raised synchronously by a command handler before or while binding
/// an asynchronous call.
#[derive(Debug, Error)]
pub enum CommandError {
    /// A required positional argument is absent.
    #[error("missing argument #{index} ({name})")]
    MissingArgument {
        /// Zero-based argument position
        index: usize,
        /// Argument name used in messages
        name: &'static str,
    },

    /// Argument could not be parsed as the expected type.
    #[error("argument #{index} ({name}) is not a valid {expected}: {value:?}")]
    InvalidArgument {
        /// Zero-based argument position
        index: usize,
        /// Argument name used in messages
        name: &'static str,
        /// Expected type
        expected: &'static str,
        /// Raw text supplied by the script
        value: String,
    },

    /// A numeric id falls outside its allowed range.
    #[error("{name} {value} is out of range (1..={max})")]
    OutOfRange {
        /// Argument name used in messages
        name: &'static str,
        /// Supplied value
        value: i64,
        /// Largest accepted value
        max: i64,
    },

    /// The handler tried to bind a second asynchronous call.
    #[error("an asynchronous call is already pending for this interpreter")]
    CallAlreadyPending,

    /// Asynchronous calls need an ambient tokio runtime.
    #[error("no async runtime available: {0}")]
    NoAsyncRuntime(String),
}

/// Convenience result alias for command handlers
pub type CommandResult<T> = std::result::Result<T, CommandError>;

/// Failures that stop an interpreter.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// A handler rejected its input.
    #[error("{source} at {location}")]
    Command {
        /// Where the failing command sits in the script
        location: ScriptLocation,
        /// Underlying validation error
        #[source]
        source: CommandError,
    },

    /// A platform call failed with a client-fault code.
    #[error("{source} at {location}")]
    Fatal {
        /// Where the binding command sits in the script
        location: ScriptLocation,
        /// Underlying API error
        #[source]
        source: ApiError,
    },

    /// The script references a command that no plugin registered.
    #[error("unknown command '{name}' on line {line}")]
    UnknownCommand {
        /// Command name as written
        name: String,
        /// Source line
        line: usize,
    },

    /// Script text could not be parsed.
    #[error("syntax error on line {line}: {detail}")]
    Syntax {
        /// Source line
        line: usize,
        /// Description of the problem
        detail: String,
    },

    /// The interpreter already halted on an earlier error.
    #[error("interpreter has halted")]
    Halted,
}

/// Convenience result alias for interpreter operations
pub type ScriptResult<T> = std::result::Result<T, ScriptError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is outside what the runtime accepts.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip_through_wire_names() {
        for code in [
            ApiErrorCode::BadRequest,
            ApiErrorCode::Unauthorized,
            ApiErrorCode::Forbidden,
            ApiErrorCode::InternalServerError,
            ApiErrorCode::ApiCallLimitExceeded,
        ] {
            assert_eq!(ApiErrorCode::from_code(code.as_str()), code);
        }
        assert_eq!(
            ApiErrorCode::from_code("TEAPOT"),
            ApiErrorCode::Unknown("TEAPOT".into())
        );
    }

    #[test]
    fn test_only_bad_request_is_client_fault() {
        assert!(ApiErrorCode::BadRequest.is_client_fault());
        assert!(!ApiErrorCode::Forbidden.is_client_fault());
        assert!(!ApiErrorCode::Unknown("X".into()).is_client_fault());
    }

    #[test]
    fn test_api_error_json_shape() {
        let error: ApiError =
            serde_json::from_str(r#"{"code":"API_CALL_LIMIT_EXCEEDED","message":"slow down"}"#)
                .unwrap();
        assert_eq!(error.code, ApiErrorCode::ApiCallLimitExceeded);
        assert_eq!(error.to_string(), "API_CALL_LIMIT_EXCEEDED: slow down");

        let unknown: ApiError =
            serde_json::from_str(r#"{"code":"SOMETHING_NEW","message":"?"}"#).unwrap();
        assert_eq!(unknown.code, ApiErrorCode::Unknown("SOMETHING_NEW".into()));
    }
}
