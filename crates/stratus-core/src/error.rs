//! Provider error types

use crate::validation::Diagnostic;
use std::time::Duration;
use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The remote object does not exist (or an API returned an empty result).
    #[error("{}", not_found_message(.message, .last_error))]
    NotFound {
        message: String,
        last_error: Option<Box<ProviderError>>,
    },

    /// An error returned by a remote API, identified by its error code.
    #[error("{}", api_message(.code, .message))]
    Api { code: String, message: String },

    #[error("{}", timeout_message(.last_state, .expected, .timeout, .last_error))]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
        last_error: Option<Box<ProviderError>>,
    },

    #[error("unexpected state '{state}', wanted target '{}'", .expected.join(", "))]
    UnexpectedState {
        state: String,
        expected: Vec<String>,
        last_error: Option<Box<ProviderError>>,
    },

    #[error("invalid resource ID ({id}), expected {expected}")]
    InvalidId { id: String, expected: String },

    #[error("{}", validation_message(.0))]
    Validation(Vec<Diagnostic>),

    #[error("{action} {resource} ({id}): {source}")]
    Operation {
        action: &'static str,
        resource: String,
        id: String,
        #[source]
        source: Box<ProviderError>,
    },

    /// A create or update failed after the object already existed remotely.
    /// `state` is what should be recorded (as tainted) so the object is not lost.
    #[error("{source}")]
    Partial {
        state: Box<serde_json::Value>,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

pub const ACTION_CREATING: &str = "creating";
pub const ACTION_READING: &str = "reading";
pub const ACTION_UPDATING: &str = "updating";
pub const ACTION_DELETING: &str = "deleting";
pub const ACTION_WAITING_CREATE: &str = "waiting for create of";
pub const ACTION_WAITING_UPDATE: &str = "waiting for update of";
pub const ACTION_WAITING_DELETE: &str = "waiting for delete of";

impl ProviderError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            last_error: None,
        }
    }

    /// Wraps an API error that means the object is gone.
    pub fn not_found_from(err: ProviderError) -> Self {
        Self::NotFound {
            message: String::new(),
            last_error: Some(Box::new(err)),
        }
    }

    /// Error for an API call that succeeded but returned nothing usable.
    pub fn empty_result() -> Self {
        Self::not_found("empty result")
    }

    /// Adds the "creating X (id)" context the host shows to users.
    pub fn context(
        self,
        action: &'static str,
        resource: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self::Operation {
            action,
            resource: resource.into(),
            id: id.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, looking through `Operation` and `Partial` wrappers.
    pub fn root(&self) -> &ProviderError {
        match self {
            Self::Operation { source, .. } | Self::Partial { source, .. } => source.root(),
            other => other,
        }
    }

    /// State left behind by a failed create or update.
    pub fn partial_state(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Partial { state, .. } => Some(state),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout { .. })
    }

    /// API error code, looking through not-found and operation wrappers.
    pub fn code(&self) -> Option<&str> {
        match self.root() {
            Self::Api { code, .. } if !code.is_empty() => Some(code.as_str()),
            Self::NotFound {
                last_error: Some(err),
                ..
            } => err.code(),
            _ => None,
        }
    }

    pub fn code_equals(&self, codes: &[&str]) -> bool {
        self.code().is_some_and(|code| codes.contains(&code))
    }

    pub fn message_contains(&self, code: &str, needle: &str) -> bool {
        match self.root() {
            Self::Api { code: c, message } => c == code && message.contains(needle),
            _ => false,
        }
    }
}

fn not_found_message(message: &str, last_error: &Option<Box<ProviderError>>) -> String {
    match (message.is_empty(), last_error) {
        (false, Some(err)) => format!("{message}: {err}"),
        (false, None) => message.to_string(),
        (true, Some(err)) => err.to_string(),
        (true, None) => "couldn't find resource".to_string(),
    }
}

fn api_message(code: &str, message: &str) -> String {
    if code.is_empty() {
        message.to_string()
    } else if message.is_empty() {
        code.to_string()
    } else {
        format!("{code}: {message}")
    }
}

fn validation_message(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn timeout_message(
    last_state: &str,
    expected: &[String],
    timeout: &Duration,
    last_error: &Option<Box<ProviderError>>,
) -> String {
    let expected = if expected.is_empty() {
        "resource to be gone".to_string()
    } else {
        format!("state to become '{}'", expected.join(", "))
    };
    let mut extra = Vec::new();
    if !last_state.is_empty() {
        extra.push(format!("last state: '{last_state}'"));
    }
    if !timeout.is_zero() {
        extra.push(format!(
            "timeout: {}",
            crate::duration::format_duration(*timeout)
        ));
    }
    let suffix = if extra.is_empty() {
        String::new()
    } else {
        format!(" ({})", extra.join(", "))
    };
    match last_error {
        Some(err) => format!("timeout while waiting for {expected}{suffix}: {err}"),
        None => format!("timeout while waiting for {expected}{suffix}"),
    }
}
