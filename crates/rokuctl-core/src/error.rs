//! Application error types with rich context

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Transport Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {code} from {context}")]
    Status { code: u16, context: String },

    // ─────────────────────────────────────────────────────────────
    // Protocol/Parse Errors
    // ─────────────────────────────────────────────────────────────
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Device protocol error: {message}")]
    Protocol { message: String },

    // ─────────────────────────────────────────────────────────────
    // Command/Channel Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Command dropped before completing")]
    ChannelClosed,

    #[error("No installed channel named '{name}'")]
    AppNotFound { name: String },

    #[error("Sideload failed: {message}")]
    Install { message: String },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    // ─────────────────────────────────────────────────────────────
    // Name Lookup Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown remote key: '{name}'")]
    UnknownKey { name: String },

    #[error("Unknown log port: '{name}'")]
    UnknownPort { name: String },
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn status(code: u16, context: impl Into<String>) -> Self {
        Self::Status {
            code,
            context: context.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn app_not_found(name: impl Into<String>) -> Self {
        Self::AppNotFound { name: name.into() }
    }

    pub fn install(message: impl Into<String>) -> Self {
        Self::Install {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn unknown_key(name: impl Into<String>) -> Self {
        Self::UnknownKey { name: name.into() }
    }

    pub fn unknown_port(name: impl Into<String>) -> Self {
        Self::UnknownPort { name: name.into() }
    }

    /// Check if this error came from the transport layer (as opposed to a
    /// protocol, lookup, or configuration problem). Transport errors are the
    /// ones a test harness may want to retry by hand; they are never retried
    /// automatically.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Http(_) | Error::Status { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}
