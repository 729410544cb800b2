//! Server error types.

use std::fmt;

/// Errors that can occur in the server runtime.
///
/// Per-connection protocol failures never surface here: they are answered
/// on the wire and reported as a [`crate::SessionOutcome`]. These errors
/// concern the listener itself.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (unparseable bind address, bad limits).
    ///
    /// Fatal. Prevents startup; fix configuration and restart.
    Config(String),

    /// Transport/network error (bind failure, accept failure, etc.).
    ///
    /// May be transient (accept under load) or fatal (address in use).
    Transport(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
