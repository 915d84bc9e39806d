use thiserror::Error;

/// Shown when a remote failure carries no usable message of its own.
pub const REMOTE_FALLBACK_MESSAGE: &str =
    "A temporary error occurred while contacting the server. Please try again.";

#[derive(Error, Debug)]
pub enum SimError {
    #[error("remote error (status {status:?}): {}", .message.as_deref().unwrap_or("no message"))]
    Remote {
        status: Option<u16>,
        message: Option<String>,
    },

    #[error("a practice session is already active: {0}")]
    SessionConflict(String),

    #[error("could not start practice after ending the previous session: {0}")]
    StartRetryExhausted(String),

    #[error("clock display surface unavailable: {0}")]
    SurfaceUnavailable(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("another registration attempt is still in progress")]
    AttemptInFlight,

    #[error("operation cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SimError {
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        SimError::Remote {
            status,
            message: if message.trim().is_empty() { None } else { Some(message) },
        }
    }

    /// True for failures raised by (or on the way to) the remote service.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SimError::Remote { .. }
                | SimError::SessionConflict(_)
                | SimError::StartRetryExhausted(_)
                | SimError::Timeout(_)
        )
    }

    /// The single stable string the front end shows for this failure.
    pub fn user_message(&self) -> String {
        match self {
            SimError::Remote { message: Some(m), .. } => m.clone(),
            SimError::Remote { message: None, .. } | SimError::Timeout(_) | SimError::Other(_) => {
                REMOTE_FALLBACK_MESSAGE.to_string()
            }
            SimError::SessionConflict(_) | SimError::StartRetryExhausted(_) => {
                "A practice session is already running elsewhere and could not be ended. Please log in again."
                    .to_string()
            }
            SimError::SurfaceUnavailable(_) => {
                "The practice clock window could not be opened. Please allow pop-ups and try again."
                    .to_string()
            }
            SimError::InvalidState(m) => m.clone(),
            SimError::AttemptInFlight => {
                "Your previous registration request is still being processed.".to_string()
            }
            SimError::Cancelled => "The practice session ended.".to_string(),
            SimError::Config(m) => format!("Configuration problem: {m}"),
        }
    }
}
