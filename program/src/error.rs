// Lucky Draw Engine - Errors
use thiserror::Error;

/// Errors that may be returned by the draw engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    /// No authenticated identity was supplied with the request
    #[error("Caller is not authenticated")]
    Unauthenticated,

    /// Malformed request or document
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The prize id does not exist in the active prize list
    #[error("Prize {0} does not exist in the active prize list")]
    InvalidPrize(String),

    /// The candidate pool for the active mode is empty
    #[error("No candidates left in the pool")]
    NoCandidates,

    /// Every slot of the prize has already been awarded
    #[error("Prize {0} has no remaining slots")]
    Exhausted(String),

    /// Structural configuration change submitted without operator confirmation
    #[error("Configuration change resets all draw progress and must be confirmed")]
    ConfirmationRequired,

    /// The persistence layer failed; nothing was committed
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl DrawError {
    /// Stable numeric code for the error, shared with transports
    pub fn code(&self) -> u32 {
        match self {
            DrawError::Unauthenticated => 0,
            DrawError::Validation(_) => 1,
            DrawError::InvalidPrize(_) => 2,
            DrawError::NoCandidates => 3,
            DrawError::Exhausted(_) => 4,
            DrawError::ConfirmationRequired => 5,
            DrawError::Storage(_) => 6,
        }
    }

    /// HTTP-equivalent status for the error
    pub fn status(&self) -> u16 {
        match self {
            DrawError::Unauthenticated => 401,
            DrawError::Validation(_) | DrawError::InvalidPrize(_) => 400,
            DrawError::NoCandidates | DrawError::Exhausted(_) | DrawError::ConfirmationRequired => {
                409
            }
            DrawError::Storage(_) => 500,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        DrawError::Validation(message.into())
    }
}

impl From<std::io::Error> for DrawError {
    fn from(e: std::io::Error) -> Self {
        DrawError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for DrawError {
    fn from(e: serde_json::Error) -> Self {
        DrawError::Storage(e.to_string())
    }
}
