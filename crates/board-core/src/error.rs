use thiserror::Error;

/// All errors produced by the machine board.
#[derive(Error, Debug)]
pub enum BoardError {
    /// A read request (department snapshot, machine stats) failed.
    #[error("Failed to fetch {what}: {reason}")]
    Fetch { what: String, reason: String },

    /// A write request (create, delete, position save) failed.
    #[error("Failed to persist {what}: {reason}")]
    Persist { what: String, reason: String },

    /// Input rejected on the client before any network call was made.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The requested department or machine does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A push-channel registration could not be completed.
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Pass-through for any raw I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification used to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    Persist,
    Validation,
    Other,
}

impl BoardError {
    pub fn fetch(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persist(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Persist {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Which surfacing policy applies to this error.
    ///
    /// `NotFound` counts as a read failure: a missing department renders the
    /// same terminal state as a transport failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch { .. } | Self::NotFound(_) => ErrorKind::Fetch,
            Self::Persist { .. } => ErrorKind::Persist,
            Self::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::Other,
        }
    }
}

/// Convenience alias used throughout the board crates.
pub type Result<T> = std::result::Result<T, BoardError>;
