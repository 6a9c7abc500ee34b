/// Result alias that carries the custom [`DeathScreenError`] type.
pub type Result<T> = std::result::Result<T, DeathScreenError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum DeathScreenError {
    /// Free-form failure surfaced by a host collaborator or a poisoned lock.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The persisted configuration could not be encoded or decoded.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// A volume argument was not a whole number of at least zero.
    #[error("invalid volume `{input}`: expected a number between 0 and 100")]
    InvalidVolume { input: String },
    /// The localized string table has no text for the requested row.
    #[error("localized log message row {row} is unavailable")]
    MissingLocalizedText { row: u32 },
    /// Reading the host's live system configuration failed.
    #[error("system configuration scan failed: {0}")]
    ConfigScan(String),
    /// An overlay image was never registered with the asset store.
    #[error("overlay texture `{0}` has not been loaded")]
    MissingTexture(String),
}

impl DeathScreenError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for DeathScreenError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for DeathScreenError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
