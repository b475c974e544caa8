use thiserror::Error;

/// Default upper bound for an ingested image (10 MB).
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Default number of records the local history retains.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Error, Debug)]
pub enum LeafError {
    #[error("No image staged: upload an image first")]
    NoImage,

    #[error("Missing identification API key")]
    MissingCredential,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Image too large: {size} bytes exceeds maximum of {max} bytes")]
    ImageTooLarge { size: usize, max: usize },

    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Identification error: {0}")]
    Identification(String),

    #[error("Transient identification error: {0}")]
    IdentificationUnavailable(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl LeafError {
    /// Errors caused by the caller's input; no backend was contacted.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::NoImage
                | Self::MissingCredential
                | Self::InvalidImage(_)
                | Self::ImageTooLarge { .. }
        )
    }

    /// Network or service failures worth retrying by hand.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::IdentificationUnavailable(_) | Self::Storage(_) => true,
            Self::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            Self::NoImage => "Please upload an image first".to_string(),
            Self::MissingCredential => "Please enter your Plant.id API key".to_string(),
            Self::InvalidImage(_) | Self::ImageTooLarge { .. } => self.to_string(),
            Self::Unauthenticated(_) => "Please sign in to continue".to_string(),
            _ if self.is_transient() => {
                "The identification service is unavailable. Please try again in a moment."
                    .to_string()
            }
            _ => "Failed to identify plant. Please check your API key and try again.".to_string(),
        }
    }
}

impl From<serde_json::Error> for LeafError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

#[cfg(feature = "hosted")]
impl From<sqlx::Error> for LeafError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

#[cfg(feature = "hosted")]
impl From<sqlx::migrate::MigrateError> for LeafError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        Self::Persistence(format!("migration failed: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, LeafError>;
