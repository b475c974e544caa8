//! In-memory holder for the identification service API key.

use zeroize::Zeroizing;

use crate::error::{LeafError, Result};

/// Caller-supplied API key for the identification service.
///
/// Held only in memory for the lifetime of a form session; the buffer is
/// wiped on drop and never serialized or logged.
#[derive(Clone)]
pub struct ApiKey(Zeroizing<String>);

impl ApiKey {
    /// Wrap a key, rejecting empty or whitespace-only input.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = Zeroizing::new(key.into());
        if key.trim().is_empty() {
            return Err(LeafError::MissingCredential);
        }
        Ok(Self(key))
    }

    pub fn expose(&self) -> &str {
        self.0.trim()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}
