//! Session/identity gate.
//!
//! Authentication itself belongs to an external identity provider. The
//! pipeline only asks who is signed in *right now*: every hosted operation
//! calls [`SessionGate::current_user`] at the moment it needs an owner, so
//! a sign-out between two steps is always observed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// An authenticated user of the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
}

#[async_trait]
pub trait SessionGate: Send + Sync {
    /// The user signed in at the time of the call.
    async fn current_user(&self) -> Option<User>;

    async fn sign_out(&self) -> Result<()>;
}

/// Session held in process memory.
#[derive(Debug, Default)]
pub struct MemorySession {
    user: RwLock<Option<User>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }

    pub async fn sign_in(&self, user: User) {
        *self.user.write().await = Some(user);
    }
}

#[async_trait]
impl SessionGate for MemorySession {
    async fn current_user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    async fn sign_out(&self) -> Result<()> {
        *self.user.write().await = None;
        Ok(())
    }
}

#[cfg(feature = "hosted")]
pub use token::TokenSession;

#[cfg(feature = "hosted")]
mod token {
    use std::path::{Path, PathBuf};

    use async_trait::async_trait;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use serde::Deserialize;
    use tracing::{debug, info, warn};
    use uuid::Uuid;

    use super::{SessionGate, User};
    use crate::error::{LeafError, Result};

    /// Claims carried by the identity provider's access token.
    #[derive(Debug, Deserialize)]
    struct AccessClaims {
        sub: String,
        #[serde(default)]
        email: Option<String>,
        #[allow(dead_code)]
        exp: u64,
    }

    /// Session backed by an access token file.
    ///
    /// The token is re-read and re-validated on every call, so an expired
    /// token or a deleted file signs the user out immediately.
    pub struct TokenSession {
        token_path: PathBuf,
        decoding_key: DecodingKey,
        validation: Validation,
    }

    impl TokenSession {
        pub fn new(token_path: impl Into<PathBuf>, jwt_secret: &str) -> Self {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.validate_exp = true;
            // Provider tokens carry a role-style audience we don't check
            validation.validate_aud = false;

            Self {
                token_path: token_path.into(),
                decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
                validation,
            }
        }

        pub fn token_path(&self) -> &Path {
            &self.token_path
        }

        /// Validate a token and extract the user it names.
        pub fn validate(&self, token: &str) -> Result<User> {
            let data = decode::<AccessClaims>(token.trim(), &self.decoding_key, &self.validation)
                .map_err(|e| match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        LeafError::Unauthenticated("access token has expired".into())
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        LeafError::Unauthenticated("invalid access token signature".into())
                    }
                    _ => LeafError::Unauthenticated(format!("invalid access token: {e}")),
                })?;

            let id = Uuid::parse_str(&data.claims.sub).map_err(|_| {
                LeafError::Unauthenticated(format!(
                    "token subject '{}' is not a user id",
                    data.claims.sub
                ))
            })?;

            Ok(User {
                id,
                email: data.claims.email,
            })
        }

        /// Validate and store a token obtained from the identity provider.
        pub async fn sign_in(&self, token: &str) -> Result<User> {
            let user = self.validate(token)?;
            if let Some(parent) = self.token_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&self.token_path, token.trim()).await?;

            info!(user_id = %user.id, "Signed in");
            Ok(user)
        }
    }

    #[async_trait]
    impl SessionGate for TokenSession {
        async fn current_user(&self) -> Option<User> {
            let token = match tokio::fs::read_to_string(&self.token_path).await {
                Ok(token) => token,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
                Err(e) => {
                    warn!(error = %e, path = %self.token_path.display(), "Failed to read session token");
                    return None;
                }
            };

            match self.validate(&token) {
                Ok(user) => Some(user),
                Err(e) => {
                    debug!(error = %e, "Stored session token rejected");
                    None
                }
            }
        }

        async fn sign_out(&self) -> Result<()> {
            match tokio::fs::remove_file(&self.token_path).await {
                Ok(()) => {
                    info!("Signed out");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        }
    }

    impl std::fmt::Debug for TokenSession {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("TokenSession")
                .field("token_path", &self.token_path)
                .field("jwt_secret", &"[REDACTED]")
                .finish()
        }
    }

}
