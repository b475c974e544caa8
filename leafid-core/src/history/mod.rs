//! Identification history.
//!
//! Two stores share one surface:
//! - **Local** ([`LocalHistory`]): a JSON file under the data directory,
//!   capped at a fixed number of entries, no notion of users.
//! - **Hosted** ([`HostedHistory`], `hosted` feature): PostgreSQL rows owned
//!   by the user that is signed in at call time, unbounded.
//!
//! Both list newest first. Records are never updated in place.

mod local;

#[cfg(feature = "hosted")]
mod hosted;

pub use local::{LocalHistory, HISTORY_ENTRY};

#[cfg(feature = "hosted")]
pub use hosted::{CareInfoRow, HostedHistory, PlantRepository, PlantRow};

use std::str::FromStr;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Identification;

/// Reference to one stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryRef {
    /// Position in the unfiltered, newest-first listing
    Index(usize),
    Id(String),
}

impl FromStr for HistoryRef {
    type Err = std::convert::Infallible;

    /// Digits are read as an index, anything else as an id.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<usize>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Id(s.to_string()),
        })
    }
}

impl std::fmt::Display for HistoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Result of a single-record delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Nothing matched; not an error
    NotFound,
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Records newest first, optionally narrowed by a case-insensitive
    /// substring of the common or scientific name.
    async fn list(&self, filter: Option<&str>) -> Result<Vec<Identification>>;

    async fn append(&self, record: Identification) -> Result<()>;

    async fn remove(&self, target: HistoryRef) -> Result<RemoveOutcome>;

    /// Remove every record in the current scope.
    async fn clear(&self) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Identification>> {
        Ok(self.list(None).await?.into_iter().find(|r| r.id == id))
    }
}
