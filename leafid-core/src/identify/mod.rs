//! Species identification services.
//!
//! The species-matching model itself is an external service; this module
//! only defines how it is called and how its answer is normalized.
//!
//! - **Mock** - fixed table of five houseplants behind an artificial delay
//! - **Plant.id** - HTTP client for the Plant.id v3 API (requires an API key)
//!
//! ```no_run
//! use leafid_core::identify::{IdentifierConfig, IdentifierFactory};
//! use leafid_core::{ApiKey, ImageIngest, ImageUpload};
//!
//! # async fn example() -> leafid_core::Result<()> {
//! let identifier = IdentifierFactory::create(IdentifierConfig::default())?;
//! let image = ImageIngest::default()
//!     .stage(ImageUpload::from_path("leaf.jpg").await?)
//!     .await?;
//! let species = identifier.identify(&image, &ApiKey::new("key")?).await?;
//! println!("{} ({:.0}%)", species.plant_name, species.confidence);
//! # Ok(())
//! # }
//! ```

mod mock;
mod plant_id;
mod provider;

pub use mock::{
    CatalogEntry, MockIdentifier, DEFAULT_MOCK_DELAY, DEFAULT_MOCK_SEED, MOCK_CATALOG,
};
pub use plant_id::{PlantIdClient, PlantIdConfig, DEFAULT_PLANT_ID_API_URL};
pub use provider::{IdentifierConfig, IdentifierFactory};

use async_trait::async_trait;

use crate::credential::ApiKey;
use crate::error::Result;
use crate::ingest::StagedImage;
use crate::model::SpeciesMatch;

/// A service that recognizes the plant in a photo.
///
/// Implementations must be thread-safe (`Send + Sync`) and must not retain
/// the API key beyond the call.
#[async_trait]
pub trait SpeciesIdentifier: Send + Sync {
    async fn identify(&self, image: &StagedImage, api_key: &ApiKey) -> Result<SpeciesMatch>;

    fn source_id(&self) -> IdentifierSource;
}

/// Which service produced an identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IdentifierSource {
    PlantId,
    /// Canned answers for demos and tests
    Mock,
}

impl std::fmt::Display for IdentifierSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlantId => write!(f, "Plant.id"),
            Self::Mock => write!(f, "Mock (canned results)"),
        }
    }
}
