//! leafid core - plant photo identification and history
//!
//! This crate takes a photo of a plant, asks an identification service what
//! species it is, and keeps a newest-first history of the answers.
//!
//! # Features
//!
//! - JPEG/PNG ingestion with magic-byte validation and data-URI previews
//! - Mock identifier (five houseplants, fixed delay) or the Plant.id API
//! - Local history: one JSON file, capped at 20 entries
//! - Hosted history (`hosted` feature): PostgreSQL rows per signed-in user,
//!   photos in object storage
//!
//! # Example
//!
//! ```no_run
//! use leafid_core::{BackendFactory, Config, IdentificationForm, ImageIngest, ImageUpload};
//!
//! # async fn example() -> leafid_core::Result<()> {
//! let config = Config::from_env()?;
//! let backend = BackendFactory::create(&config).await?;
//!
//! let mut form = IdentificationForm::new(backend.clone(), ImageIngest::new(config.max_image_bytes));
//! form.stage(ImageUpload::from_path("leaf.jpg").await?).await?;
//! form.set_api_key("my-plant-id-key");
//!
//! let plant = form.identify().await?;
//! println!("{} ({}) {:.0}%", plant.plant_name, plant.scientific_name, plant.confidence);
//!
//! for record in backend.list(Some("monstera")).await? {
//!     println!("{} {}", record.timestamp, record.plant_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod credential;
pub mod error;
pub mod form;
pub mod history;
pub mod identify;
pub mod ingest;
pub mod model;
pub mod session;
pub mod storage;

// Re-export main types for convenience
pub use backend::{BackendFactory, BackendKind, HostedBackend, LocalBackend, PlantBackend};
pub use config::{Config, IdentifierKind};
pub use credential::ApiKey;
pub use error::{LeafError, Result, DEFAULT_HISTORY_LIMIT, DEFAULT_MAX_IMAGE_BYTES};
pub use form::IdentificationForm;
pub use history::{HistoryRef, HistoryStore, LocalHistory, RemoveOutcome};
pub use identify::{IdentifierSource, SpeciesIdentifier};
pub use ingest::{ImageIngest, ImageUpload, StagedImage};
pub use model::{Identification, SpeciesMatch};
pub use session::{MemorySession, SessionGate, User};
pub use storage::{HttpObjectStorage, ObjectStorage, StorageConfig};

#[cfg(feature = "hosted")]
pub use history::{HostedHistory, PlantRepository};
#[cfg(feature = "hosted")]
pub use session::TokenSession;
