//! One identification session: a staged photo, a credential and the last
//! result.

use std::sync::Arc;

use tracing::debug;

use crate::backend::PlantBackend;
use crate::credential::ApiKey;
use crate::error::{LeafError, Result};
use crate::ingest::{ImageIngest, ImageUpload, StagedImage};
use crate::model::Identification;

/// Staging a new photo, or clearing it, always drops the previous result.
pub struct IdentificationForm {
    backend: Arc<dyn PlantBackend>,
    ingest: ImageIngest,
    staged: Option<StagedImage>,
    api_key: Option<ApiKey>,
    result: Option<Identification>,
}

impl IdentificationForm {
    pub fn new(backend: Arc<dyn PlantBackend>, ingest: ImageIngest) -> Self {
        Self {
            backend,
            ingest,
            staged: None,
            api_key: None,
            result: None,
        }
    }

    /// Replace the staged photo.
    ///
    /// The previous photo and result are gone even if `upload` is rejected.
    pub async fn stage(&mut self, upload: ImageUpload) -> Result<&StagedImage> {
        self.staged = None;
        self.result = None;

        let image = self.ingest.stage(upload).await?;
        Ok(self.staged.insert(image))
    }

    pub fn clear_image(&mut self) {
        self.staged = None;
        self.result = None;
    }

    /// A blank key clears the stored one.
    pub fn set_api_key(&mut self, key: impl Into<String>) {
        self.api_key = ApiKey::new(key).ok();
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Identify the staged photo.
    ///
    /// A failed call leaves the previous result in place.
    pub async fn identify(&mut self) -> Result<&Identification> {
        let image = self.staged.as_ref().ok_or(LeafError::NoImage)?;
        let api_key = self.api_key.as_ref().ok_or(LeafError::MissingCredential)?;

        let record = self.backend.identify(image, api_key).await?;
        debug!(id = %record.id, plant = %record.plant_name, "Identification complete");
        Ok(self.result.insert(record))
    }

    pub fn result(&self) -> Option<&Identification> {
        self.result.as_ref()
    }

    pub fn staged(&self) -> Option<&StagedImage> {
        self.staged.as_ref()
    }

    pub fn backend(&self) -> &Arc<dyn PlantBackend> {
        &self.backend
    }
}

impl std::fmt::Debug for IdentificationForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentificationForm")
            .field("backend", &self.backend.kind())
            .field("staged", &self.staged)
            .field("api_key", &self.api_key)
            .field("result", &self.result.as_ref().map(|r| &r.id))
            .finish()
    }
}
