//! Backend capability interface.
//!
//! A [`PlantBackend`] bundles the identifier with a history store. The
//! local backend keeps everything on disk; the hosted backend needs a
//! signed-in user, uploads photos to object storage and writes history rows
//! owned by that user.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::credential::ApiKey;
use crate::error::{LeafError, Result};
use crate::history::{HistoryRef, HistoryStore, LocalHistory, RemoveOutcome};
use crate::identify::{IdentifierFactory, SpeciesIdentifier};
use crate::ingest::StagedImage;
use crate::model::Identification;
use crate::session::SessionGate;
use crate::storage::{object_path, ObjectStorage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Local,
    Hosted,
}

impl FromStr for BackendKind {
    type Err = LeafError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "hosted" => Ok(Self::Hosted),
            other => Err(LeafError::Config(format!(
                "unknown backend '{other}' (expected local or hosted)"
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Hosted => write!(f, "hosted"),
        }
    }
}

#[async_trait]
pub trait PlantBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Identify the plant in `image` and record the result.
    ///
    /// Recording is best-effort: once the identifier has answered, the
    /// record is returned even if it could not be stored.
    async fn identify(&self, image: &StagedImage, api_key: &ApiKey) -> Result<Identification>;

    async fn list(&self, filter: Option<&str>) -> Result<Vec<Identification>>;

    async fn append(&self, record: Identification) -> Result<()>;

    async fn remove(&self, target: HistoryRef) -> Result<RemoveOutcome>;

    async fn clear(&self) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Identification>> {
        Ok(self.list(None).await?.into_iter().find(|r| r.id == id))
    }
}

/// Store a finished record, logging instead of failing.
async fn record_best_effort(history: &dyn HistoryStore, record: &Identification) {
    match history.append(record.clone()).await {
        Ok(()) => debug!(id = %record.id, "Identification recorded"),
        Err(e) => warn!(error = %e, id = %record.id, "Failed to record identification"),
    }
}

/// On-device backend: mock or real identifier, JSON-file history.
pub struct LocalBackend {
    identifier: Arc<dyn SpeciesIdentifier>,
    history: Arc<dyn HistoryStore>,
}

impl LocalBackend {
    pub fn new(identifier: Arc<dyn SpeciesIdentifier>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            identifier,
            history,
        }
    }
}

#[async_trait]
impl PlantBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    #[instrument(level = "debug", skip_all, fields(file = image.file_name()))]
    async fn identify(&self, image: &StagedImage, api_key: &ApiKey) -> Result<Identification> {
        let species = self.identifier.identify(image, api_key).await?;
        let record = Identification::from_match(species, image.data_uri().to_string());

        record_best_effort(self.history.as_ref(), &record).await;
        Ok(record)
    }

    async fn list(&self, filter: Option<&str>) -> Result<Vec<Identification>> {
        self.history.list(filter).await
    }

    async fn append(&self, record: Identification) -> Result<()> {
        self.history.append(record).await
    }

    async fn remove(&self, target: HistoryRef) -> Result<RemoveOutcome> {
        self.history.remove(target).await
    }

    async fn clear(&self) -> Result<()> {
        self.history.clear().await
    }

    async fn get(&self, id: &str) -> Result<Option<Identification>> {
        self.history.get(id).await
    }
}

/// Backend for signed-in users: photos in object storage, rows in the
/// hosted history.
pub struct HostedBackend {
    identifier: Arc<dyn SpeciesIdentifier>,
    storage: Option<Arc<dyn ObjectStorage>>,
    session: Arc<dyn SessionGate>,
    history: Arc<dyn HistoryStore>,
}

impl HostedBackend {
    /// The history store must resolve its owner through the same `session`.
    pub fn new(
        identifier: Arc<dyn SpeciesIdentifier>,
        storage: Option<Arc<dyn ObjectStorage>>,
        session: Arc<dyn SessionGate>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            identifier,
            storage,
            session,
            history,
        }
    }

    pub fn session(&self) -> &Arc<dyn SessionGate> {
        &self.session
    }

    /// Upload the photo, or fall back to its data URI.
    async fn image_url(&self, image: &StagedImage) -> String {
        let Some(storage) = &self.storage else {
            debug!("No object storage configured, keeping data URI");
            return image.data_uri().to_string();
        };

        let path = object_path(image.file_name(), Utc::now());
        match storage.upload(&path, image.bytes(), image.mime_type()).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, path = %path, "Photo upload failed, keeping data URI");
                image.data_uri().to_string()
            }
        }
    }
}

#[async_trait]
impl PlantBackend for HostedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hosted
    }

    #[instrument(level = "debug", skip_all, fields(file = image.file_name()))]
    async fn identify(&self, image: &StagedImage, api_key: &ApiKey) -> Result<Identification> {
        if self.session.current_user().await.is_none() {
            return Err(LeafError::Unauthenticated(
                "sign in to identify plants with the hosted backend".into(),
            ));
        }

        let species = self.identifier.identify(image, api_key).await?;
        let image_url = self.image_url(image).await;
        let record = Identification::from_match(species, image_url);

        // The store looks the user up again, so a sign-out since the check
        // above makes this write fail rather than land under the old user
        record_best_effort(self.history.as_ref(), &record).await;
        Ok(record)
    }

    async fn list(&self, filter: Option<&str>) -> Result<Vec<Identification>> {
        self.history.list(filter).await
    }

    async fn append(&self, record: Identification) -> Result<()> {
        self.history.append(record).await
    }

    async fn remove(&self, target: HistoryRef) -> Result<RemoveOutcome> {
        self.history.remove(target).await
    }

    async fn clear(&self) -> Result<()> {
        self.history.clear().await
    }

    async fn get(&self, id: &str) -> Result<Option<Identification>> {
        self.history.get(id).await
    }
}

/// Builds the backend selected by [`Config::backend`].
pub struct BackendFactory;

impl BackendFactory {
    pub async fn create(config: &Config) -> Result<Arc<dyn PlantBackend>> {
        let identifier = IdentifierFactory::create(config.identifier_config())?;

        match config.backend {
            BackendKind::Local => {
                let history = LocalHistory::open(&config.data_dir, config.history_limit).await;
                info!(path = ?history.path(), "Using local backend");
                Ok(Arc::new(LocalBackend::new(identifier, Arc::new(history))))
            }
            BackendKind::Hosted => Self::create_hosted(config, identifier).await,
        }
    }

    #[cfg(feature = "hosted")]
    async fn create_hosted(
        config: &Config,
        identifier: Arc<dyn SpeciesIdentifier>,
    ) -> Result<Arc<dyn PlantBackend>> {
        use crate::history::{HostedHistory, PlantRepository};
        use crate::storage::HttpObjectStorage;

        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| LeafError::Config("DATABASE_URL is not set".into()))?;
        let session: Arc<dyn SessionGate> = Arc::new(config.token_session()?);

        // Connections and migrations wait for the first signed-in query
        let repo = PlantRepository::connect_lazy(
            database_url,
            config.database_max_connections,
            config.database_acquire_timeout,
        )?;

        let storage: Option<Arc<dyn ObjectStorage>> = match config.storage_config() {
            Some(storage) => Some(Arc::new(HttpObjectStorage::new(storage)?)),
            None => {
                info!("STORAGE_URL or STORAGE_API_KEY not set, photos stay inline");
                None
            }
        };

        let history = Arc::new(HostedHistory::new(repo, session.clone()));
        info!("Using hosted backend");
        Ok(Arc::new(HostedBackend::new(
            identifier, storage, session, history,
        )))
    }

    #[cfg(not(feature = "hosted"))]
    async fn create_hosted(
        _config: &Config,
        _identifier: Arc<dyn SpeciesIdentifier>,
    ) -> Result<Arc<dyn PlantBackend>> {
        Err(LeafError::Config(
            "built without the `hosted` feature".into(),
        ))
    }
}
