//! Identifier selection.

use std::sync::Arc;
use std::time::Duration;

use super::{
    MockIdentifier, PlantIdClient, PlantIdConfig, SpeciesIdentifier, DEFAULT_MOCK_DELAY,
    DEFAULT_MOCK_SEED,
};
use crate::error::Result;

/// Configuration for creating an identifier.
#[derive(Debug, Clone)]
pub enum IdentifierConfig {
    /// Canned answers after a fixed delay
    Mock { seed: u64, delay: Duration },

    /// Plant.id v3 API
    PlantId(PlantIdConfig),
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        Self::Mock {
            seed: DEFAULT_MOCK_SEED,
            delay: DEFAULT_MOCK_DELAY,
        }
    }
}

/// Factory for creating identifiers.
pub struct IdentifierFactory;

impl IdentifierFactory {
    pub fn create(config: IdentifierConfig) -> Result<Arc<dyn SpeciesIdentifier>> {
        match config {
            IdentifierConfig::Mock { seed, delay } => {
                tracing::info!(delay_ms = delay.as_millis() as u64, "Using mock identifier");
                Ok(Arc::new(MockIdentifier::new(seed, delay)))
            }
            IdentifierConfig::PlantId(plant_id) => {
                tracing::info!(api_url = %plant_id.api_url, "Using Plant.id identifier");
                Ok(Arc::new(PlantIdClient::new(plant_id)?))
            }
        }
    }

    /// Zero-delay mock for testing.
    pub fn create_mock() -> Arc<dyn SpeciesIdentifier> {
        Arc::new(MockIdentifier::instant())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identify::IdentifierSource;

    #[test]
    fn test_default_config_is_mock_with_delay() {
        match IdentifierConfig::default() {
            IdentifierConfig::Mock { delay, .. } => assert_eq!(delay, DEFAULT_MOCK_DELAY),
            other => panic!("unexpected default: {other:?}"),
        }
    }

    #[test]
    fn test_create_mock() {
        let identifier = IdentifierFactory::create_mock();
        assert_eq!(identifier.source_id(), IdentifierSource::Mock);
    }

    #[test]
    fn test_create_plant_id() {
        let identifier =
            IdentifierFactory::create(IdentifierConfig::PlantId(PlantIdConfig::default()))
                .unwrap();
        assert_eq!(identifier.source_id(), IdentifierSource::PlantId);
    }
}
