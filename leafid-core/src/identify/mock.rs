//! Mock identifier for demos and testing.

use std::time::Duration;

use async_trait::async_trait;
use sha3::{Digest, Sha3_256};
use tracing::debug;

use super::{IdentifierSource, SpeciesIdentifier};
use crate::credential::ApiKey;
use crate::error::Result;
use crate::ingest::StagedImage;
use crate::model::SpeciesMatch;

/// Simulated round-trip of the identification API.
pub const DEFAULT_MOCK_DELAY: Duration = Duration::from_millis(2000);

pub const DEFAULT_MOCK_SEED: u64 = 0x1EAF_1D00;

/// One canned answer.
pub struct CatalogEntry {
    pub plant_name: &'static str,
    pub scientific_name: &'static str,
    pub confidence: f64,
    pub description: &'static str,
    pub care_info: [&'static str; 4],
}

impl CatalogEntry {
    fn to_match(&self) -> SpeciesMatch {
        SpeciesMatch {
            plant_name: self.plant_name.to_string(),
            scientific_name: self.scientific_name.to_string(),
            confidence: self.confidence,
            description: Some(self.description.to_string()),
            care_info: self.care_info.iter().map(|s| s.to_string()).collect(),
        }
    }
}

pub const MOCK_CATALOG: [CatalogEntry; 5] = [
    CatalogEntry {
        plant_name: "Monstera Deliciosa",
        scientific_name: "Monstera deliciosa",
        confidence: 95.0,
        description: "The Monstera deliciosa is a species of flowering plant native to tropical forests of southern Mexico, south to Panama. It has been introduced to many tropical areas, and has become a mildly invasive species in Hawaii, Seychelles, Ascension Island and the Society Islands.",
        care_info: [
            "Water when the top inch of soil is dry",
            "Prefers bright, indirect light",
            "Keep in humid environment",
            "Fertilize monthly during growing season",
        ],
    },
    CatalogEntry {
        plant_name: "Snake Plant",
        scientific_name: "Dracaena trifasciata",
        confidence: 92.0,
        description: "The snake plant, commonly referred to as mother-in-law's tongue, is one of the most popular and hardy species of houseplants. It features stiff, sword-like leaves and can range from six inches to eight feet tall.",
        care_info: [
            "Water sparingly, allowing soil to dry completely between waterings",
            "Tolerates low light but grows best in bright, indirect light",
            "Prefers warm temperatures between 70-90°F",
            "Fertilize lightly during the growing season",
        ],
    },
    CatalogEntry {
        plant_name: "Peace Lily",
        scientific_name: "Spathiphyllum wallisii",
        confidence: 89.0,
        description: "The peace lily is a popular indoor plant known for its ability to clean the air and its beautiful white flowers. It's relatively easy to care for and can thrive in low light conditions.",
        care_info: [
            "Keep soil consistently moist but not soggy",
            "Thrives in low to medium indirect light",
            "Prefers high humidity",
            "Fertilize every 6-8 weeks during growing season",
        ],
    },
    CatalogEntry {
        plant_name: "Fiddle Leaf Fig",
        scientific_name: "Ficus lyrata",
        confidence: 87.0,
        description: "The fiddle leaf fig is a popular indoor tree with large, violin-shaped leaves that grow upright. These plants are native to tropical parts of Africa, where they thrive in warm and humid conditions.",
        care_info: [
            "Water when the top inch of soil is dry",
            "Requires bright, filtered light",
            "Prefers consistent temperatures around 65-75°F",
            "Rotate regularly to ensure even growth",
        ],
    },
    CatalogEntry {
        plant_name: "Pothos",
        scientific_name: "Epipremnum aureum",
        confidence: 94.0,
        description: "Pothos is an easy-to-grow indoor plant that's excellent for beginners. It features heart-shaped leaves and is known for its air-purifying qualities. It can be grown in water or soil and is very forgiving.",
        care_info: [
            "Allow soil to dry between waterings",
            "Thrives in a variety of light conditions",
            "Trim regularly to promote bushier growth",
            "Can be propagated easily in water",
        ],
    },
];

/// Mock identifier answering from [`MOCK_CATALOG`].
///
/// The entry is picked from a SHA3 digest of the seed and the image bytes,
/// so the same photo always gets the same answer.
/// WARNING: Do not use in production - it never looks at the plant!
pub struct MockIdentifier {
    seed: u64,
    delay: Duration,
}

impl MockIdentifier {
    pub fn new(seed: u64, delay: Duration) -> Self {
        Self { seed, delay }
    }

    /// Zero-delay mock for tests.
    pub fn instant() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Pick the catalog entry for a payload without waiting.
    pub fn pick(&self, payload: &[u8]) -> SpeciesMatch {
        let mut hasher = Sha3_256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(payload);
        let digest = hasher.finalize();

        let index = digest[0] as usize % MOCK_CATALOG.len();
        MOCK_CATALOG[index].to_match()
    }
}

impl Default for MockIdentifier {
    fn default() -> Self {
        Self::new(DEFAULT_MOCK_SEED, DEFAULT_MOCK_DELAY)
    }
}

#[async_trait]
impl SpeciesIdentifier for MockIdentifier {
    async fn identify(&self, image: &StagedImage, _api_key: &ApiKey) -> Result<SpeciesMatch> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let species = self.pick(image.bytes());
        debug!(plant = %species.plant_name, file = image.file_name(), "Mock identification");
        Ok(species)
    }

    fn source_id(&self) -> IdentifierSource {
        IdentifierSource::Mock
    }
}
