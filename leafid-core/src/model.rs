//! The identification record and the raw species match it is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Species data returned by an identification service, before it is bound
/// to an image and a moment in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesMatch {
    pub plant_name: String,
    pub scientific_name: String,
    /// Percentage in [0, 100]
    pub confidence: f64,
    pub description: Option<String>,
    pub care_info: Vec<String>,
}

/// One plant-recognition result.
///
/// Records are immutable once created: stores only ever insert or delete
/// them. Field names follow the persisted camelCase shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identification {
    pub id: String,
    pub plant_name: String,
    pub scientific_name: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub care_info: Option<Vec<String>>,
    /// Data URI or public URL of the photo
    pub image_url: String,
    pub timestamp: DateTime<Utc>,
}

impl Identification {
    /// Bind a species match to an image reference with a fresh id and the
    /// current time.
    pub fn from_match(species: SpeciesMatch, image_url: String) -> Self {
        Self::from_match_at(species, image_url, Utc::now())
    }

    pub fn from_match_at(species: SpeciesMatch, image_url: String, at: DateTime<Utc>) -> Self {
        let care_info = if species.care_info.is_empty() {
            None
        } else {
            Some(species.care_info)
        };

        Self {
            id: Uuid::new_v4().to_string(),
            plant_name: species.plant_name,
            scientific_name: species.scientific_name,
            confidence: clamp_confidence(species.confidence),
            description: species.description.filter(|d| !d.trim().is_empty()),
            care_info,
            image_url,
            timestamp: at,
        }
    }

    /// Case-insensitive substring match on either name.
    pub fn matches(&self, term: &str) -> bool {
        let needle = term.to_lowercase();
        self.plant_name.to_lowercase().contains(&needle)
            || self.scientific_name.to_lowercase().contains(&needle)
    }

    pub fn care_tips(&self) -> &[String] {
        self.care_info.as_deref().unwrap_or(&[])
    }
}

/// Clamp a provider score into [0, 100]; NaN becomes 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Keep the records matching `filter`, preserving order. An empty or
/// whitespace-only filter keeps everything.
pub fn filter_records(records: Vec<Identification>, filter: Option<&str>) -> Vec<Identification> {
    match filter.map(str::trim) {
        Some(term) if !term.is_empty() => records.into_iter().filter(|r| r.matches(term)).collect(),
        _ => records,
    }
}
