//! Plant.id v3 API client.
//!
//! Sends the staged photo as a data URI and maps the top suggestion into a
//! [`SpeciesMatch`]. Failures are classified as transient or permanent but
//! never retried: every request is billed against the caller's key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{IdentifierSource, SpeciesIdentifier};
use crate::credential::ApiKey;
use crate::error::{LeafError, Result};
use crate::ingest::StagedImage;
use crate::model::{clamp_confidence, SpeciesMatch};

pub const DEFAULT_PLANT_ID_API_URL: &str = "https://plant.id/api/v3";

/// Detail fields requested alongside each suggestion.
const DETAILS: &str = "common_names,description,best_watering,best_light_condition,best_soil_type";

#[derive(Debug, Clone)]
pub struct PlantIdConfig {
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for PlantIdConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PLANT_ID_API_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct PlantIdClient {
    client: Client,
    config: PlantIdConfig,
}

#[derive(Debug, Serialize)]
struct IdentificationRequest<'a> {
    images: [&'a str; 1],
    similar_images: bool,
}

#[derive(Debug, Deserialize)]
struct IdentificationResponse {
    result: Option<IdentificationResult>,
}

#[derive(Debug, Deserialize)]
struct IdentificationResult {
    classification: Classification,
}

#[derive(Debug, Deserialize)]
struct Classification {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
struct Suggestion {
    name: String,
    probability: f64,
    #[serde(default)]
    details: SuggestionDetails,
}

#[derive(Debug, Default, Deserialize)]
struct SuggestionDetails {
    #[serde(default)]
    common_names: Option<Vec<String>>,
    #[serde(default)]
    description: Option<DescriptionDetail>,
    #[serde(default)]
    best_watering: Option<String>,
    #[serde(default)]
    best_light_condition: Option<String>,
    #[serde(default)]
    best_soil_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DescriptionDetail {
    value: String,
}

impl PlantIdClient {
    #[instrument(level = "debug", skip_all, fields(api_url = %config.api_url))]
    pub fn new(config: PlantIdConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                LeafError::Config(format!("Failed to create Plant.id HTTP client: {e}"))
            })?;

        debug!("Plant.id client created");
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/identification?details={DETAILS}",
            self.config.api_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl SpeciesIdentifier for PlantIdClient {
    #[instrument(level = "info", skip_all, fields(source = "plant.id", file = image.file_name()))]
    async fn identify(&self, image: &StagedImage, api_key: &ApiKey) -> Result<SpeciesMatch> {
        let start = Instant::now();
        let request = IdentificationRequest {
            images: [image.data_uri()],
            similar_images: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("Api-Key", api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let latency_ms = start.elapsed().as_millis() as u64;
                if is_transient_error(&e) {
                    warn!(error = %e, latency_ms, "Transient Plant.id error");
                    LeafError::IdentificationUnavailable(format!("Plant.id unreachable: {e}"))
                } else {
                    warn!(error = %e, latency_ms, "Plant.id request failed");
                    LeafError::Identification(format!("Plant.id request failed: {e}"))
                }
            })?;

        let status = response.status();
        debug!(status = %status, "Received Plant.id response");

        if !status.is_success() {
            return Err(status_error(status));
        }

        let parsed: IdentificationResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse Plant.id response");
            LeafError::Identification(format!("Malformed Plant.id response: {e}"))
        })?;

        let species = map_response(parsed)?;
        info!(
            plant = %species.plant_name,
            confidence = species.confidence,
            latency_ms = start.elapsed().as_millis() as u64,
            "Plant identified"
        );
        Ok(species)
    }

    fn source_id(&self) -> IdentifierSource {
        IdentifierSource::PlantId
    }
}

fn status_error(status: StatusCode) -> LeafError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LeafError::Identification(format!(
            "Plant.id rejected the request ({status}); check your API key"
        )),
        s if is_transient_status(s) => {
            warn!(status = %s, "Transient Plant.id status");
            LeafError::IdentificationUnavailable(format!("Plant.id returned status: {s}"))
        }
        s => {
            warn!(status = %s, "Permanent Plant.id status");
            LeafError::Identification(format!("Plant.id returned status: {s}"))
        }
    }
}

fn map_response(response: IdentificationResponse) -> Result<SpeciesMatch> {
    let top = response
        .result
        .and_then(|r| r.classification.suggestions.into_iter().next())
        .ok_or_else(|| LeafError::Identification("No plant recognized in the photo".into()))?;

    let details = top.details;
    let plant_name = details
        .common_names
        .as_ref()
        .and_then(|names| names.iter().find(|n| !n.trim().is_empty()))
        .cloned()
        .unwrap_or_else(|| top.name.clone());

    if plant_name.trim().is_empty() {
        return Err(LeafError::Identification(
            "Plant.id returned a suggestion without a name".into(),
        ));
    }

    let care_info = [
        details.best_watering,
        details.best_light_condition,
        details.best_soil_type,
    ]
    .into_iter()
    .flatten()
    .filter(|tip| !tip.trim().is_empty())
    .collect();

    Ok(SpeciesMatch {
        plant_name,
        scientific_name: top.name,
        confidence: clamp_confidence((top.probability * 1000.0).round() / 10.0),
        description: details.description.map(|d| d.value),
        care_info,
    })
}

/// Check if a reqwest error is transient.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
