use anyhow::{Context, Result};
use async_trait::async_trait;
use orderwatch_config::SalesMapConfig;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    pub area: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Transport(String),

    #[error("geocoder returned HTTP {0}")]
    Upstream(u16),

    #[error("geocoder returned malformed body: {0}")]
    Decode(String),
}

/// Resolves a normalized postal code to coordinates. `Ok(None)` means the code is unknown.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, postcode: &str) -> Result<Option<Coordinates>, GeocodeError>;
}

/// Strips all whitespace and uppercases; `"sw1a 1aa"` and `"SW1A1AA"` share a cache entry.
pub fn normalize_postcode(raw: &str) -> String {
    raw.chars()
        .filter(|ch| !ch.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: u16,
    #[serde(default)]
    result: Option<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    admin_district: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PostcodesIoGeocoder {
    http: Client,
    base_url: Url,
    fallback_area: String,
}

impl PostcodesIoGeocoder {
    pub fn from_config(config: &SalesMapConfig, fallback_area: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.geocoder_timeout_ms.max(500)))
            .build()
            .context("failed to build geocoder http client")?;
        let base_url = Url::parse(config.geocoder_base_url.trim())
            .with_context(|| format!("invalid geocoder base url {}", config.geocoder_base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("geocoder base url cannot carry a path: {}", base_url);
        }
        Ok(Self {
            http,
            base_url,
            fallback_area: fallback_area.to_string(),
        })
    }
}

impl PostcodesIoGeocoder {
    /// `{base}/postcodes/{postcode}` with the postcode percent-encoded as a single path segment.
    fn postcode_url(&self, postcode: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("postcodes").push(postcode);
        }
        url
    }
}

#[async_trait]
impl Geocoder for PostcodesIoGeocoder {
    async fn lookup(&self, postcode: &str) -> Result<Option<Coordinates>, GeocodeError> {
        if postcode.is_empty() {
            return Ok(None);
        }
        let url = self.postcode_url(postcode);
        let response = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| GeocodeError::Transport(error.without_url().to_string()))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(postcode, "postcode not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GeocodeError::Upstream(status.as_u16()));
        }
        let body: LookupResponse = response
            .json()
            .await
            .map_err(|error| GeocodeError::Decode(error.without_url().to_string()))?;
        if body.status != 200 {
            return Ok(None);
        }
        let Some(result) = body.result else {
            return Ok(None);
        };
        let (Some(lat), Some(lng)) = (result.latitude, result.longitude) else {
            return Ok(None);
        };
        let area = [result.admin_district, result.region]
            .into_iter()
            .flatten()
            .map(|area| area.trim().to_string())
            .find(|area| !area.is_empty())
            .unwrap_or_else(|| self.fallback_area.clone());
        Ok(Some(Coordinates { lat, lng, area }))
    }
}
