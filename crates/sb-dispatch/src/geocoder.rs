use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    api_interfaces::geocode, constants::*, error::GetError, util::default_http_client, ApiKey,
};

/// A point on the WGS-84 ellipsoid, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` unless both values are finite and within range.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let in_range = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        in_range.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// Outcome of geocoding a single address.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Geocode {
    Resolved(Coordinates),
    Unresolved,
}

impl Geocode {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            Geocode::Resolved(coordinates) => Some(*coordinates),
            Geocode::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Geocode::Resolved(_))
    }
}

/// Translates a free-text address into coordinates.
///
/// Implementations make a single best-effort attempt and never fail: any
/// problem is reported as [`Geocode::Unresolved`].
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn resolve(&self, address: &str) -> Geocode;
}

/// Client for the Yandex geocoder HTTP API.
#[derive(Clone, Debug)]
pub struct YandexGeocoder {
    http_client: Client,
    endpoint: Option<String>,
    api_key: ApiKey,
}

impl YandexGeocoder {
    /// Create a geocoder using the default HTTP client and endpoint.
    pub fn with_default_client(api_key: ApiKey) -> reqwest::Result<Self> {
        Ok(Self::new(default_http_client()?, None, api_key))
    }

    /// Create a geocoder using a custom HTTP client and endpoint.
    /// If the endpoint is not provided, the public Yandex endpoint will be used.
    pub fn new(http_client: Client, endpoint: Option<String>, api_key: ApiKey) -> Self {
        Self {
            http_client,
            endpoint,
            api_key,
        }
    }

    /// Look up the most relevant place for `address`.
    pub async fn fetch(&self, address: &str) -> Result<Coordinates, GetError> {
        let response = self
            .http_client
            .get(self.endpoint.as_deref().unwrap_or(DEFAULT_GEOCODER_URL))
            .query(&[
                (GEOCODE_PARAM, address),
                (API_KEY_PARAM, self.api_key.get()),
                (FORMAT_PARAM, GEOCODER_RESPONSE_FORMAT),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(GetError::ResponseError(response.status()));
        }
        let body = response.text().await.map_err(GetError::ResponseBodyError)?;
        let parsed_body: geocode::Response = serde_json::from_str(&body)?;
        let most_relevant = parsed_body
            .response
            .geo_object_collection
            .feature_member
            .into_iter()
            .next()
            .ok_or(GetError::NoResults)?;
        let most_relevant: geocode::FeatureMember = serde_json::from_value(most_relevant)?;
        parse_position(&most_relevant.geo_object.point.pos)
    }
}

#[async_trait]
impl Geocoder for YandexGeocoder {
    async fn resolve(&self, address: &str) -> Geocode {
        info!(address, "requesting coordinates from geocoder");
        match self.fetch(address).await {
            Ok(coordinates) => Geocode::Resolved(coordinates),
            Err(error) => {
                warn!(address, %error, "geocoding failed");
                Geocode::Unresolved
            }
        }
    }
}

/// Parse the provider's `"lon lat"` position string.
fn parse_position(pos: &str) -> Result<Coordinates, GetError> {
    let malformed = || GetError::MalformedPosition(pos.to_owned());
    let mut parts = pos.split_whitespace();
    let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };
    let longitude: f64 = lon.parse().map_err(|_| malformed())?;
    let latitude: f64 = lat.parse().map_err(|_| malformed())?;
    Coordinates::new(latitude, longitude).ok_or_else(malformed)
}
