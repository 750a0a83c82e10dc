//! Forward geocoding: free-text address to coordinates.
//! Uses Nominatim (OpenStreetMap) by default; no API key required.

use crate::clients::error::HttpError;
use crate::clients::forecast_client::build_client;
use crate::config::PipelineConfig;
use crate::location::error::LocationError;
use crate::types::location::Location;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::de::Error as _;
use serde::Deserialize;

/// Turns an address into a [`Location`].
///
/// `Ok(None)` means the service answered but knows no such place. Service
/// failures are errors, so the caller can tell "try another address" apart from
/// "try again later".
pub trait Geocoder {
    fn geocode(&self, query: &str) -> Result<Option<Location>, LocationError>;
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
}

pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    country_codes: String,
}

impl NominatimGeocoder {
    pub fn new(config: &PipelineConfig) -> Result<Self, HttpError> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.geocoder_url.trim_end_matches('/').to_string(),
            country_codes: config.country_codes.trim().to_string(),
        })
    }

    fn search(&self, query: &str) -> Result<String, HttpError> {
        let url = format!("{}/search", self.base_url);
        let mut params = vec![("q", query), ("format", "json"), ("limit", "1")];
        if !self.country_codes.is_empty() {
            params.push(("countrycodes", self.country_codes.as_str()));
        }
        debug!("Geocoding '{}' via {}", query, url);

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .map_err(|e| HttpError::Network(url.clone(), e))?;
        let status = response.status();
        if !status.is_success() {
            warn!("Geocoder returned {} for '{}'", status, query);
            return Err(HttpError::Status { url, status });
        }
        response.text().map_err(|e| HttpError::Network(url, e))
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, query: &str) -> Result<Option<Location>, LocationError> {
        let body = self.search(query).map_err(|source| LocationError::Provider {
            query: query.to_string(),
            source,
        })?;
        let reply = |source: serde_json::Error| LocationError::ProviderReply {
            query: query.to_string(),
            source,
        };
        let places: Vec<NominatimPlace> = serde_json::from_str(&body).map_err(reply)?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        let coordinate = |text: &str| {
            text.trim().parse::<f64>().map_err(|e| {
                reply(serde_json::Error::custom(format!(
                    "invalid coordinate '{text}': {e}"
                )))
            })
        };
        let latitude = coordinate(&place.lat)?;
        let longitude = coordinate(&place.lon)?;
        let location = Location::new(
            query,
            place.display_name.unwrap_or_default(),
            latitude,
            longitude,
        )
        .ok_or_else(|| {
            reply(serde_json::Error::custom(format!(
                "coordinates out of range: {latitude}, {longitude}"
            )))
        })?;
        info!(
            "Geocoded '{}' to {} ({:.5}, {:.5})",
            query, location.display_name, location.latitude, location.longitude
        );
        Ok(Some(location))
    }
}
