//! Upstream geocoding providers.

use async_trait::async_trait;
use serde::Deserialize;

use super::{GeocodeAccuracy, GeocodeProvider, GeocodeResult, ReverseGeocodedAddress};
use crate::error::Result;

/// US Census Bureau geocoder. Free, US only, rooftop accuracy.
pub struct CensusGeocoder {
    client: reqwest::Client,
    url: String,
}

impl CensusGeocoder {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[derive(Debug, Deserialize)]
struct CensusResponse {
    result: Option<CensusResult>,
}

#[derive(Debug, Deserialize)]
struct CensusResult {
    #[serde(rename = "addressMatches", default)]
    address_matches: Vec<CensusMatch>,
}

#[derive(Debug, Deserialize)]
struct CensusMatch {
    coordinates: CensusCoordinates,
}

#[derive(Debug, Deserialize)]
struct CensusCoordinates {
    x: f64,
    y: f64,
}

#[async_trait]
impl GeocodeProvider for CensusGeocoder {
    fn provider_name(&self) -> &'static str {
        "census"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("address", address),
                ("benchmark", "Public_AR_Current"),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: CensusResponse = response.json().await?;

        let Some(first_match) = data
            .result
            .and_then(|r| r.address_matches.into_iter().next())
        else {
            return Ok(None);
        };

        Ok(Some(GeocodeResult {
            latitude: first_match.coordinates.y,
            longitude: first_match.coordinates.x,
            accuracy: GeocodeAccuracy::Rooftop,
            source: "census".to_string(),
            confidence: 0.95,
        }))
    }
}

/// OpenStreetMap Nominatim. Free, global, street accuracy. Also serves
/// reverse geocoding.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
}

#[async_trait]
impl GeocodeProvider for NominatimGeocoder {
    fn provider_name(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?;

        let places: Vec<NominatimPlace> = response.json().await?;
        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };

        // Nominatim returns coordinates as strings; malformed values count
        // as a miss, not a failure.
        let (Ok(latitude), Ok(longitude)) = (place.lat.parse::<f64>(), place.lon.parse::<f64>())
        else {
            return Ok(None);
        };

        Ok(Some(GeocodeResult {
            latitude,
            longitude,
            accuracy: GeocodeAccuracy::Street,
            source: "nominatim".to_string(),
            confidence: 0.8,
        }))
    }

    async fn reverse_geocode(
        &self,
        lat: f64,
        lng: f64,
    ) -> Result<Option<ReverseGeocodedAddress>> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lng.to_string()),
                ("format", "json".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: NominatimReverse = response.json().await?;
        let addr = data.address.unwrap_or_default();

        Ok(Some(ReverseGeocodedAddress {
            address: data.display_name.unwrap_or_default(),
            house_number: addr.house_number,
            road: addr.road,
            city: addr.city,
            state: addr.state,
            postcode: addr.postcode,
        }))
    }
}
