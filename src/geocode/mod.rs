//! Geocoding with multiple provider fallback.
//!
//! Providers are tried strictly in priority order; the first usable result
//! wins. Provider failures (network, non-2xx, malformed payload) are local
//! to that provider and mean "try the next one" — not-found crosses the
//! resolver boundary as a value, never as an error.

pub mod providers;

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GeocodingConfig;
use crate::error::Result;
use providers::{CensusGeocoder, NominatimGeocoder};

/// Qualitative precision bucket for a geocode hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeAccuracy {
    Rooftop,
    Parcel,
    Street,
    City,
}

/// Result from a geocoding operation. Ephemeral: consumed once by the
/// pipeline and not persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: GeocodeAccuracy,
    pub source: String,
    pub confidence: f64,
}

/// Address fields from a reverse geocode lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseGeocodedAddress {
    pub address: String,
    pub house_number: Option<String>,
    pub road: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
}

/// Seam the pipeline depends on; lets tests substitute a mock.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(
        &self,
        address: &str,
        city: Option<&str>,
        state: Option<&str>,
        zip_code: Option<&str>,
    ) -> Option<GeocodeResult>;
}

/// A single upstream geocoding source.
///
/// `Err` means this provider failed; `Ok(None)` means it answered but found
/// nothing. The resolver treats both as "move on".
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn geocode(&self, address: &str) -> Result<Option<GeocodeResult>>;

    async fn reverse_geocode(
        &self,
        _lat: f64,
        _lng: f64,
    ) -> Result<Option<ReverseGeocodedAddress>> {
        Ok(None)
    }
}

/// Multi-provider geocoding resolver.
///
/// Default provider order: Census Bureau (free, US, rooftop accuracy) then
/// Nominatim (free, global, street accuracy). The outbound connection pool
/// is built once and shared by all providers.
pub struct GeocodingResolver {
    providers: Vec<Box<dyn GeocodeProvider>>,
}

impl GeocodingResolver {
    pub fn new(config: &GeocodingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            providers: vec![
                Box::new(CensusGeocoder::new(client.clone(), config.census_url.clone())),
                Box::new(NominatimGeocoder::new(client, config.nominatim_url.clone())),
            ],
        })
    }

    /// Build a resolver over an explicit provider list, in priority order.
    pub fn with_providers(providers: Vec<Box<dyn GeocodeProvider>>) -> Self {
        Self { providers }
    }

    pub async fn geocode(
        &self,
        address: &str,
        city: Option<&str>,
        state: Option<&str>,
        zip_code: Option<&str>,
    ) -> Option<GeocodeResult> {
        let full_address = build_full_address(address, city, state, zip_code);
        counter!("geocode_requests_total").increment(1);

        for provider in &self.providers {
            match provider.geocode(&full_address).await {
                Ok(Some(result)) => {
                    debug!(
                        provider = provider.provider_name(),
                        latitude = result.latitude,
                        longitude = result.longitude,
                        "geocode hit"
                    );
                    return Some(result);
                }
                Ok(None) => {
                    debug!(provider = provider.provider_name(), "geocode miss");
                }
                Err(e) => {
                    counter!("geocode_provider_failures_total").increment(1);
                    debug!(
                        provider = provider.provider_name(),
                        error = %e,
                        "geocode provider failed"
                    );
                }
            }
        }

        counter!("geocode_exhausted_total").increment(1);
        None
    }

    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> Option<ReverseGeocodedAddress> {
        for provider in &self.providers {
            match provider.reverse_geocode(lat, lng).await {
                Ok(Some(result)) => return Some(result),
                Ok(None) => {}
                Err(e) => {
                    debug!(
                        provider = provider.provider_name(),
                        error = %e,
                        "reverse geocode provider failed"
                    );
                }
            }
        }
        None
    }
}

#[async_trait]
impl Geocoder for GeocodingResolver {
    async fn geocode(
        &self,
        address: &str,
        city: Option<&str>,
        state: Option<&str>,
        zip_code: Option<&str>,
    ) -> Option<GeocodeResult> {
        GeocodingResolver::geocode(self, address, city, state, zip_code).await
    }
}

fn build_full_address(
    address: &str,
    city: Option<&str>,
    state: Option<&str>,
    zip_code: Option<&str>,
) -> String {
    let mut full = address.to_string();
    if let Some(city) = city {
        full.push_str(", ");
        full.push_str(city);
    }
    if let Some(state) = state {
        full.push_str(", ");
        full.push_str(state);
    }
    if let Some(zip) = zip_code {
        full.push(' ');
        full.push_str(zip);
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        name: &'static str,
        result: Result<Option<GeocodeResult>>,
        calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn hit(name: &'static str, calls: Arc<AtomicUsize>) -> Self {
            Self {
                name,
                result: Ok(Some(GeocodeResult {
                    latitude: 30.26,
                    longitude: -97.74,
                    accuracy: GeocodeAccuracy::Rooftop,
                    source: name.to_string(),
                    confidence: 0.95,
                })),
                calls,
            }
        }

        fn miss(name: &'static str, calls: Arc<AtomicUsize>) -> Self {
            Self {
                name,
                result: Ok(None),
                calls,
            }
        }

        fn failing(name: &'static str, calls: Arc<AtomicUsize>) -> Self {
            Self {
                name,
                result: Err(PipelineError::Provider {
                    message: "boom".to_string(),
                }),
                calls,
            }
        }
    }

    #[async_trait]
    impl GeocodeProvider for StubProvider {
        fn provider_name(&self) -> &'static str {
            self.name
        }

        async fn geocode(&self, _address: &str) -> Result<Option<GeocodeResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(r) => Ok(r.clone()),
                Err(_) => Err(PipelineError::Provider {
                    message: "boom".to_string(),
                }),
            }
        }
    }

    #[test]
    fn builds_full_address_from_parts() {
        assert_eq!(
            build_full_address("123 Main St", Some("Austin"), Some("TX"), Some("78701")),
            "123 Main St, Austin, TX 78701"
        );
        assert_eq!(build_full_address("123 Main St", None, None, None), "123 Main St");
    }

    #[tokio::test]
    async fn first_provider_wins() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let resolver = GeocodingResolver::with_providers(vec![
            Box::new(StubProvider::hit("first", first_calls.clone())),
            Box::new(StubProvider::hit("second", second_calls.clone())),
        ]);

        let result = resolver.geocode("123 Main St", None, None, None).await;
        assert_eq!(result.unwrap().source, "first");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_back_past_failures_and_misses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = GeocodingResolver::with_providers(vec![
            Box::new(StubProvider::failing("broken", calls.clone())),
            Box::new(StubProvider::miss("empty", calls.clone())),
            Box::new(StubProvider::hit("fallback", calls.clone())),
        ]);

        let result = resolver.geocode("123 Main St", None, None, None).await;
        assert_eq!(result.unwrap().source, "fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_providers_yield_none() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = GeocodingResolver::with_providers(vec![
            Box::new(StubProvider::failing("broken", calls.clone())),
            Box::new(StubProvider::miss("empty", calls.clone())),
        ]);

        let result = resolver.geocode("nowhere", None, None, None).await;
        assert!(result.is_none());
    }
}
