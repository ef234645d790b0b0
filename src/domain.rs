use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::address::NormalizedAddress;
use crate::quality::DataQualityScore;
use crate::resolution::MatchType;

/// Raw property record as produced by a provider adapter.
///
/// Immutable once constructed; the pipeline consumes it exactly once. The
/// payload keeps whatever provider-specific fields came over the wire, and
/// the adapter fills in the parsed fields it can.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_system: String,
    pub source_type: String,
    pub source_record_id: String,
    pub extraction_timestamp: DateTime<Utc>,
    pub raw_data: HashMap<String, Value>,

    // Parsed fields (provider fills what it can)
    #[serde(default)]
    pub parcel_id: Option<String>,
    #[serde(default)]
    pub address_raw: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// A pre-fetched candidate for entity resolution.
///
/// Supplied by the persistence layer (spatial or string-index pre-filtering);
/// the resolver itself never queries storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub apn: Option<String>,
    /// How the candidate lookup found this record
    #[serde(default)]
    pub match_type: MatchType,
}

/// Terminal output of the pipeline, ready for upsert by the caller.
///
/// A non-null `canonical_id` differing from `property_id` generation means
/// the record merged into an existing property; callers must not create a
/// new row in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub property_id: String,
    pub source_system: String,
    pub source_type: String,
    pub source_record_id: String,
    pub address: Option<NormalizedAddress>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub quality: DataQualityScore,
    pub canonical_id: Option<String>,
    pub entity_confidence: f64,
    pub raw_data: HashMap<String, Value>,
    pub extraction_timestamp: DateTime<Utc>,
}
