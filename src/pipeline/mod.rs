//! ETL pipeline for property data ingestion.
//!
//! Stages:
//!   1. Extract — fetch from provider (handled by adapters, outside this core)
//!   2. Transform — normalize, geocode, entity-resolve, score quality
//!   3. Load — upsert to the canonical store (handled by the caller)
//!
//! Each `process` call owns its intermediate values and touches no shared
//! mutable state beyond the geocoder's connection pool, so independent
//! records may be processed concurrently without coordination.

use metrics::{counter, histogram};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::address::{normalize, NormalizedAddress};
use crate::domain::{CandidateRecord, ProcessedRecord, RawRecord};
use crate::error::{PipelineError, Result};
use crate::extract::extract_property_fields;
use crate::geocode::Geocoder;
use crate::quality::calculate_quality_score;
use crate::resolution::{resolve_from_candidates, ResolutionAction, ResolutionInput};

/// A record that could not be processed, with enough context to retry it.
#[derive(Debug, Clone, Serialize)]
pub struct RecordFailure {
    pub source_system: String,
    pub source_record_id: String,
    pub error: String,
}

/// Result of a batch run: per-record successes and failures, no partial
/// output for failed records.
#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    pub total: usize,
    pub processed: Vec<ProcessedRecord>,
    pub failures: Vec<RecordFailure>,
}

pub struct IngestionPipeline {
    geocoder: Arc<dyn Geocoder>,
}

impl IngestionPipeline {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self { geocoder }
    }

    /// Process a single raw record through the Transform stage.
    ///
    /// The caller supplies pre-fetched entity-resolution candidates (or none,
    /// which skips resolution) and persists the returned record. Any failure
    /// aborts this record only; id generation is deterministic, so retries
    /// are idempotent.
    pub async fn process(
        &self,
        raw: &RawRecord,
        candidates: Option<&[CandidateRecord]>,
    ) -> Result<ProcessedRecord> {
        validate_raw_record(raw)?;

        // 1. Normalize address
        let address: Option<NormalizedAddress> =
            raw.address_raw.as_deref().map(normalize);

        // 2. Geocode if coordinates are missing; a miss is non-fatal
        let mut latitude = raw.latitude;
        let mut longitude = raw.longitude;
        if latitude.is_none() || longitude.is_none() {
            let formatted = address
                .as_ref()
                .and_then(|a| a.formatted_address.as_deref());
            if let Some(formatted) = formatted {
                if let Some(geo) = self.geocoder.geocode(formatted, None, None, None).await {
                    latitude = Some(geo.latitude);
                    longitude = Some(geo.longitude);
                }
            }
        }

        // 3. Entity resolution over pre-fetched candidates
        let mut canonical_id: Option<String> = None;
        let mut entity_confidence = 0.0;
        let duplicate_check = candidates.map_or(false, |c| !c.is_empty());
        if let Some(candidates) = candidates.filter(|c| !c.is_empty()) {
            let input = ResolutionInput {
                address: address
                    .as_ref()
                    .and_then(|a| a.formatted_address.clone()),
                latitude,
                longitude,
                parcel_id: raw.parcel_id.clone(),
            };
            let resolution = resolve_from_candidates(&input, candidates);
            if resolution.action == ResolutionAction::AutoMerge {
                canonical_id = resolution.canonical_id;
            }
            entity_confidence = resolution.confidence;
        }

        // 4. Generate the record's own id; the merge id wins when present
        let property_id = canonical_id
            .clone()
            .unwrap_or_else(|| generate_property_id(raw, address.as_ref()));

        // 5. Score quality over the extracted field set
        let fields = extract_property_fields(&raw.raw_data);
        let quality =
            calculate_quality_score(&fields, Some(raw.extraction_timestamp), duplicate_check);

        info!(
            property_id = %property_id,
            source = %raw.source_system,
            quality_score = quality.score,
            "processed property record"
        );
        counter!("ingest_records_processed_total").increment(1);

        Ok(ProcessedRecord {
            property_id,
            source_system: raw.source_system.clone(),
            source_type: raw.source_type.clone(),
            source_record_id: raw.source_record_id.clone(),
            address,
            latitude,
            longitude,
            quality,
            canonical_id,
            entity_confidence,
            raw_data: raw.raw_data.clone(),
            extraction_timestamp: raw.extraction_timestamp,
        })
    }

    /// Process a batch of raw records with per-record failure isolation.
    ///
    /// One bad record never aborts the batch. No record is retried here;
    /// retry policy belongs to the driver.
    pub async fn process_batch(&self, records: &[RawRecord]) -> BatchOutcome {
        let run_id = Uuid::new_v4();
        let start = std::time::Instant::now();
        let mut processed = Vec::with_capacity(records.len());
        let mut failures = Vec::new();

        info!(run_id = %run_id, total = records.len(), "starting ingestion batch");

        for raw in records {
            match self.process(raw, None).await {
                Ok(record) => processed.push(record),
                Err(e) => {
                    error!(
                        source = %raw.source_system,
                        source_id = %raw.source_record_id,
                        error = %e,
                        "failed to process record"
                    );
                    counter!("ingest_records_failed_total").increment(1);
                    failures.push(RecordFailure {
                        source_system: raw.source_system.clone(),
                        source_record_id: raw.source_record_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        histogram!("ingest_batch_duration_seconds").record(start.elapsed().as_secs_f64());
        info!(
            run_id = %run_id,
            succeeded = processed.len(),
            failed = failures.len(),
            "ingestion batch finished"
        );

        BatchOutcome {
            run_id,
            total: records.len(),
            processed,
            failures,
        }
    }
}

/// Generate a canonical property id: `{STATE}-{HASH}`.
///
/// The hash input is the parcel id when present, otherwise the
/// `source_system:source_record_id` tuple, so the id is a pure deterministic
/// function of its inputs.
pub fn generate_property_id(raw: &RawRecord, address: Option<&NormalizedAddress>) -> String {
    let state = address
        .and_then(|a| a.state.as_deref())
        .unwrap_or("XX");

    let hash_input = raw
        .parcel_id
        .clone()
        .unwrap_or_else(|| format!("{}:{}", raw.source_system, raw.source_record_id));

    let digest = Sha256::digest(hash_input.as_bytes());
    let hash_suffix = hex::encode(digest)[..10].to_uppercase();

    format!("{}-{}", state, hash_suffix)
}

fn validate_raw_record(raw: &RawRecord) -> Result<()> {
    if raw.source_system.trim().is_empty() {
        return Err(PipelineError::InvalidRecord(
            "source_system is empty".to_string(),
        ));
    }
    if raw.source_record_id.trim().is_empty() {
        return Err(PipelineError::InvalidRecord(
            "source_record_id is empty".to_string(),
        ));
    }
    Ok(())
}
