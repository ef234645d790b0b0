//! Data quality scoring for property records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REQUIRED_FIELD_COUNT: usize = 8;
pub const OPTIONAL_FIELD_COUNT: usize = 8;

/// Property fields relevant to quality scoring, extracted from a raw
/// provider payload by [`crate::extract::extract_property_fields`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyFields {
    // Required fields
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub lot_sqft: Option<f64>,
    pub property_type: Option<String>,

    // Optional fields
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub sqft: Option<f64>,
    pub year_built: Option<i64>,
    pub assessed_value: Option<f64>,
    pub estimated_value: Option<f64>,
    pub zoning: Option<String>,
    pub owner_name: Option<String>,
}

impl PropertyFields {
    fn required_present(&self) -> usize {
        [
            self.address.is_some(),
            self.city.is_some(),
            self.state.is_some(),
            self.zip_code.is_some(),
            self.latitude.is_some(),
            self.longitude.is_some(),
            self.lot_sqft.is_some(),
            self.property_type.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }

    fn optional_present(&self) -> usize {
        [
            self.bedrooms.is_some(),
            self.bathrooms.is_some(),
            self.sqft.is_some(),
            self.year_built.is_some(),
            self.assessed_value.is_some(),
            self.estimated_value.is_some(),
            self.zoning.is_some(),
            self.owner_name.is_some(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }
}

/// Confidence label derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityConfidence {
    Low,
    Medium,
    High,
}

/// Calculated data quality metrics for a property record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityScore {
    /// Overall 0-1
    pub score: f64,
    pub completeness: f64,
    pub accuracy: f64,
    pub consistency: f64,
    pub timeliness: f64,
    pub validity: f64,
    pub uniqueness: f64,
    pub freshness_hours: i64,
    pub confidence: QualityConfidence,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Calculate the composite data quality score for a property record.
///
/// Overall = 0.25 completeness + 0.25 accuracy + 0.20 consistency +
/// 0.15 timeliness + 0.10 validity + 0.05 uniqueness, each rounded to
/// three decimals.
pub fn calculate_quality_score(
    fields: &PropertyFields,
    source_timestamp: Option<DateTime<Utc>>,
    duplicate_check: bool,
) -> DataQualityScore {
    let completeness = score_completeness(fields);
    let accuracy = score_accuracy(fields);
    let consistency = score_consistency(fields);
    let (timeliness, freshness_hours) = score_timeliness(source_timestamp);
    let validity = score_validity();
    let uniqueness = if duplicate_check { 0.95 } else { 1.0 };

    let score = completeness * 0.25
        + accuracy * 0.25
        + consistency * 0.20
        + timeliness * 0.15
        + validity * 0.10
        + uniqueness * 0.05;

    let confidence = if score >= 0.85 {
        QualityConfidence::High
    } else if score >= 0.70 {
        QualityConfidence::Medium
    } else {
        QualityConfidence::Low
    };

    DataQualityScore {
        score: round3(score),
        completeness: round3(completeness),
        accuracy: round3(accuracy),
        consistency: round3(consistency),
        timeliness: round3(timeliness),
        validity: round3(validity),
        uniqueness: round3(uniqueness),
        freshness_hours,
        confidence,
    }
}

/// Presence of required and optional fields, weighted 0.7 / 0.3.
fn score_completeness(fields: &PropertyFields) -> f64 {
    (fields.required_present() as f64 / REQUIRED_FIELD_COUNT as f64) * 0.7
        + (fields.optional_present() as f64 / OPTIONAL_FIELD_COUNT as f64) * 0.3
}

/// Per-field format checks; defaults to 0.8 when none apply.
fn score_accuracy(fields: &PropertyFields) -> f64 {
    let mut checks: Vec<f64> = Vec::new();

    if let Some(zip) = &fields.zip_code {
        if !zip.is_empty() {
            let valid = zip.len() == 5 && zip.chars().all(|c| c.is_ascii_digit());
            checks.push(if valid { 1.0 } else { 0.5 });
        }
    }

    if let Some(state) = &fields.state {
        if !state.is_empty() {
            let valid = state.len() == 2 && state.chars().all(|c| c.is_ascii_alphabetic());
            checks.push(if valid { 1.0 } else { 0.5 });
        }
    }

    if let Some(year_built) = fields.year_built {
        checks.push(if (1800..=2030).contains(&year_built) {
            1.0
        } else {
            0.5
        });
    }

    if let (Some(lat), Some(lng)) = (fields.latitude, fields.longitude) {
        let valid = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng);
        checks.push(if valid { 1.0 } else { 0.0 });
    }

    if checks.is_empty() {
        0.8
    } else {
        checks.iter().sum::<f64>() / checks.len() as f64
    }
}

/// Cross-field plausibility checks; defaults to 0.85 when none apply.
fn score_consistency(fields: &PropertyFields) -> f64 {
    let mut checks: Vec<f64> = Vec::new();

    // Lot should be >= building sqft
    if let (Some(lot_sqft), Some(building_sqft)) = (fields.lot_sqft, fields.sqft) {
        if lot_sqft > 0.0 && building_sqft > 0.0 {
            checks.push(if lot_sqft >= building_sqft { 1.0 } else { 0.5 });
        }
    }

    // Price per sqft should be reasonable
    if let (Some(assessed), Some(building_sqft)) = (fields.assessed_value, fields.sqft) {
        if assessed > 0.0 && building_sqft > 0.0 {
            let ppsf = assessed / building_sqft;
            checks.push(if (50.0..=2000.0).contains(&ppsf) { 1.0 } else { 0.7 });
        }
    }

    if checks.is_empty() {
        0.85
    } else {
        checks.iter().sum::<f64>() / checks.len() as f64
    }
}

/// Freshness tiers by hours since extraction.
fn score_timeliness(source_timestamp: Option<DateTime<Utc>>) -> (f64, i64) {
    let Some(timestamp) = source_timestamp else {
        return (0.7, 0);
    };

    let age = Utc::now() - timestamp;
    let freshness_hours = age.num_hours();

    let score = if freshness_hours < 24 {
        1.0
    } else if freshness_hours < 168 {
        // 1 week
        0.9
    } else if freshness_hours < 720 {
        // 30 days
        0.8
    } else if freshness_hours < 2160 {
        // 90 days
        0.7
    } else {
        0.5
    };

    (score, freshness_hours)
}

/// Schema compliance proxy. The record parsed if it got this far.
fn score_validity() -> f64 {
    0.95
}
