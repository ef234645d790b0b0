//! Cross-source property deduplication.
//!
//! Pure functions over pre-fetched candidates: the persistence layer finds
//! candidates (spatial or string-index pre-filtering) and supplies them; the
//! resolver only scores and classifies.

use serde::{Deserialize, Serialize};

use crate::address::normalize;
use crate::domain::CandidateRecord;

/// Confidence thresholds for match classification
pub const CONFIDENCE_AUTO_MERGE: f64 = 0.90;
pub const CONFIDENCE_REVIEW: f64 = 0.70;
/// Candidates scoring at or below this floor are discarded before
/// classification.
pub const CANDIDATE_CONFIDENCE_FLOOR: f64 = 0.30;

/// Address similarity must exceed this to count as a signal.
const ADDRESS_SIMILARITY_GATE: f64 = 0.85;

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// How a candidate was found by the lookup layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Fuzzy,
    Geocode,
}

impl Default for MatchType {
    fn default() -> Self {
        MatchType::Fuzzy
    }
}

/// Resolution action determined by the best candidate's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    AutoMerge,
    Review,
    KeepSeparate,
}

/// A potential duplicate match with confidence score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub property_id: String,
    pub confidence: f64,
    pub match_type: MatchType,
    pub matched_fields: Vec<String>,
}

/// Result of entity resolution for a property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityResolutionResult {
    /// Present only when the action is auto-merge
    pub canonical_id: Option<String>,
    pub confidence: f64,
    /// Top candidates, sorted descending by confidence, at most 5
    pub matches: Vec<MatchCandidate>,
    pub action: ResolutionAction,
}

/// The input side of a match comparison, as known to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct ResolutionInput {
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub parcel_id: Option<String>,
}

/// Great-circle distance between two points in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Jaro-Winkler similarity on normalized, lowercased formatted addresses.
pub fn score_address_similarity(addr1: &str, addr2: &str) -> f64 {
    let norm1 = normalize(addr1);
    let norm2 = normalize(addr2);

    match (norm1.formatted_address, norm2.formatted_address) {
        (Some(a), Some(b)) => strsim::jaro_winkler(&a.to_lowercase(), &b.to_lowercase()),
        _ => 0.0,
    }
}

/// Score similarity between input data and a single candidate.
///
/// Combines up to three independent signals: parcel-id exact match (1.0),
/// gated address similarity, and geographic proximity. The overall
/// confidence is the unweighted mean of whichever signals fired; a single
/// strong signal is therefore diluted by weaker co-occurring ones, kept
/// as-is for compatibility with the upstream scoring.
pub fn score_match(input: &ResolutionInput, candidate: &CandidateRecord) -> MatchCandidate {
    let mut matched_fields: Vec<String> = Vec::new();
    let mut scores: Vec<f64> = Vec::new();

    // Parcel ID match (highest weight); empty strings count as absent
    if let (Some(parcel_id), Some(apn)) = (&input.parcel_id, &candidate.apn) {
        if !parcel_id.is_empty() && parcel_id == apn {
            scores.push(1.0);
            matched_fields.push("parcel_id".to_string());
        }
    }

    // Address similarity
    if let (Some(input_address), Some(candidate_address)) = (&input.address, &candidate.address) {
        let sim = score_address_similarity(input_address, candidate_address);
        if sim > ADDRESS_SIMILARITY_GATE {
            scores.push(sim);
            matched_fields.push("address".to_string());
        }
    }

    // Location proximity
    if let (Some(lat), Some(lng), Some(cand_lat), Some(cand_lng)) = (
        input.latitude,
        input.longitude,
        candidate.latitude,
        candidate.longitude,
    ) {
        let distance = haversine_distance(lat, lng, cand_lat, cand_lng);
        if distance < 10.0 {
            scores.push(0.95);
            matched_fields.push("location".to_string());
        } else if distance < 50.0 {
            scores.push(0.80);
            matched_fields.push("location".to_string());
        }
    }

    let confidence = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };

    MatchCandidate {
        property_id: candidate.id.clone(),
        confidence,
        match_type: candidate.match_type,
        matched_fields,
    }
}

/// Classify scored candidates into a resolution action.
pub fn classify_matches(candidates: Vec<MatchCandidate>) -> EntityResolutionResult {
    if candidates.is_empty() {
        return EntityResolutionResult {
            canonical_id: None,
            confidence: 0.0,
            matches: Vec::new(),
            action: ResolutionAction::KeepSeparate,
        };
    }

    let mut sorted = candidates;
    sorted.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let best_confidence = sorted[0].confidence;
    let best_id = sorted[0].property_id.clone();

    let action = if best_confidence >= CONFIDENCE_AUTO_MERGE {
        ResolutionAction::AutoMerge
    } else if best_confidence >= CONFIDENCE_REVIEW {
        ResolutionAction::Review
    } else {
        ResolutionAction::KeepSeparate
    };

    sorted.truncate(5);

    EntityResolutionResult {
        canonical_id: (action == ResolutionAction::AutoMerge).then_some(best_id),
        confidence: best_confidence,
        matches: sorted,
        action,
    }
}

/// Resolve an input against pre-fetched candidates.
///
/// Scores every candidate, drops those at or below the confidence floor, and
/// classifies the rest.
pub fn resolve_from_candidates(
    input: &ResolutionInput,
    candidates: &[CandidateRecord],
) -> EntityResolutionResult {
    let scored: Vec<MatchCandidate> = candidates
        .iter()
        .map(|candidate| score_match(input, candidate))
        .filter(|m| m.confidence > CANDIDATE_CONFIDENCE_FLOOR)
        .collect();

    classify_matches(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> CandidateRecord {
        CandidateRecord {
            id: id.to_string(),
            address: None,
            latitude: None,
            longitude: None,
            apn: None,
            match_type: MatchType::Fuzzy,
        }
    }

    fn match_with_confidence(id: &str, confidence: f64) -> MatchCandidate {
        MatchCandidate {
            property_id: id.to_string(),
            confidence,
            match_type: MatchType::Fuzzy,
            matched_fields: Vec::new(),
        }
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        assert_eq!(haversine_distance(30.2672, -97.7431, 30.2672, -97.7431), 0.0);
    }

    #[test]
    fn haversine_austin_to_dallas() {
        // Austin to Dallas is roughly 290 km
        let d = haversine_distance(30.2672, -97.7431, 32.7767, -96.7970);
        assert!(d > 280_000.0 && d < 300_000.0, "got {}", d);
    }

    #[test]
    fn parcel_id_match_scores_one() {
        let input = ResolutionInput {
            parcel_id: Some("TX-001-ABC".to_string()),
            ..Default::default()
        };
        let mut cand = candidate("prop-1");
        cand.apn = Some("TX-001-ABC".to_string());

        let m = score_match(&input, &cand);
        assert_eq!(m.confidence, 1.0);
        assert_eq!(m.matched_fields, vec!["parcel_id"]);
    }

    #[test]
    fn empty_parcel_ids_do_not_match() {
        // Records that share only an empty-string parcel id are unrelated
        let input = ResolutionInput {
            parcel_id: Some(String::new()),
            ..Default::default()
        };
        let mut cand = candidate("prop-1");
        cand.apn = Some(String::new());

        let m = score_match(&input, &cand);
        assert_eq!(m.confidence, 0.0);
        assert!(m.matched_fields.is_empty());

        let result = resolve_from_candidates(&input, std::slice::from_ref(&cand));
        assert_ne!(result.action, ResolutionAction::AutoMerge);
        assert!(result.canonical_id.is_none());
    }

    #[test]
    fn no_signals_scores_zero() {
        let input = ResolutionInput::default();
        let m = score_match(&input, &candidate("prop-1"));
        assert_eq!(m.confidence, 0.0);
        assert!(m.matched_fields.is_empty());
    }

    #[test]
    fn close_proximity_scores_high() {
        let input = ResolutionInput {
            latitude: Some(30.2672),
            longitude: Some(-97.7431),
            ..Default::default()
        };
        let mut cand = candidate("prop-1");
        cand.latitude = Some(30.2672);
        cand.longitude = Some(-97.7431);

        let m = score_match(&input, &cand);
        assert_eq!(m.confidence, 0.95);
        assert_eq!(m.matched_fields, vec!["location"]);
    }

    #[test]
    fn moderate_proximity_scores_lower() {
        let input = ResolutionInput {
            latitude: Some(30.2672),
            longitude: Some(-97.7431),
            ..Default::default()
        };
        // ~30m north
        let mut cand = candidate("prop-1");
        cand.latitude = Some(30.26747);
        cand.longitude = Some(-97.7431);

        let m = score_match(&input, &cand);
        assert_eq!(m.confidence, 0.80);
    }

    #[test]
    fn similar_addresses_contribute_signal() {
        let input = ResolutionInput {
            address: Some("123 Main Street, Austin, TX 78701".to_string()),
            ..Default::default()
        };
        let mut cand = candidate("prop-1");
        cand.address = Some("123 Main St, Austin, TX 78701".to_string());

        let m = score_match(&input, &cand);
        assert!(m.confidence > 0.85);
        assert_eq!(m.matched_fields, vec!["address"]);
    }

    #[test]
    fn dissimilar_addresses_do_not_fire() {
        let input = ResolutionInput {
            address: Some("123 Main St, Austin, TX 78701".to_string()),
            ..Default::default()
        };
        let mut cand = candidate("prop-1");
        cand.address = Some("900 Congress Ave, Houston, TX 77002".to_string());

        let m = score_match(&input, &cand);
        assert!(m.matched_fields.is_empty());
    }

    #[test]
    fn classify_empty_keeps_separate() {
        let result = classify_matches(Vec::new());
        assert_eq!(result.action, ResolutionAction::KeepSeparate);
        assert_eq!(result.confidence, 0.0);
        assert!(result.canonical_id.is_none());
    }

    #[test]
    fn classify_threshold_boundaries() {
        let result = classify_matches(vec![match_with_confidence("a", 0.90)]);
        assert_eq!(result.action, ResolutionAction::AutoMerge);
        assert_eq!(result.canonical_id.as_deref(), Some("a"));

        let result = classify_matches(vec![match_with_confidence("a", 0.8999)]);
        assert_eq!(result.action, ResolutionAction::Review);
        assert!(result.canonical_id.is_none());

        let result = classify_matches(vec![match_with_confidence("a", 0.70)]);
        assert_eq!(result.action, ResolutionAction::Review);

        let result = classify_matches(vec![match_with_confidence("a", 0.6999)]);
        assert_eq!(result.action, ResolutionAction::KeepSeparate);
        assert!(result.canonical_id.is_none());
    }

    #[test]
    fn classify_sorts_and_truncates_to_five() {
        let matches = (0..8)
            .map(|i| match_with_confidence(&format!("p{}", i), 0.4 + 0.05 * i as f64))
            .collect();
        let result = classify_matches(matches);
        assert_eq!(result.matches.len(), 5);
        assert_eq!(result.matches[0].property_id, "p7");
        assert!(result.matches.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn resolve_discards_low_confidence_candidates() {
        let input = ResolutionInput {
            latitude: Some(30.2672),
            longitude: Some(-97.7431),
            ..Default::default()
        };
        // One exact-location candidate and one far away
        let mut near = candidate("near");
        near.latitude = Some(30.2672);
        near.longitude = Some(-97.7431);
        let mut far = candidate("far");
        far.latitude = Some(47.6062);
        far.longitude = Some(-122.3321);

        let result = resolve_from_candidates(&input, &[near, far]);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].property_id, "near");
        assert_eq!(result.action, ResolutionAction::AutoMerge);
        assert_eq!(result.canonical_id.as_deref(), Some("near"));
    }

    #[test]
    fn confidence_always_within_bounds() {
        let input = ResolutionInput {
            address: Some("123 Main St, Austin, TX 78701".to_string()),
            latitude: Some(30.2672),
            longitude: Some(-97.7431),
            parcel_id: Some("ABC".to_string()),
        };
        let mut cand = candidate("prop-1");
        cand.address = Some("123 Main St, Austin, TX 78701".to_string());
        cand.latitude = Some(30.2672);
        cand.longitude = Some(-97.7431);
        cand.apn = Some("ABC".to_string());

        let m = score_match(&input, &cand);
        assert!(m.confidence > 0.0 && m.confidence <= 1.0);
    }
}
