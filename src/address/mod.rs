//! Address normalization to USPS standard format.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A parsed and USPS-standardized address.
///
/// Derived deterministically from a raw address string and never mutated
/// after creation. `confidence` reflects how many structural components were
/// extracted; it is informational only and never blocks downstream stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAddress {
    pub street_number: Option<String>,
    pub street_name: Option<String>,
    pub street_suffix: Option<String>,
    pub street_direction: Option<String>,
    pub unit_type: Option<String>,
    pub unit_number: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub zip4: Option<String>,
    pub street_address: Option<String>,
    pub formatted_address: Option<String>,
    pub confidence: f64,
}

/// USPS street suffix abbreviations.
fn suffix_abbreviation(token: &str) -> Option<&'static str> {
    match token {
        "avenue" | "ave" => Some("Ave"),
        "boulevard" | "blvd" => Some("Blvd"),
        "circle" | "cir" => Some("Cir"),
        "court" | "ct" => Some("Ct"),
        "drive" | "dr" => Some("Dr"),
        "highway" | "hwy" => Some("Hwy"),
        "lane" | "ln" => Some("Ln"),
        "parkway" | "pkwy" => Some("Pkwy"),
        "place" | "pl" => Some("Pl"),
        "road" | "rd" => Some("Rd"),
        "street" | "st" => Some("St"),
        "terrace" | "ter" => Some("Ter"),
        "trail" | "trl" => Some("Trl"),
        "way" => Some("Way"),
        _ => None,
    }
}

fn directional_abbreviation(token: &str) -> Option<&'static str> {
    match token {
        "north" | "n" => Some("N"),
        "south" | "s" => Some("S"),
        "east" | "e" => Some("E"),
        "west" | "w" => Some("W"),
        "northeast" | "ne" => Some("NE"),
        "northwest" | "nw" => Some("NW"),
        "southeast" | "se" => Some("SE"),
        "southwest" | "sw" => Some("SW"),
        _ => None,
    }
}

fn unit_type_abbreviation(token: &str) -> Option<&'static str> {
    match token {
        "apartment" | "apt" | "#" => Some("Apt"),
        "suite" | "ste" => Some("Ste"),
        "unit" => Some("Unit"),
        "floor" | "fl" => Some("Fl"),
        _ => None,
    }
}

/// Two-letter USPS state and territory codes.
const STATE_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "PR", "VI", "GU",
];

// A ZIP token needs a 5-digit prefix; a trailing 4-digit group (dashed or
// not) becomes ZIP+4, anything else past the prefix is ignored.
static ZIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{5})(?:-?(\d{4}))?").expect("valid zip regex"));

/// Map a raw suffix token to its USPS abbreviation, title-casing
/// unrecognized tokens.
pub fn normalize_suffix(token: &str) -> String {
    let lower = token.to_lowercase();
    suffix_abbreviation(&lower)
        .map(str::to_string)
        .unwrap_or_else(|| title_case(token))
}

/// Map a raw directional token, uppercasing unrecognized tokens.
pub fn normalize_directional(token: &str) -> String {
    let lower = token.to_lowercase();
    directional_abbreviation(&lower)
        .map(str::to_string)
        .unwrap_or_else(|| token.to_uppercase())
}

/// Map a raw unit-type token, title-casing unrecognized tokens.
pub fn normalize_unit_type(token: &str) -> String {
    let lower = token.to_lowercase();
    unit_type_abbreviation(&lower)
        .map(str::to_string)
        .unwrap_or_else(|| title_case(token))
}

fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn empty_address() -> NormalizedAddress {
    NormalizedAddress {
        street_number: None,
        street_name: None,
        street_suffix: None,
        street_direction: None,
        unit_type: None,
        unit_number: None,
        city: None,
        state: None,
        zip_code: None,
        zip4: None,
        street_address: None,
        formatted_address: None,
        confidence: 0.0,
    }
}

/// Normalize a raw address string to USPS standard format.
///
/// Tokenizes comma-separated segments, peels ZIP/state/city off the tail,
/// then parses number, unit, post-directional, and suffix out of the street
/// segment. Unparseable input degrades to an all-`None` result with zero
/// confidence; this function never fails.
pub fn normalize(raw_address: &str) -> NormalizedAddress {
    let trimmed = raw_address.trim();
    if trimmed.is_empty() {
        return empty_address();
    }

    let segments: Vec<&str> = trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() {
        return empty_address();
    }

    let mut street_tokens: Vec<String> =
        segments[0].split_whitespace().map(str::to_string).collect();

    let mut city = None;
    let mut state = None;
    let mut zip_code = None;
    let mut zip4 = None;

    if segments.len() > 1 {
        // Tail segments hold city / state / ZIP; consume from the end.
        let mut tail: Vec<String> = segments[1..]
            .iter()
            .flat_map(|s| s.split_whitespace())
            .map(str::to_string)
            .collect();

        if let Some(last) = tail.last() {
            if let Some(caps) = ZIP_RE.captures(last) {
                zip_code = caps.get(1).map(|m| m.as_str().to_string());
                zip4 = caps.get(2).map(|m| m.as_str().to_string());
                tail.pop();
            }
        }
        if let Some(last) = tail.last() {
            if last.len() == 2 && last.chars().all(|c| c.is_ascii_alphabetic()) {
                state = Some(last.to_uppercase());
                tail.pop();
            }
        }
        if !tail.is_empty() {
            city = Some(title_case(&tail.join(" ")));
        }
    } else {
        // Single-segment input: peel ZIP and a known state code off the
        // street tokens, then anything past the suffix token is the city.
        if let Some(last) = street_tokens.last() {
            if let Some(caps) = ZIP_RE.captures(last) {
                zip_code = caps.get(1).map(|m| m.as_str().to_string());
                zip4 = caps.get(2).map(|m| m.as_str().to_string());
                street_tokens.pop();
            }
        }
        if let Some(last) = street_tokens.last() {
            let upper = last.to_uppercase();
            if STATE_CODES.contains(&upper.as_str()) {
                state = Some(upper);
                street_tokens.pop();
            }
        }
        if let Some(suffix_idx) = street_tokens
            .iter()
            .rposition(|t| suffix_abbreviation(&t.to_lowercase()).is_some())
        {
            let mut split_at = suffix_idx + 1;
            if street_tokens
                .get(split_at)
                .map(|t| directional_abbreviation(&t.to_lowercase()).is_some())
                .unwrap_or(false)
            {
                split_at += 1;
            }
            // A unit designator trailing the suffix belongs to the street,
            // not the city.
            if let Some(tok) = street_tokens.get(split_at) {
                if tok.starts_with('#') {
                    split_at += 1;
                } else if unit_type_abbreviation(&tok.to_lowercase()).is_some() {
                    split_at = (split_at + 2).min(street_tokens.len());
                }
            }
            if split_at < street_tokens.len() {
                let city_tokens = street_tokens.split_off(split_at);
                city = Some(title_case(&city_tokens.join(" ")));
            }
        }
    }

    // Street number leads the street segment when it starts with a digit.
    let street_number = match street_tokens.first() {
        Some(first) if first.starts_with(|c: char| c.is_ascii_digit()) => {
            Some(street_tokens.remove(0))
        }
        _ => None,
    };

    // Unit designator: either a "#4" token or a unit-type word followed by
    // the unit identifier.
    let mut unit_type = None;
    let mut unit_number = None;
    if let Some(idx) = street_tokens.iter().position(|t| {
        t.starts_with('#') || unit_type_abbreviation(&t.to_lowercase()).is_some()
    }) {
        let rest = street_tokens.split_off(idx);
        let marker = &rest[0];
        if let Some(number) = marker.strip_prefix('#').filter(|n| !n.is_empty()) {
            unit_type = Some("Apt".to_string());
            unit_number = Some(number.to_string());
        } else {
            unit_type = Some(normalize_unit_type(marker));
            let identifier = rest[1..].join(" ");
            if !identifier.is_empty() {
                unit_number = Some(identifier);
            }
        }
    }

    // Post-directional and suffix come off the end; a pre-directional stays
    // folded into the street name.
    let mut street_direction = None;
    if street_tokens.len() >= 2 {
        if let Some(last) = street_tokens.last() {
            if directional_abbreviation(&last.to_lowercase()).is_some() {
                street_direction = street_tokens.pop().map(|t| normalize_directional(&t));
            }
        }
    }
    let mut street_suffix = None;
    if street_tokens.len() >= 2 {
        if let Some(last) = street_tokens.last() {
            if suffix_abbreviation(&last.to_lowercase()).is_some() {
                street_suffix = street_tokens.pop().map(|t| normalize_suffix(&t));
            }
        }
    }

    let street_name = if street_tokens.is_empty() {
        None
    } else {
        Some(street_tokens.join(" "))
    };

    // Build combined street address
    let mut street_parts: Vec<&str> = Vec::new();
    for part in [&street_number, &street_name, &street_suffix] {
        if let Some(p) = part {
            street_parts.push(p.as_str());
        }
    }
    if let Some(dir) = &street_direction {
        street_parts.push(dir.as_str());
    }
    let mut street_address = if street_parts.is_empty() {
        None
    } else {
        Some(street_parts.join(" "))
    };
    if let (Some(ut), Some(un), Some(sa)) = (&unit_type, &unit_number, &street_address) {
        street_address = Some(format!("{} {} {}", sa, ut, un));
    }

    // Build fully formatted address, omitting missing components without
    // leaving stray separators.
    let mut formatted_parts: Vec<String> = Vec::new();
    if let Some(sa) = &street_address {
        formatted_parts.push(sa.clone());
    }
    if let Some(c) = &city {
        formatted_parts.push(c.clone());
    }
    if let Some(st) = &state {
        if let Some(last) = formatted_parts.last_mut() {
            last.push(',');
            formatted_parts.push(st.clone());
        }
    }
    if let Some(z) = &zip_code {
        formatted_parts.push(z.clone());
    }
    let formatted_address = if formatted_parts.is_empty() {
        None
    } else {
        Some(formatted_parts.join(" "))
    };

    // Weighted component confidence
    let mut confidence = 0.0;
    if street_number.is_some() {
        confidence += 0.2;
    }
    if street_name.is_some() {
        confidence += 0.3;
    }
    if city.is_some() {
        confidence += 0.2;
    }
    if state.is_some() {
        confidence += 0.2;
    }
    if zip_code.is_some() {
        confidence += 0.1;
    }

    NormalizedAddress {
        street_number,
        street_name,
        street_suffix,
        street_direction,
        unit_type,
        unit_number,
        city,
        state,
        zip_code,
        zip4,
        street_address,
        formatted_address,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_zero_confidence() {
        let result = normalize("");
        assert_eq!(result.confidence, 0.0);
        assert!(result.formatted_address.is_none());

        let result = normalize("   ");
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn parses_full_comma_separated_address() {
        let result = normalize("123 Main Street, Austin, TX 78701");
        assert_eq!(result.street_number.as_deref(), Some("123"));
        assert_eq!(result.street_name.as_deref(), Some("Main"));
        assert_eq!(result.street_suffix.as_deref(), Some("St"));
        assert_eq!(result.city.as_deref(), Some("Austin"));
        assert_eq!(result.state.as_deref(), Some("TX"));
        assert_eq!(result.zip_code.as_deref(), Some("78701"));
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(
            result.formatted_address.as_deref(),
            Some("123 Main St Austin, TX 78701")
        );
    }

    #[test]
    fn parses_single_segment_address() {
        let result = normalize("123 Main St Austin TX 78701");
        assert_eq!(result.street_suffix.as_deref(), Some("St"));
        assert_eq!(result.city.as_deref(), Some("Austin"));
        assert_eq!(result.state.as_deref(), Some("TX"));
        assert_eq!(result.zip_code.as_deref(), Some("78701"));
    }

    #[test]
    fn captures_zip_plus_four() {
        let result = normalize("500 Oak Ave, Dallas, TX 75201-1234");
        assert_eq!(result.zip_code.as_deref(), Some("75201"));
        assert_eq!(result.zip4.as_deref(), Some("1234"));
    }

    #[test]
    fn accepts_dashless_zip_plus_four() {
        let result = normalize("123 Main St, Austin, TX 787011234");
        assert_eq!(result.zip_code.as_deref(), Some("78701"));
        assert_eq!(result.zip4.as_deref(), Some("1234"));

        // A stray tail after the 5-digit prefix keeps the ZIP itself
        let result = normalize("123 Main St, Austin, TX 78701-12");
        assert_eq!(result.zip_code.as_deref(), Some("78701"));
        assert!(result.zip4.is_none());
    }

    #[test]
    fn parses_unit_designators() {
        let result = normalize("123 Main St Apt 4B, Austin, TX 78701");
        assert_eq!(result.unit_type.as_deref(), Some("Apt"));
        assert_eq!(result.unit_number.as_deref(), Some("4B"));
        assert_eq!(
            result.street_address.as_deref(),
            Some("123 Main St Apt 4B")
        );

        let result = normalize("123 Main St #7, Austin, TX");
        assert_eq!(result.unit_type.as_deref(), Some("Apt"));
        assert_eq!(result.unit_number.as_deref(), Some("7"));
    }

    #[test]
    fn single_segment_unit_not_mistaken_for_city() {
        let result = normalize("123 Main St Apt 4B Austin TX 78701");
        assert_eq!(result.unit_type.as_deref(), Some("Apt"));
        assert_eq!(result.unit_number.as_deref(), Some("4B"));
        assert_eq!(result.city.as_deref(), Some("Austin"));
    }

    #[test]
    fn maps_post_directional() {
        let result = normalize("800 Pine Street North, Seattle, WA 98101");
        assert_eq!(result.street_suffix.as_deref(), Some("St"));
        assert_eq!(result.street_direction.as_deref(), Some("N"));
    }

    #[test]
    fn pre_directional_stays_in_street_name() {
        let result = normalize("123 N Main St, Austin, TX 78701");
        assert_eq!(result.street_name.as_deref(), Some("N Main"));
        assert_eq!(result.street_suffix.as_deref(), Some("St"));
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(normalize_suffix("plaza"), "Plaza");
        assert_eq!(normalize_directional("norte"), "NORTE");
        assert_eq!(normalize_unit_type("penthouse"), "Penthouse");
    }

    #[test]
    fn rejects_bad_state_and_zip() {
        let result = normalize("123 Main St, Austin, Texas 787");
        assert!(result.state.is_none());
        assert!(result.zip_code.is_none());
    }

    #[test]
    fn normalize_is_idempotent_on_same_input() {
        let a = normalize("456 Elm Drive, Portland, OR 97201");
        let b = normalize("456 Elm Drive, Portland, OR 97201");
        assert_eq!(a, b);
    }

    #[test]
    fn confidence_monotonic_with_more_components() {
        let partial = normalize("123 Main St");
        let full = normalize("123 Main St, Austin, TX 78701");
        assert!(partial.confidence < full.confidence);
    }

    #[test]
    fn confidence_within_bounds() {
        for input in [
            "",
            "???",
            "123",
            "123 Main St",
            "123 Main St, Austin, TX 78701",
        ] {
            let result = normalize(input);
            assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
        }
    }
}
