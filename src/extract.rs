//! Extraction of quality-scoring fields from raw provider payloads.
//!
//! Providers disagree on field names (`zip` vs `zip_code`, `lat` vs
//! `latitude`). The alias tables below are the single place that mapping
//! lives; extraction itself is just a lookup over them.

use serde_json::Value;
use std::collections::HashMap;

use crate::quality::PropertyFields;

const ADDRESS_KEYS: &[&str] = &["address", "street_address", "site_address"];
const CITY_KEYS: &[&str] = &["city"];
const STATE_KEYS: &[&str] = &["state", "state_code"];
const ZIP_KEYS: &[&str] = &["zip", "zip_code", "postal_code"];
const LATITUDE_KEYS: &[&str] = &["lat", "latitude"];
const LONGITUDE_KEYS: &[&str] = &["lng", "lon", "longitude"];
const LOT_SQFT_KEYS: &[&str] = &["lot_sqft", "lot_size_sqft"];
const PROPERTY_TYPE_KEYS: &[&str] = &["property_type", "use_code"];
const BEDROOMS_KEYS: &[&str] = &["bedrooms", "beds"];
const BATHROOMS_KEYS: &[&str] = &["bathrooms", "baths"];
const SQFT_KEYS: &[&str] = &["sqft", "building_sqft"];
const YEAR_BUILT_KEYS: &[&str] = &["year_built"];
const ASSESSED_VALUE_KEYS: &[&str] = &["assessed_value"];
const ESTIMATED_VALUE_KEYS: &[&str] = &["estimated_value"];
const ZONING_KEYS: &[&str] = &["zoning", "zoning_code"];
const OWNER_NAME_KEYS: &[&str] = &["owner_name", "owner"];

fn lookup<'a>(data: &'a HashMap<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|key| data.get(*key))
        .filter(|v| !v.is_null())
}

fn string_field(data: &HashMap<String, Value>, aliases: &[&str]) -> Option<String> {
    lookup(data, aliases)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn number_field(data: &HashMap<String, Value>, aliases: &[&str]) -> Option<f64> {
    lookup(data, aliases).and_then(Value::as_f64)
}

fn integer_field(data: &HashMap<String, Value>, aliases: &[&str]) -> Option<i64> {
    lookup(data, aliases).and_then(Value::as_i64)
}

/// Map known provider field names into the quality-scoring field set.
pub fn extract_property_fields(raw_data: &HashMap<String, Value>) -> PropertyFields {
    PropertyFields {
        address: string_field(raw_data, ADDRESS_KEYS),
        city: string_field(raw_data, CITY_KEYS),
        state: string_field(raw_data, STATE_KEYS),
        zip_code: string_field(raw_data, ZIP_KEYS),
        latitude: number_field(raw_data, LATITUDE_KEYS),
        longitude: number_field(raw_data, LONGITUDE_KEYS),
        lot_sqft: number_field(raw_data, LOT_SQFT_KEYS),
        property_type: string_field(raw_data, PROPERTY_TYPE_KEYS),
        bedrooms: number_field(raw_data, BEDROOMS_KEYS),
        bathrooms: number_field(raw_data, BATHROOMS_KEYS),
        sqft: number_field(raw_data, SQFT_KEYS),
        year_built: integer_field(raw_data, YEAR_BUILT_KEYS),
        assessed_value: number_field(raw_data, ASSESSED_VALUE_KEYS),
        estimated_value: number_field(raw_data, ESTIMATED_VALUE_KEYS),
        zoning: string_field(raw_data, ZONING_KEYS),
        owner_name: string_field(raw_data, OWNER_NAME_KEYS),
    }
}
