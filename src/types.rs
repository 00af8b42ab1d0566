use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RawInput {
    pub flat_type_label: String,         // e.g., "4 Room"
    pub floor_area_sqft: f64,
    pub hdb_age: f64,                    // in years
    pub total_dwelling_units: f64,
    pub remaining_lease: f64,            // in years
    // amenity flags, each true when the amenity sits within 1km:
    pub mall_nearby: bool,
    pub hawker_nearby: bool,
    pub mrt_nearby: bool,
    pub bus_stop_nearby: bool,
    pub region: String,                  // e.g., "Central"
    pub flat_model: String,              // e.g., "Premium Apartment"
    pub storey_category_label: String,   // range label, e.g., "6-10"
    pub primary_school_distance_km: f64, // to nearest primary school
    pub primary_school_vacancy: i64,     // in the nearest primary school
}

/// The single model-ready row, derived fresh for every prediction
/// request and discarded after use. Echoed back to the client so the
/// user can confirm what the model actually saw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub flat_type: u8, // ordinal rank 1..=7
    pub transaction_year_month: String, // "YYYYMM", captured at request time
    pub floor_area_sqft: f64,
    pub hdb_age: f64,
    pub total_dwelling_units: f64,
    pub remaining_lease: f64,
    pub amenities_within_1km: u8, // 0..=4
    pub region: String,
    pub flat_model: String,
    pub storey_category: String, // dummified token, e.g., "6_to_10"
    pub primary_school_distance_vacancy_interaction: f64,
}
