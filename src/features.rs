use anyhow::bail;
use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::types::{FeatureRecord, RawInput};

/// Ordinal ranks for flat type, exactly as the regression model was
/// trained. Adding or removing a flat type is a one-place change here.
pub const FLAT_TYPE_RANKS: [(&str, u8); 7] = [
    ("1 Room", 1),
    ("2 Room", 2),
    ("3 Room", 3),
    ("4 Room", 4),
    ("5 Room", 5),
    ("Executive", 6),
    ("Multi-Generation", 7),
];

/// Storey range labels as shown to the user, paired with the dummified
/// tokens the training pipeline used. The open-ended top bucket keeps
/// the literal ">50" token.
pub const STOREY_BUCKETS: [(&str, &str); 11] = [
    ("1-5", "1_to_5"),
    ("6-10", "6_to_10"),
    ("11-15", "11_to_15"),
    ("16-20", "16_to_20"),
    ("21-25", "21_to_25"),
    ("26-30", "26_to_30"),
    ("31-35", "31_to_35"),
    ("36-40", "36_to_40"),
    ("41-45", "41_to_45"),
    ("46-50", "46_to_50"),
    (">50", ">50"),
];

// region and flat_model pass through to the model verbatim; these lists
// exist only so the schema endpoint can populate form widgets.
pub const REGIONS: [&str; 5] = ["Central", "North", "South", "East", "West"];

pub const FLAT_MODELS: [&str; 8] = [
    "Standard",
    "Improved",
    "New Generation",
    "Model A",
    "Premium Apartment",
    "Terrace",
    "Type S1",
    "Type S2",
];

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("unrecognized {field} label {label:?}")]
    UnmappedCategory { field: &'static str, label: String },

    #[error("{field} must be non-negative, got {value}")]
    Range { field: &'static str, value: f64 },
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, FeatureError> {
    if value < 0.0 {
        Err(FeatureError::Range { field, value })
    } else {
        Ok(value)
    }
}

/// Build the model-ready feature row from raw form input.
///
/// Pure: no clock access, no I/O. The transaction date is injected so
/// identical inputs always produce the identical record.
///
/// # Arguments
/// * `raw` - fully-populated user input
/// * `today` - the caller's local date, stamped into the record as "YYYYMM"
///
/// # Errors
/// `UnmappedCategory` when a flat type or storey label is not in its
/// lookup table; `Range` when a numeric input is negative. Unknown
/// labels are never silently defaulted.
pub fn build_feature_record(
    raw: &RawInput,
    today: NaiveDate,
) -> Result<FeatureRecord, FeatureError> {
    let floor_area_sqft = non_negative("floor_area_sqft", raw.floor_area_sqft)?;
    let hdb_age = non_negative("hdb_age", raw.hdb_age)?;
    let total_dwelling_units = non_negative("total_dwelling_units", raw.total_dwelling_units)?;
    let remaining_lease = non_negative("remaining_lease", raw.remaining_lease)?;
    let distance_km = non_negative("primary_school_distance_km", raw.primary_school_distance_km)?;
    if raw.primary_school_vacancy < 0 {
        return Err(FeatureError::Range {
            field: "primary_school_vacancy",
            value: raw.primary_school_vacancy as f64,
        });
    }

    let flat_type = FLAT_TYPE_RANKS
        .iter()
        .find(|(label, _)| *label == raw.flat_type_label)
        .map(|(_, rank)| *rank)
        .ok_or_else(|| FeatureError::UnmappedCategory {
            field: "flat_type",
            label: raw.flat_type_label.clone(),
        })?;

    let storey_category = STOREY_BUCKETS
        .iter()
        .find(|(label, _)| *label == raw.storey_category_label)
        .map(|(_, token)| (*token).to_string())
        .ok_or_else(|| FeatureError::UnmappedCategory {
            field: "storey_category",
            label: raw.storey_category_label.clone(),
        })?;

    let amenities_within_1km = [
        raw.mall_nearby,
        raw.hawker_nearby,
        raw.mrt_nearby,
        raw.bus_stop_nearby,
    ]
    .iter()
    .filter(|flag| **flag)
    .count() as u8;

    Ok(FeatureRecord {
        flat_type,
        transaction_year_month: format!("{:04}{:02}", today.year(), today.month()),
        floor_area_sqft,
        hdb_age,
        total_dwelling_units,
        remaining_lease,
        amenities_within_1km,
        region: raw.region.clone(),
        flat_model: raw.flat_model.clone(),
        storey_category,
        primary_school_distance_vacancy_interaction: distance_km
            * raw.primary_school_vacancy as f64,
    })
}

/// Sanity-check the category tables at startup: exact sizes, unique
/// keys, contiguous ranks, the ">50" sentinel in place. A failure here
/// means the constants above were edited inconsistently.
pub fn validate_tables() -> anyhow::Result<()> {
    for (i, (label, rank)) in FLAT_TYPE_RANKS.iter().enumerate() {
        if *rank as usize != i + 1 {
            bail!("flat type {:?} has rank {}, expected {}", label, rank, i + 1);
        }
        if FLAT_TYPE_RANKS.iter().filter(|(l, _)| l == label).count() != 1 {
            bail!("duplicate flat type label {:?}", label);
        }
    }

    for (label, token) in STOREY_BUCKETS.iter() {
        if token.is_empty() {
            bail!("empty storey token for label {:?}", label);
        }
        if STOREY_BUCKETS.iter().filter(|(l, _)| l == label).count() != 1 {
            bail!("duplicate storey label {:?}", label);
        }
    }
    let (top_label, top_token) = STOREY_BUCKETS[STOREY_BUCKETS.len() - 1];
    if top_label != ">50" || top_token != ">50" {
        bail!("open-ended storey bucket must map \">50\" to \">50\"");
    }

    Ok(())
}
