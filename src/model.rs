use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};
use tch::{kind::Kind, CModule, Device, Tensor};

use crate::types::FeatureRecord;

#[derive(Deserialize)]
struct MetaJson {
    feat_list: Vec<String>,
    in_dim: Option<usize>,
}

pub struct Model {
    model: CModule,
    device: Device,
}

impl Model {
    pub fn load(model_path: &str, meta_path: &str) -> Result<(Self, usize, Vec<String>)> {
        let device = Device::Cpu;

        // Load meta.json to get feature ordering and input dim
        let meta_txt = fs::read_to_string(Path::new(meta_path))
            .with_context(|| format!("failed to read meta at {}", meta_path))?;
        let meta: MetaJson =
            serde_json::from_str(&meta_txt).with_context(|| "failed to parse meta.json")?;

        let feat_list = meta.feat_list;
        let in_dim = meta.in_dim.unwrap_or(feat_list.len());

        // Load TorchScript regression model
        let model = CModule::load_on_device(model_path, device)
            .with_context(|| format!("failed to load TorchScript {}", model_path))?;

        // Probe output shape with a dummy forward; a price regressor
        // must produce a single scalar per row
        let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
        let t = model.forward_ts(&[dummy])?;
        let sz = t.size();
        if sz != [1] && sz != [1, 1] {
            bail!("unexpected model output size: {:?}", sz);
        }

        Ok((Self { model, device }, in_dim, feat_list))
    }

    /// Returns the predicted resale price in dollars.
    pub fn predict_price(&self, x: &[f32], in_dim_expected: usize) -> Result<f64> {
        if x.len() != in_dim_expected {
            bail!(
                "feature length mismatch: got {}, expected {}",
                x.len(),
                in_dim_expected
            );
        }

        let input = Tensor::from_slice(x)
            .reshape([1, in_dim_expected as i64])
            .to_device(self.device);

        let t = self.model.forward_ts(&[input])?;
        let price = t.flatten(0, -1).double_value(&[0]);

        Ok(price)
    }
}

/// Model-side encoding. The regression pipeline was trained on a
/// dummified frame, so the three categorical fields expand to indicator
/// columns here ("region_Central", "flat_model_Standard",
/// "storey_category_6_to_10", ...); numeric fields pass through under
/// their canonical names.
pub fn flatten_record(record: &FeatureRecord) -> HashMap<String, f32> {
    let mut map = HashMap::new();
    map.insert("flat_type".to_string(), record.flat_type as f32);
    map.insert(
        "transaction_year_month".to_string(),
        record.transaction_year_month.parse().unwrap_or(0.0),
    );
    map.insert("floor_area_sqft".to_string(), record.floor_area_sqft as f32);
    map.insert("hdb_age".to_string(), record.hdb_age as f32);
    map.insert(
        "total_dwelling_units".to_string(),
        record.total_dwelling_units as f32,
    );
    map.insert("remaining_lease".to_string(), record.remaining_lease as f32);
    map.insert(
        "amenities_within_1km".to_string(),
        record.amenities_within_1km as f32,
    );
    map.insert(
        "primary_school_distance_vacancy_interaction".to_string(),
        record.primary_school_distance_vacancy_interaction as f32,
    );
    map.insert(format!("region_{}", record.region), 1.0);
    map.insert(format!("flat_model_{}", record.flat_model), 1.0);
    map.insert(format!("storey_category_{}", record.storey_category), 1.0);
    map
}

/// Order the flat map by the authoritative feat_list from meta.json.
/// Indicator columns the record did not set default to 0.0.
pub fn order_features(map: &HashMap<String, f32>, feat_list: &[String]) -> Vec<f32> {
    let mut v = Vec::with_capacity(feat_list.len());
    for k in feat_list {
        v.push(*map.get(k).unwrap_or(&0.0));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> FeatureRecord {
        FeatureRecord {
            flat_type: 4,
            transaction_year_month: "202406".to_string(),
            floor_area_sqft: 1000.0,
            hdb_age: 20.0,
            total_dwelling_units: 150.0,
            remaining_lease: 60.0,
            amenities_within_1km: 2,
            region: "Central".to_string(),
            flat_model: "Standard".to_string(),
            storey_category: "6_to_10".to_string(),
            primary_school_distance_vacancy_interaction: 50.0,
        }
    }

    #[test]
    fn categoricals_become_indicator_columns() {
        let map = flatten_record(&record());
        assert_eq!(map.get("region_Central"), Some(&1.0));
        assert_eq!(map.get("flat_model_Standard"), Some(&1.0));
        assert_eq!(map.get("storey_category_6_to_10"), Some(&1.0));
        assert_eq!(map.get("region_North"), None);
    }

    #[test]
    fn year_month_is_numeric_in_the_vector() {
        let map = flatten_record(&record());
        assert_eq!(map.get("transaction_year_month"), Some(&202406.0));
    }

    #[test]
    fn ordering_follows_feat_list_with_zero_defaults() {
        let map = flatten_record(&record());
        let feat_list: Vec<String> = [
            "flat_type",
            "region_Central",
            "region_North",
            "amenities_within_1km",
            "storey_category_6_to_10",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let v = order_features(&map, &feat_list);
        assert_eq!(v, vec![4.0, 1.0, 0.0, 2.0, 1.0]);
    }
}
