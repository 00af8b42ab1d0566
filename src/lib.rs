pub mod features;
pub mod model;
pub mod types;

pub use features::{build_feature_record, FeatureError};
pub use types::{FeatureRecord, RawInput};
