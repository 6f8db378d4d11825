//! Tree Configuration
//!
//! Parameters that control how sorted indexes are stored and how trees grow,
//! with JSON persistence shared by configurations and exported models.
use crate::constants::{MAX_DENSE_ENTRIES, NONZERO_RATIO_THRESHOLD};
use crate::dataset::DataManagement;
use crate::errors::SortForestError;
use crate::grower::GrowPolicy;
use crate::utils::{validate_float_parameter, validate_positive_float_parameter};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_retain_internal_weight() -> bool {
    false
}
fn default_memory_tight() -> bool {
    false
}
fn default_data_management() -> DataManagement {
    DataManagement::Auto
}
fn default_nonzero_ratio_threshold() -> f64 {
    NONZERO_RATIO_THRESHOLD
}
fn default_max_dense_entries() -> usize {
    MAX_DENSE_ENTRIES
}
fn default_grow_policy() -> GrowPolicy {
    GrowPolicy::LossGuide
}
fn default_max_leaves() -> Option<usize> {
    None
}
fn default_max_depth() -> Option<usize> {
    None
}
fn default_min_leaf_size() -> usize {
    1
}
fn default_lambda() -> f64 {
    0.0
}

/// Configuration for building and growing a [`crate::Tree`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Keep the weight of split nodes; predictions then sum weights along the path.
    #[serde(default = "default_retain_internal_weight")]
    pub retain_internal_weight: bool,
    /// Do not cache per-node sorted indexes, filter them from the data-level table when needed.
    #[serde(default = "default_memory_tight")]
    pub memory_tight: bool,
    #[serde(default = "default_data_management")]
    pub data_management: DataManagement,
    /// Below this non-zero ratio, `Auto` picks sparse indexes.
    #[serde(default = "default_nonzero_ratio_threshold")]
    pub nonzero_ratio_threshold: f64,
    /// Above this many matrix entries, `Auto` picks sparse indexes.
    #[serde(default = "default_max_dense_entries")]
    pub max_dense_entries: usize,
    #[serde(default = "default_grow_policy")]
    pub grow_policy: GrowPolicy,
    #[serde(default = "default_max_leaves")]
    pub max_leaves: Option<usize>,
    #[serde(default = "default_max_depth")]
    pub max_depth: Option<usize>,
    /// Smallest number of data points either side of a split may hold.
    #[serde(default = "default_min_leaf_size")]
    pub min_leaf_size: usize,
    /// L2 regularization on leaf weights.
    #[serde(default = "default_lambda")]
    pub lambda: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            retain_internal_weight: default_retain_internal_weight(),
            memory_tight: default_memory_tight(),
            data_management: default_data_management(),
            nonzero_ratio_threshold: default_nonzero_ratio_threshold(),
            max_dense_entries: default_max_dense_entries(),
            grow_policy: default_grow_policy(),
            max_leaves: default_max_leaves(),
            max_depth: default_max_depth(),
            min_leaf_size: default_min_leaf_size(),
            lambda: default_lambda(),
        }
    }
}

impl TreeConfig {
    pub fn validate(&self) -> Result<(), SortForestError> {
        validate_float_parameter(self.nonzero_ratio_threshold, 0.0, 1.0, "nonzero_ratio_threshold")?;
        validate_positive_float_parameter(self.lambda, "lambda")?;
        if self.lambda.is_infinite() {
            return Err(SortForestError::InvalidParameter(
                "lambda".to_string(),
                "a finite value".to_string(),
                self.lambda.to_string(),
            ));
        }
        if self.max_dense_entries == 0 {
            return Err(SortForestError::InvalidParameter(
                "max_dense_entries".to_string(),
                "a positive count".to_string(),
                "0".to_string(),
            ));
        }
        if self.min_leaf_size == 0 {
            return Err(SortForestError::InvalidParameter(
                "min_leaf_size".to_string(),
                "at least 1".to_string(),
                "0".to_string(),
            ));
        }
        if self.max_leaves == Some(0) {
            return Err(SortForestError::InvalidParameter(
                "max_leaves".to_string(),
                "at least 1".to_string(),
                "0".to_string(),
            ));
        }
        Ok(())
    }
}

/// JSON persistence.
pub trait JsonIO: Serialize + DeserializeOwned + Sized {
    /// Save to a json file.
    /// * `path` - Path to save the file to.
    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), SortForestError> {
        fs::write(path, self.json_dump()?).map_err(|e| SortForestError::UnableToWrite(e.to_string()))
    }

    /// Dump as a string.
    fn json_dump(&self) -> Result<String, SortForestError> {
        serde_json::to_string(self).map_err(|e| SortForestError::UnableToWrite(e.to_string()))
    }

    /// Load from a string.
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, SortForestError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| SortForestError::UnableToRead(e.to_string()))
    }

    /// Load from a path on disk.
    /// * `path` - Path to load from.
    fn load_json<P: AsRef<Path>>(path: P) -> Result<Self, SortForestError> {
        let json_str = fs::read_to_string(path).map_err(|e| SortForestError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

impl JsonIO for TreeConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = TreeConfig::from_json("{}").unwrap();
        assert_eq!(config, TreeConfig::default());
        assert_eq!(config.nonzero_ratio_threshold, 0.4);
        assert_eq!(config.max_dense_entries, 16 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = TreeConfig::from_json(
            r#"{"retain_internal_weight": true, "data_management": "Sparse", "max_leaves": 8, "grow_policy": "DepthWise"}"#,
        )
        .unwrap();
        assert!(config.retain_internal_weight);
        assert_eq!(config.data_management, DataManagement::Sparse);
        assert_eq!(config.max_leaves, Some(8));
        assert_eq!(config.grow_policy, GrowPolicy::DepthWise);
        assert_eq!(config.min_leaf_size, 1);
    }

    #[test]
    fn test_validate() {
        let mut config = TreeConfig::default();
        config.nonzero_ratio_threshold = 1.5;
        assert!(config.validate().is_err());
        let mut config = TreeConfig::default();
        config.lambda = -1.0;
        assert!(config.validate().is_err());
        let mut config = TreeConfig::default();
        config.min_leaf_size = 0;
        assert!(config.validate().is_err());
        let mut config = TreeConfig::default();
        config.max_leaves = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = TreeConfig {
            memory_tight: true,
            lambda: 0.5,
            max_depth: Some(4),
            ..TreeConfig::default()
        };
        config.save_json(&path).unwrap();
        let loaded = TreeConfig::load_json(&path).unwrap();
        assert_eq!(config, loaded);
        assert!(TreeConfig::load_json(dir.path().join("missing.json")).is_err());
    }
}
