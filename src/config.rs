use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::weights::calibration::CalibrationTables;

/// Analysis constants that change between data-taking years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    pub year: u32,
    pub btag_working_point: f64, // DeepCSV medium
    pub min_jets: usize,
    pub dataset_suffix: String,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            year: 2016,
            btag_working_point: 0.6321,
            min_jets: 4,
            dataset_suffix: "_2016".to_string(),
        }
    }
}

impl ProcessorSettings {
    /// Dataset name used on histogram axes and for cross sections.
    pub fn short_dataset<'a>(&self, dataset: &'a str) -> std::borrow::Cow<'a, str> {
        if self.dataset_suffix.is_empty() {
            std::borrow::Cow::Borrowed(dataset)
        } else {
            std::borrow::Cow::Owned(dataset.replace(&self.dataset_suffix, ""))
        }
    }
}

/// One chunk of events: a parquet file holding one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub path: PathBuf,
    pub dataset: String,
    /// Defaults to whether the dataset name contains `Data`.
    #[serde(default)]
    pub is_data: Option<bool>,
}

impl ChunkSpec {
    pub fn is_data(&self) -> bool {
        self.is_data.unwrap_or_else(|| self.dataset.contains("Data"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub settings: ProcessorSettings,
    pub calibration: CalibrationTables,
    pub chunks: Vec<ChunkSpec>,
}

impl RunConfig {
    /// Load from `.json`, anything else is read as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: RunConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_reader(reader)?,
            _ => serde_yaml::from_reader(reader)?,
        };
        config.calibration.validate()?;
        log::info!(
            "Loaded {} chunk(s) from {}",
            config.chunks.len(),
            path.display()
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_2016() {
        let settings = ProcessorSettings::default();
        assert_eq!(settings.year, 2016);
        assert_eq!(settings.btag_working_point, 0.6321);
        assert_eq!(settings.min_jets, 4);
        assert_eq!(settings.short_dataset("TTGamma_SingleLept_2016"), "TTGamma_SingleLept");
    }

    #[test]
    fn yaml_config_with_partial_settings() {
        let text = r#"
settings:
  min_jets: 3
chunks:
  - path: /data/ttgamma_0.parquet
    dataset: TTGamma_SingleLept_2016
  - path: /data/mu_0.parquet
    dataset: Data_SingleMu_b_2016
"#;
        let config: RunConfig = serde_yaml::from_str(text).unwrap();
        assert_eq!(config.settings.min_jets, 3);
        assert_eq!(config.settings.year, 2016);
        assert!(!config.chunks[0].is_data());
        assert!(config.chunks[1].is_data());
    }

    #[test]
    fn explicit_data_flag_wins() {
        let chunk = ChunkSpec {
            path: PathBuf::from("x.parquet"),
            dataset: "DataDriven_2016".to_string(),
            is_data: Some(false),
        };
        assert!(!chunk.is_data());
    }
}
