use geo_common::DetectionRequest;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Batch contains no jobs")]
    NoJobs,
    #[error("Duplicate job name '{0}'")]
    DuplicateJob(String),
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// One extent and date pair to compare
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DetectionJob {
    pub name: String,
    pub description: Option<String>,
    /// `[minX, minY, maxX, maxY]` in the imagery service's CRS
    pub bounds: Vec<f64>,
    pub before_date: String,
    pub after_date: String,
}

impl DetectionJob {
    pub fn request(&self) -> DetectionRequest {
        DetectionRequest {
            bounds: self.bounds.clone(),
            before_date: self.before_date.clone(),
            after_date: self.after_date.clone(),
        }
    }

    /// Path of the JSON result for this job inside `output_dir`
    pub fn result_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}.json", self.name))
    }

    /// Path of the difference mask PNG for this job inside `output_dir`
    pub fn difference_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_difference.png", self.name))
    }
}

/// A batch of detections sharing an output directory
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DetectionBatch {
    pub output_dir: String,
    /// Optional service configuration file (.toml or .json)
    pub config: Option<String>,
    pub jobs: Vec<DetectionJob>,
}

impl DetectionBatch {
    /// Load a batch from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, BatchError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, BatchError> {
        let batch: DetectionBatch = toml::from_str(content)?;
        batch.checked()
    }

    /// Load a batch from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, BatchError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, BatchError> {
        let batch: DetectionBatch = serde_json::from_str(content)?;
        batch.checked()
    }

    /// Auto-detect file format and load the batch
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BatchError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(BatchError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String, BatchError> {
        Ok(toml::to_string_pretty(&self)?)
    }

    pub fn to_json(&self) -> Result<String, BatchError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }

    pub fn output_dir(&self) -> &Path {
        Path::new(&self.output_dir)
    }

    // Job names become file names, so they must be unique
    fn checked(self) -> Result<Self, BatchError> {
        if self.jobs.is_empty() {
            return Err(BatchError::NoJobs);
        }
        let mut seen = std::collections::HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(BatchError::DuplicateJob(job.name.clone()));
            }
        }
        Ok(self)
    }
}
