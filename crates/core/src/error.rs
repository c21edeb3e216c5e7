use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Required catalog file not found: '{0}'")]
    CatalogNotFound(PathBuf),

    #[error("Error decoding catalog {path}: {source}")]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Catalog version '{version}' must map to an array of model names")]
    CatalogShape { version: String },

    #[error("Model '{model}' is listed more than once under version '{version}'")]
    DuplicateModel { version: String, model: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Model file not found at {0}. Please download the model first.")]
    WeightsMissing(PathBuf),

    #[error("INT8 calibration requires a valid calibration YAML file to be selected.")]
    CalibrationRequired,

    #[error("Calibration file not found: {0}")]
    CalibrationNotFound(PathBuf),

    #[error("Calibration file {path} is not a YAML mapping")]
    CalibrationInvalid { path: PathBuf },

    #[error("Failed to launch compiler '{program}': {source}")]
    CompilerSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine build failed with exit code {0}.")]
    CompilerExit(i32),

    #[error("Engine build failed: compiler terminated by a signal.")]
    CompilerKilled,

    #[error("Engine build failed. Engine file not found at {0}.")]
    ArtifactNotProduced(PathBuf),

    #[error("Unknown precision '{0}' (expected fp32, fp16 or int8)")]
    UnknownPrecision(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
