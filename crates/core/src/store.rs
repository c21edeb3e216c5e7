//! Filesystem view of downloaded weights and compiled engines.
//!
//! Nothing is cached: every query stats the file again, so answers always
//! reflect what is on disk right now.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::{ModelStatus, Precision};

const WEIGHTS_EXT: &str = "pt";
const ENGINE_EXT: &str = "engine";

#[derive(Debug, Clone)]
pub struct WeightStore {
    weights_dir: PathBuf,
}

impl WeightStore {
    pub fn new(weights_dir: impl Into<PathBuf>) -> Self {
        Self {
            weights_dir: weights_dir.into(),
        }
    }

    pub fn weights_dir(&self) -> &Path {
        &self.weights_dir
    }

    /// Create the weights directory if needed and return it.
    pub fn ensure_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.weights_dir)?;
        Ok(&self.weights_dir)
    }

    /// `<weights_dir>/<model>.pt`
    pub fn weights_path(&self, model: &str) -> PathBuf {
        self.weights_dir.join(format!("{}.{}", stem(model), WEIGHTS_EXT))
    }

    /// `<weights_dir>/<stem>-<precision>.engine`
    pub fn engine_path(&self, model: &str, precision: Precision) -> PathBuf {
        self.weights_dir
            .join(format!("{}-{}.{}", stem(model), precision, ENGINE_EXT))
    }

    /// Name the compiler gives its output before we tag it with a precision.
    pub fn generic_engine_path(&self, model: &str) -> PathBuf {
        self.weights_dir.join(format!("{}.{}", stem(model), ENGINE_EXT))
    }

    pub fn is_downloaded(&self, model: &str) -> bool {
        self.weights_path(model).is_file()
    }

    pub fn is_built(&self, model: &str, precision: Precision) -> bool {
        self.engine_path(model, precision).is_file()
    }

    pub fn snapshot(&self, model: &str) -> ModelStatus {
        ModelStatus {
            downloaded: self.is_downloaded(model),
            fp32: self.is_built(model, Precision::Fp32),
            fp16: self.is_built(model, Precision::Fp16),
            int8: self.is_built(model, Precision::Int8),
        }
    }

    /// File names of every `*.pt` in the weights directory, sorted.
    pub fn cached_weights(&self) -> Result<Vec<String>> {
        if !self.weights_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.weights_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map(|e| e == WEIGHTS_EXT).unwrap_or(false) {
                if let Some(name) = path.file_name() {
                    names.push(name.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Stale partial downloads left behind by interrupted transfers.
    pub fn partial_downloads(&self) -> Vec<PathBuf> {
        if !self.weights_dir.exists() {
            return Vec::new();
        }
        walkdir::WalkDir::new(&self.weights_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.extension().map(|e| e == "part").unwrap_or(false))
            .collect()
    }
}

fn stem(model: &str) -> &str {
    model.strip_suffix(".pt").unwrap_or(model)
}
