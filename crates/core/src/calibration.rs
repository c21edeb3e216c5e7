//! INT8 calibration descriptors.
//!
//! Dataset YAML files usually point at their images with paths relative to
//! the YAML file itself. The compiler resolves them against its own working
//! directory instead, so we hand it a temporary copy with those paths made
//! absolute.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// Keys whose values are dataset locations.
const LOCATION_KEYS: [&str; 3] = ["path", "train", "val"];

/// A calibration descriptor rewritten into a temporary file.
///
/// The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct ResolvedCalibration {
    file: NamedTempFile,
}

impl ResolvedCalibration {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Resolve the descriptor at `descriptor` into a temporary copy.
///
/// The original file is only read.
pub fn resolve(descriptor: &Path) -> Result<ResolvedCalibration> {
    if !descriptor.is_file() {
        return Err(Error::CalibrationNotFound(descriptor.to_path_buf()));
    }

    let content = fs::read_to_string(descriptor)?;
    let mut doc: Value = serde_yaml::from_str(&content)?;
    let base = descriptor_dir(descriptor)?;

    let Some(map) = doc.as_mapping_mut() else {
        return Err(Error::CalibrationInvalid {
            path: descriptor.to_path_buf(),
        });
    };
    absolutize(map, &base);

    let mut file = tempfile::Builder::new()
        .prefix("enginekit-calib-")
        .suffix(".yaml")
        .tempfile()?;
    file.write_all(serde_yaml::to_string(&doc)?.as_bytes())?;
    file.flush()?;

    tracing::debug!(
        "Resolved calibration {:?} into {:?}",
        descriptor,
        file.path()
    );
    Ok(ResolvedCalibration { file })
}

fn descriptor_dir(descriptor: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(descriptor)?;
    Ok(absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default())
}

fn absolutize(map: &mut Mapping, base: &Path) {
    for key in LOCATION_KEYS {
        if let Some(value) = map.get_mut(key) {
            resolve_value(value, base);
        }
    }
}

fn resolve_value(value: &mut Value, base: &Path) {
    match value {
        Value::String(s) => {
            let p = Path::new(s.as_str());
            if p.is_relative() {
                *s = base.join(p).to_string_lossy().into_owned();
            }
        }
        Value::Sequence(items) => {
            for item in items {
                resolve_value(item, base);
            }
        }
        _ => {}
    }
}
