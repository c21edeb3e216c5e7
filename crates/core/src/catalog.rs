//! Versioned model catalog loaded from `models.json`.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::TaskCategory;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    versions: Vec<(String, Vec<String>)>,
}

impl Catalog {
    /// Load the catalog. A missing file is fatal for the caller.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::CatalogNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        let catalog = Self::from_json(&content).map_err(|e| match e {
            Error::CatalogParse { source, .. } => Error::CatalogParse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::debug!(
            "Loaded catalog {:?} with {} version(s)",
            path,
            catalog.versions.len()
        );
        Ok(catalog)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let root: Map<String, Value> =
            serde_json::from_str(content).map_err(|source| Error::CatalogParse {
                path: Default::default(),
                source,
            })?;

        let mut versions = Vec::with_capacity(root.len());
        for (version, value) in root {
            let Value::Array(items) = value else {
                return Err(Error::CatalogShape { version });
            };

            let mut seen = HashSet::new();
            let mut models = Vec::with_capacity(items.len());
            for item in items {
                let Value::String(model) = item else {
                    return Err(Error::CatalogShape { version });
                };
                if !seen.insert(model.clone()) {
                    return Err(Error::DuplicateModel { version, model });
                }
                models.push(model);
            }
            versions.push((version, models));
        }

        Ok(Self { versions })
    }

    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.versions.iter().map(|(v, _)| v.as_str())
    }

    pub fn models(&self, version: &str) -> &[String] {
        self.versions
            .iter()
            .find(|(v, _)| v == version)
            .map(|(_, m)| m.as_slice())
            .unwrap_or(&[])
    }

    pub fn categories(&self, version: &str) -> Vec<TaskCategory> {
        TaskCategory::present_in(self.models(version))
    }

    pub fn models_for(&self, version: &str, category: TaskCategory) -> Vec<String> {
        self.models(version)
            .iter()
            .filter(|m| TaskCategory::classify(m) == category)
            .cloned()
            .collect()
    }

    /// Find which version lists `model`.
    pub fn version_of(&self, model: &str) -> Option<&str> {
        self.versions
            .iter()
            .find(|(_, models)| models.iter().any(|m| m == model))
            .map(|(v, _)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
