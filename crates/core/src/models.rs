use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Numeric representation used when compiling an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Fp32,
    Fp16,
    Int8,
}

impl Precision {
    pub const ALL: [Precision; 3] = [Precision::Fp32, Precision::Fp16, Precision::Int8];

    /// Tag used in artifact file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Fp32 => "fp32",
            Precision::Fp16 => "fp16",
            Precision::Int8 => "int8",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Precision::Fp32 => "FP32",
            Precision::Fp16 => "FP16",
            Precision::Int8 => "INT8",
        }
    }

    pub fn needs_calibration(&self) -> bool {
        matches!(self, Precision::Int8)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Precision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fp32" => Ok(Precision::Fp32),
            "fp16" => Ok(Precision::Fp16),
            "int8" => Ok(Precision::Int8),
            _ => Err(Error::UnknownPrecision(s.to_string())),
        }
    }
}

/// Vision task a model identifier is trained for, derived from its suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskCategory {
    Detection,
    Segmentation,
    Pose,
    Obb,
    Classification,
}

impl TaskCategory {
    /// Selector order.
    pub const ORDER: [TaskCategory; 5] = [
        TaskCategory::Detection,
        TaskCategory::Segmentation,
        TaskCategory::Pose,
        TaskCategory::Obb,
        TaskCategory::Classification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Detection => "Detection",
            TaskCategory::Segmentation => "Segmentation",
            TaskCategory::Pose => "Pose",
            TaskCategory::Obb => "OBB",
            TaskCategory::Classification => "Classification",
        }
    }

    pub fn classify(model: &str) -> Self {
        if model.contains("-pose") {
            TaskCategory::Pose
        } else if model.contains("-seg") {
            TaskCategory::Segmentation
        } else if model.contains("-obb") {
            TaskCategory::Obb
        } else if model.contains("-cls") {
            TaskCategory::Classification
        } else {
            TaskCategory::Detection
        }
    }

    /// Distinct categories of `models`, in selector order.
    pub fn present_in<'a, I>(models: I) -> Vec<TaskCategory>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let found: Vec<TaskCategory> = models.into_iter().map(|m| Self::classify(m)).collect();
        Self::ORDER
            .into_iter()
            .filter(|c| found.contains(c))
            .collect()
    }
}

impl fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk state of one model, read in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelStatus {
    pub downloaded: bool,
    pub fp32: bool,
    pub fp16: bool,
    pub int8: bool,
}

impl ModelStatus {
    pub fn is_built(&self, precision: Precision) -> bool {
        match precision {
            Precision::Fp32 => self.fp32,
            Precision::Fp16 => self.fp16,
            Precision::Int8 => self.int8,
        }
    }
}
