//! enginekit_core - Core library for engine builds
//!
//! This crate provides:
//! - The versioned model catalog and task classification
//! - Weights and engine lookups on disk
//! - Weights downloads and `yolo export` engine builds as background tasks
//! - The controller state machine behind the terminal UI

pub mod calibration;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod downloaders;
pub mod error;
pub mod models;
pub mod probe;
pub mod store;
pub mod tasks;

pub use catalog::Catalog;
pub use config::Config;
pub use controller::{Action, Controller, DisabledReason, Enablement, Field};
pub use error::{Error, Result};
pub use models::{ModelStatus, Precision, TaskCategory};
pub use probe::Capabilities;
pub use store::WeightStore;
pub use tasks::{TaskEvent, TaskHandle, TaskOutcome, TaskRequest, TaskRunner};
