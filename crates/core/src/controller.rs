//! Selection and enablement state behind the interactive UI.
//!
//! The controller owns no threads and performs no rendering. The UI feeds it
//! user intents and task events; it answers with what to show and which
//! actions are allowed.

use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::models::{ModelStatus, Precision, TaskCategory};
use crate::probe::Capabilities;
use crate::store::WeightStore;
use crate::tasks::{TaskEvent, TaskOutcome, TaskRequest};

pub const FINISHED_MARKER: &str = "--- Task Finished ---";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Download,
    Build(Precision),
}

/// Why an action is not available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    NoModel,
    Busy,
    CompilerPrerequisites,
    NotDownloaded,
    CalibrationMissing,
}

impl DisabledReason {
    pub fn message(&self) -> &'static str {
        match self {
            DisabledReason::NoModel => "Select a model first.",
            DisabledReason::Busy => "A task is currently running.",
            DisabledReason::CompilerPrerequisites => {
                "Building a TensorRT engine requires a CUDA-enabled GPU and TensorRT to be installed."
            }
            DisabledReason::NotDownloaded => {
                "Please download the model first before building an engine."
            }
            DisabledReason::CalibrationMissing => "Select a calibration YAML to enable INT8 build.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enablement {
    Enabled,
    Disabled(DisabledReason),
}

impl Enablement {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Enablement::Enabled)
    }

    pub fn reason(&self) -> Option<DisabledReason> {
        match self {
            Enablement::Enabled => None,
            Enablement::Disabled(reason) => Some(*reason),
        }
    }
}

/// Build policy for a selected, idle model.
pub fn build_enablement(
    status: &ModelStatus,
    caps: &Capabilities,
    calibration_set: bool,
    precision: Precision,
) -> Enablement {
    if !caps.can_compile() {
        Enablement::Disabled(DisabledReason::CompilerPrerequisites)
    } else if !status.downloaded {
        Enablement::Disabled(DisabledReason::NotDownloaded)
    } else if precision.needs_calibration() && !calibration_set {
        Enablement::Disabled(DisabledReason::CalibrationMissing)
    } else {
        Enablement::Enabled
    }
}

/// A single-choice list with wrap-around navigation.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector<T> {
    items: Vec<T>,
    selected: usize,
}

impl<T> Selector<T> {
    fn new(items: Vec<T>) -> Self {
        Self { items, selected: 0 }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn index(&self) -> Option<usize> {
        (!self.items.is_empty()).then_some(self.selected)
    }

    pub fn selected(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    fn select(&mut self, index: usize) -> bool {
        if index < self.items.len() && index != self.selected {
            self.selected = index;
            true
        } else {
            false
        }
    }

    fn next_index(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            (self.selected + 1) % self.items.len()
        }
    }

    fn previous_index(&self) -> usize {
        self.selected
            .checked_sub(1)
            .unwrap_or(self.items.len().saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Version,
    Category,
    Model,
}

pub struct Controller {
    catalog: Catalog,
    store: WeightStore,
    caps: Capabilities,

    versions: Selector<String>,
    categories: Selector<TaskCategory>,
    models: Selector<String>,

    status: Option<ModelStatus>,
    calibration: Option<PathBuf>,
    running: Option<Action>,
    transfer: Option<(u64, Option<u64>)>,
    log: Vec<String>,
}

impl Controller {
    pub fn new(catalog: Catalog, store: WeightStore, caps: Capabilities) -> Self {
        let versions = Selector::new(catalog.versions().map(str::to_string).collect());
        let mut controller = Self {
            catalog,
            store,
            caps,
            versions,
            categories: Selector::new(Vec::new()),
            models: Selector::new(Vec::new()),
            status: None,
            calibration: None,
            running: None,
            transfer: None,
            log: Vec::new(),
        };
        controller.update_categories();
        controller
    }

    pub fn versions(&self) -> &Selector<String> {
        &self.versions
    }

    pub fn categories(&self) -> &Selector<TaskCategory> {
        &self.categories
    }

    pub fn models(&self) -> &Selector<String> {
        &self.models
    }

    pub fn selected_model(&self) -> Option<&str> {
        self.models.selected().map(String::as_str)
    }

    /// On-disk state of the selected model as of the last refresh.
    pub fn status(&self) -> Option<&ModelStatus> {
        self.status.as_ref()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn store(&self) -> &WeightStore {
        &self.store
    }

    pub fn calibration(&self) -> Option<&Path> {
        self.calibration.as_deref()
    }

    pub fn running(&self) -> Option<Action> {
        self.running
    }

    pub fn is_busy(&self) -> bool {
        self.running.is_some()
    }

    /// Latest byte counts reported by a running download.
    pub fn transfer(&self) -> Option<(u64, Option<u64>)> {
        self.transfer
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Select an entry of `field`. Ignored while a task is running.
    pub fn select(&mut self, field: Field, index: usize) -> bool {
        if self.is_busy() {
            return false;
        }
        match field {
            Field::Version => {
                let changed = self.versions.select(index);
                if changed {
                    self.update_categories();
                }
                changed
            }
            Field::Category => {
                let changed = self.categories.select(index);
                if changed {
                    self.update_models();
                }
                changed
            }
            Field::Model => {
                let changed = self.models.select(index);
                if changed {
                    self.refresh();
                }
                changed
            }
        }
    }

    pub fn select_next(&mut self, field: Field) -> bool {
        let index = match field {
            Field::Version => self.versions.next_index(),
            Field::Category => self.categories.next_index(),
            Field::Model => self.models.next_index(),
        };
        self.select(field, index)
    }

    pub fn select_previous(&mut self, field: Field) -> bool {
        let index = match field {
            Field::Version => self.versions.previous_index(),
            Field::Category => self.categories.previous_index(),
            Field::Model => self.models.previous_index(),
        };
        self.select(field, index)
    }

    /// Select a model by name, moving version and category to match.
    pub fn select_model_named(&mut self, model: &str) -> bool {
        let Some(version) = self.catalog.version_of(model).map(str::to_string) else {
            return false;
        };
        let category = TaskCategory::classify(model);

        if let Some(i) = self.versions.items().iter().position(|v| *v == version) {
            self.select(Field::Version, i);
        }
        if let Some(i) = self.categories.items().iter().position(|c| *c == category) {
            self.select(Field::Category, i);
        }
        if let Some(i) = self.models.items().iter().position(|m| m == model) {
            self.select(Field::Model, i);
        }
        self.selected_model() == Some(model)
    }

    pub fn set_calibration(&mut self, path: PathBuf) -> bool {
        if self.is_busy() {
            return false;
        }
        tracing::info!("Calibration set to {:?}", path);
        self.calibration = Some(path);
        true
    }

    pub fn clear_calibration(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.calibration = None;
        true
    }

    pub fn set_capabilities(&mut self, caps: Capabilities) {
        self.caps = caps;
    }

    /// Re-read the selected model's state from disk.
    pub fn refresh(&mut self) {
        self.status = self.selected_model().map(|m| self.store.snapshot(m));
    }

    pub fn enablement(&self, action: Action) -> Enablement {
        let Some(status) = self.status.as_ref() else {
            return Enablement::Disabled(DisabledReason::NoModel);
        };
        if self.is_busy() {
            return Enablement::Disabled(DisabledReason::Busy);
        }
        match action {
            Action::Download => Enablement::Enabled,
            Action::Build(precision) => {
                build_enablement(status, &self.caps, self.calibration.is_some(), precision)
            }
        }
    }

    /// Start `action` if it is enabled, returning the request to run.
    pub fn begin(&mut self, action: Action) -> Result<TaskRequest, DisabledReason> {
        if let Enablement::Disabled(reason) = self.enablement(action) {
            return Err(reason);
        }
        let Some(model) = self.selected_model().map(str::to_string) else {
            return Err(DisabledReason::NoModel);
        };

        let request = match action {
            Action::Download => TaskRequest::Download { model },
            Action::Build(precision) => TaskRequest::Build {
                model,
                precision,
                calibration: if precision.needs_calibration() {
                    self.calibration.clone()
                } else {
                    None
                },
            },
        };

        self.log.clear();
        self.log.push(request.describe());
        self.transfer = None;
        self.running = Some(action);
        Ok(request)
    }

    /// Apply one task event. Returns the outcome when the task finishes.
    pub fn handle(&mut self, event: TaskEvent) -> Option<TaskOutcome> {
        match event {
            TaskEvent::Output(line) => {
                self.log.push(line);
                None
            }
            TaskEvent::Transfer { downloaded, total } => {
                self.transfer = Some((downloaded, total));
                None
            }
            TaskEvent::Finished(outcome) => {
                self.log.push(String::new());
                self.log.push(FINISHED_MARKER.to_string());
                let mark = if outcome.success() { "✅" } else { "❌" };
                self.log.push(format!("{} {}", mark, outcome.message()));
                self.running = None;
                self.transfer = None;
                self.refresh();
                Some(outcome)
            }
        }
    }

    pub fn clear_log(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        self.log.clear();
        true
    }

    fn update_categories(&mut self) {
        let categories = self
            .versions
            .selected()
            .map(|v| self.catalog.categories(v))
            .unwrap_or_default();
        self.categories = Selector::new(categories);
        self.update_models();
    }

    fn update_models(&mut self) {
        let models = match (self.versions.selected(), self.categories.selected()) {
            (Some(version), Some(category)) => self.catalog.models_for(version, *category),
            _ => Vec::new(),
        };
        self.models = Selector::new(models);
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::GpuInfo;
    use std::fs;

    const CATALOG: &str = r#"{
        "YOLOv8": ["yolov8n", "yolov8s", "yolov8n-seg", "yolov8n-cls"],
        "YOLO11": ["yolo11n-pose", "yolo11n-obb"]
    }"#;

    fn full_caps() -> Capabilities {
        Capabilities {
            gpu: Some(GpuInfo {
                name: "RTX".to_string(),
                vram_mb: 8192,
            }),
            compiler_runtime: true,
        }
    }

    fn controller(dir: &Path, caps: Capabilities) -> Controller {
        Controller::new(
            Catalog::from_json(CATALOG).unwrap(),
            WeightStore::new(dir),
            caps,
        )
    }

    fn build_enabled(c: &Controller, p: Precision) -> bool {
        c.enablement(Action::Build(p)).is_enabled()
    }

    fn other_actions(c: &Controller) -> Vec<Enablement> {
        [
            Action::Download,
            Action::Build(Precision::Fp32),
            Action::Build(Precision::Fp16),
        ]
        .into_iter()
        .map(|a| c.enablement(a))
        .collect()
    }

    #[test]
    fn starts_on_first_entries() {
        let dir = tempfile::tempdir().unwrap();
        let c = controller(dir.path(), full_caps());
        assert_eq!(c.versions().selected().unwrap(), "YOLOv8");
        assert_eq!(
            c.categories().items(),
            &[
                TaskCategory::Detection,
                TaskCategory::Segmentation,
                TaskCategory::Classification
            ]
        );
        assert_eq!(c.models().items(), &["yolov8n", "yolov8s"]);
        assert_eq!(c.selected_model(), Some("yolov8n"));
    }

    #[test]
    fn changing_version_cascades() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller(dir.path(), full_caps());
        assert!(c.select(Field::Version, 1));
        assert_eq!(
            c.categories().items(),
            &[TaskCategory::Pose, TaskCategory::Obb]
        );
        assert_eq!(c.selected_model(), Some("yolo11n-pose"));

        assert!(c.select_next(Field::Category));
        assert_eq!(c.models().items(), &["yolo11n-obb"]);
    }

    #[test]
    fn navigation_wraps_around() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller(dir.path(), full_caps());
        assert!(c.select_previous(Field::Model));
        assert_eq!(c.selected_model(), Some("yolov8s"));
        assert!(c.select_next(Field::Model));
        assert_eq!(c.selected_model(), Some("yolov8n"));
    }

    #[test]
    fn download_enabled_whenever_a_model_is_selected() {
        let dir = tempfile::tempdir().unwrap();
        let c = controller(dir.path(), Capabilities::default());
        assert!(c.enablement(Action::Download).is_enabled());
    }

    #[test]
    fn build_reasons_follow_policy_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller(dir.path(), Capabilities::default());
        assert_eq!(
            c.enablement(Action::Build(Precision::Fp16)).reason(),
            Some(DisabledReason::CompilerPrerequisites)
        );

        c.set_capabilities(full_caps());
        assert_eq!(
            c.enablement(Action::Build(Precision::Fp32)).reason(),
            Some(DisabledReason::NotDownloaded)
        );

        fs::write(dir.path().join("yolov8n.pt"), b"w").unwrap();
        c.refresh();
        assert!(build_enabled(&c, Precision::Fp32));
        assert!(build_enabled(&c, Precision::Fp16));
        assert_eq!(
            c.enablement(Action::Build(Precision::Int8)).reason(),
            Some(DisabledReason::CalibrationMissing)
        );
    }

    #[test]
    fn calibration_toggles_only_int8() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("yolov8n.pt"), b"w").unwrap();
        let mut c = controller(dir.path(), full_caps());

        let before = other_actions(&c);
        let status_before = c.status().copied();
        assert!(!build_enabled(&c, Precision::Int8));

        assert!(c.set_calibration(PathBuf::from("calib.yaml")));

        assert!(build_enabled(&c, Precision::Int8));
        let after = other_actions(&c);
        assert_eq!(before, after);
        assert_eq!(status_before, c.status().copied());
        assert_eq!(c.selected_model(), Some("yolov8n"));

        assert!(c.clear_calibration());
        assert!(!build_enabled(&c, Precision::Int8));
    }

    #[test]
    fn running_task_locks_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller(dir.path(), full_caps());

        let request = c.begin(Action::Download).unwrap();
        assert_eq!(
            request,
            TaskRequest::Download {
                model: "yolov8n".to_string()
            }
        );
        assert!(c.is_busy());
        assert_eq!(c.log(), &["Starting model download for yolov8n...".to_string()]);

        assert_eq!(
            c.enablement(Action::Download).reason(),
            Some(DisabledReason::Busy)
        );
        assert_eq!(c.begin(Action::Download), Err(DisabledReason::Busy));
        assert!(!c.select(Field::Model, 1));
        assert!(!c.set_calibration(PathBuf::from("x.yaml")));
        assert!(!c.clear_log());
        assert_eq!(c.selected_model(), Some("yolov8n"));
    }

    #[test]
    fn finishing_appends_marker_and_requeries() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller(dir.path(), full_caps());
        c.begin(Action::Download).unwrap();

        assert!(c.handle(TaskEvent::Output("fetching".to_string())).is_none());
        c.handle(TaskEvent::Transfer {
            downloaded: 10,
            total: Some(20),
        });
        assert_eq!(c.transfer(), Some((10, Some(20))));

        fs::write(dir.path().join("yolov8n.pt"), b"w").unwrap();
        let outcome = c
            .handle(TaskEvent::Finished(TaskOutcome::Download {
                success: true,
                message: "Download successful.".to_string(),
            }))
            .unwrap();

        assert!(outcome.success());
        assert!(!c.is_busy());
        assert_eq!(c.transfer(), None);
        assert!(c.status().unwrap().downloaded);
        let log = c.log();
        assert_eq!(log[log.len() - 2], FINISHED_MARKER);
        assert_eq!(log[log.len() - 1], "✅ Download successful.");
        assert!(build_enabled(&c, Precision::Fp16));
    }

    #[test]
    fn int8_request_carries_calibration() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("yolov8n.pt"), b"w").unwrap();
        let mut c = controller(dir.path(), full_caps());
        c.set_calibration(PathBuf::from("calib.yaml"));

        let request = c.begin(Action::Build(Precision::Int8)).unwrap();
        assert_eq!(
            request,
            TaskRequest::Build {
                model: "yolov8n".to_string(),
                precision: Precision::Int8,
                calibration: Some(PathBuf::from("calib.yaml")),
            }
        );
    }

    #[test]
    fn fp16_request_omits_calibration() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("yolov8n.pt"), b"w").unwrap();
        let mut c = controller(dir.path(), full_caps());
        c.set_calibration(PathBuf::from("calib.yaml"));

        match c.begin(Action::Build(Precision::Fp16)).unwrap() {
            TaskRequest::Build { calibration, .. } => assert_eq!(calibration, None),
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[test]
    fn selects_model_by_name_across_versions() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = controller(dir.path(), full_caps());
        assert!(c.select_model_named("yolo11n-obb"));
        assert_eq!(c.versions().selected().unwrap(), "YOLO11");
        assert_eq!(c.categories().selected(), Some(&TaskCategory::Obb));
        assert!(!c.select_model_named("yolov5n"));
    }

    #[test]
    fn empty_catalog_has_nothing_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let c = Controller::new(Catalog::default(), WeightStore::new(dir.path()), full_caps());
        assert_eq!(c.selected_model(), None);
        assert_eq!(
            c.enablement(Action::Download).reason(),
            Some(DisabledReason::NoModel)
        );
    }
}
