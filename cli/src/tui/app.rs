use anyhow::Result;
use enginekit_core::config::ProbeConfig;
use enginekit_core::{
    Action, Capabilities, Config, Controller, Field, Precision, TaskHandle, TaskOutcome,
    TaskRunner,
};
use std::path::PathBuf;

use crate::commands::{load_catalog, task_runner};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppMode {
    Normal,
    /// Typing the calibration YAML path
    Calibration,
    ConfirmQuit,
    /// Showing the result of the last task
    Notice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub success: bool,
}

impl Notice {
    fn from_outcome(outcome: &TaskOutcome) -> Self {
        let (kind, success) = match outcome {
            TaskOutcome::Download { success, .. } => ("Download", *success),
            TaskOutcome::Build { success, .. } => ("Engine Build", *success),
        };
        Self {
            title: format!("{} {}", kind, if success { "Successful" } else { "Failed" }),
            message: outcome.message().to_string(),
            success,
        }
    }
}

const FOCUS_ORDER: [Field; 3] = [Field::Version, Field::Category, Field::Model];

pub struct App {
    pub mode: AppMode,
    pub focus: Field,
    pub input: String,
    pub notice: Option<Notice>,
    pub status_message: String,
    pub ticks: usize,

    controller: Controller,
    runner: TaskRunner,
    task: Option<TaskHandle>,
    probe: ProbeConfig,
}

impl App {
    pub fn new(config: &Config) -> Result<Self> {
        let catalog = load_catalog(config)?;
        let runner = task_runner(config)?;
        let caps = Capabilities::detect(&config.probe);
        let controller = Controller::new(catalog, runner.store().clone(), caps);
        Ok(Self::from_parts(controller, runner, config.probe.clone()))
    }

    fn from_parts(controller: Controller, runner: TaskRunner, probe: ProbeConfig) -> Self {
        Self {
            mode: AppMode::Normal,
            focus: Field::Model,
            input: String::new(),
            notice: None,
            status_message: String::from("Select a model, then press 'd' to download"),
            ticks: 0,
            controller,
            runner,
            task: None,
            probe,
        }
    }

    pub fn preselect(&mut self, model: &str) -> Result<()> {
        if !self.controller.select_model_named(model) {
            anyhow::bail!("Model '{}' is not in the catalog", model);
        }
        self.status_message = format!("Selected: {}", model);
        Ok(())
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn is_busy(&self) -> bool {
        self.controller.is_busy()
    }

    /// Why the first inactive build action is inactive, if any is.
    pub fn build_hint(&self) -> Option<&'static str> {
        Precision::ALL
            .into_iter()
            .find_map(|p| self.controller.enablement(Action::Build(p)).reason())
            .map(|reason| reason.message())
    }

    pub fn next_focus(&mut self) {
        let i = FOCUS_ORDER.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = FOCUS_ORDER[(i + 1) % FOCUS_ORDER.len()];
    }

    pub fn previous_focus(&mut self) {
        let i = FOCUS_ORDER.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = FOCUS_ORDER[(i + FOCUS_ORDER.len() - 1) % FOCUS_ORDER.len()];
    }

    pub fn next(&mut self) {
        if !self.controller.select_next(self.focus) && self.is_busy() {
            self.status_message = "Selection is locked while a task is running".to_string();
        }
    }

    pub fn previous(&mut self) {
        if !self.controller.select_previous(self.focus) && self.is_busy() {
            self.status_message = "Selection is locked while a task is running".to_string();
        }
    }

    pub fn start(&mut self, action: Action) {
        match self.controller.begin(action) {
            Ok(request) => {
                self.status_message = request.describe();
                self.task = Some(self.runner.spawn(request));
            }
            Err(reason) => self.status_message = reason.message().to_string(),
        }
    }

    pub fn edit_calibration(&mut self) {
        if self.is_busy() {
            self.status_message = "Calibration is locked while a task is running".to_string();
            return;
        }
        self.input = self
            .controller
            .calibration()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        self.mode = AppMode::Calibration;
    }

    pub fn submit_calibration(&mut self) {
        let path = PathBuf::from(self.input.trim());
        if path.as_os_str().is_empty() {
            self.mode = AppMode::Normal;
            return;
        }
        if !path.is_file() {
            self.status_message = format!("Calibration file not found: {}", path.display());
            return;
        }
        if self.controller.set_calibration(path.clone()) {
            self.status_message = format!("Calibration: {}", path.display());
        }
        self.mode = AppMode::Normal;
    }

    pub fn clear_calibration(&mut self) {
        if self.controller.clear_calibration() {
            self.status_message = "Calibration cleared".to_string();
        }
    }

    pub fn reprobe(&mut self) {
        self.controller
            .set_capabilities(Capabilities::detect(&self.probe));
        self.controller.refresh();
        self.status_message = "System capabilities re-checked".to_string();
    }

    pub fn clear_log(&mut self) {
        self.controller.clear_log();
    }

    /// Returns true if the app may exit right away.
    pub fn request_quit(&mut self) -> bool {
        if self.is_busy() {
            self.mode = AppMode::ConfirmQuit;
            false
        } else {
            true
        }
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
        self.mode = AppMode::Normal;
    }

    /// Drain pending task events into the controller.
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);

        let Some(handle) = self.task.as_mut() else {
            return;
        };
        while let Some(event) = handle.try_recv() {
            if let Some(outcome) = self.controller.handle(event) {
                let notice = Notice::from_outcome(&outcome);
                self.status_message = notice.title.clone();
                self.notice = Some(notice);
                // Nothing is running any more, so a pending quit prompt gives way.
                self.mode = AppMode::Notice;
                self.task = None;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use enginekit_core::downloaders::WeightFetcher;
    use enginekit_core::tasks::Progress;
    use enginekit_core::probe::GpuInfo;
    use enginekit_core::{Catalog, WeightStore};
    use std::path::Path;
    use std::sync::Arc;

    struct WritingFetcher;

    #[async_trait]
    impl WeightFetcher for WritingFetcher {
        async fn fetch(&self, _model: &str, dest: &Path, progress: &Progress) -> anyhow::Result<()> {
            progress.line("writing weights");
            std::fs::write(dest, b"weights")?;
            Ok(())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl WeightFetcher for FailingFetcher {
        async fn fetch(&self, _model: &str, _dest: &Path, _progress: &Progress) -> anyhow::Result<()> {
            anyhow::bail!("connection reset")
        }
    }

    fn app(dir: &Path) -> App {
        app_with(dir, Arc::new(WritingFetcher))
    }

    fn app_with(dir: &Path, fetcher: Arc<dyn WeightFetcher>) -> App {
        let catalog = Catalog::from_json(r#"{"v8": ["yolov8n", "yolov8n-seg"]}"#).unwrap();
        let store = WeightStore::new(dir);
        let runner = TaskRunner::new(store.clone(), fetcher, Config::default().compiler);
        let controller = Controller::new(catalog, store, Capabilities::default());
        App::from_parts(controller, runner, ProbeConfig::default())
    }

    async fn tick_until_idle(app: &mut App) {
        for _ in 0..200 {
            app.tick();
            if !app.is_busy() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("task did not finish");
    }

    #[tokio::test]
    async fn download_runs_to_a_success_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        app.start(Action::Download);
        assert!(app.is_busy());
        tick_until_idle(&mut app).await;

        assert_eq!(app.mode, AppMode::Notice);
        let notice = app.notice.clone().unwrap();
        assert_eq!(notice.title, "Download Successful");
        assert!(notice.success);
        assert!(app.controller().status().unwrap().downloaded);
        assert!(app
            .controller()
            .log()
            .iter()
            .any(|l| l == "writing weights"));

        app.dismiss_notice();
        assert_eq!(app.mode, AppMode::Normal);
    }

    #[tokio::test]
    async fn failure_during_quit_prompt_replaces_it_with_the_notice() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_with(dir.path(), Arc::new(FailingFetcher));

        app.start(Action::Download);
        assert!(!app.request_quit());
        assert_eq!(app.mode, AppMode::ConfirmQuit);
        tick_until_idle(&mut app).await;

        assert_eq!(app.mode, AppMode::Notice);
        let notice = app.notice.clone().unwrap();
        assert_eq!(notice.title, "Download Failed");
        assert_eq!(notice.message, "connection reset");
        assert!(!notice.success);
    }

    #[tokio::test]
    async fn disabled_build_reports_reason_without_starting() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        app.start(Action::Build(Precision::Fp16));

        assert!(!app.is_busy());
        assert_eq!(
            app.status_message,
            "Building a TensorRT engine requires a CUDA-enabled GPU and TensorRT to be installed."
        );
    }

    #[test]
    fn preselect_moves_every_selector() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());

        app.preselect("yolov8n-seg").unwrap();

        assert_eq!(app.controller().selected_model(), Some("yolov8n-seg"));
        assert!(app.preselect("yolov9z").is_err());
    }

    #[test]
    fn build_hint_explains_the_first_inactive_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert_eq!(
            app.build_hint(),
            Some("Building a TensorRT engine requires a CUDA-enabled GPU and TensorRT to be installed.")
        );

        app.controller.set_capabilities(Capabilities {
            gpu: Some(GpuInfo {
                name: "RTX".to_string(),
                vram_mb: 8192,
            }),
            compiler_runtime: true,
        });
        app.controller.refresh();
        assert_eq!(
            app.build_hint(),
            Some("Please download the model first before building an engine.")
        );

        std::fs::write(dir.path().join("yolov8n.pt"), b"weights").unwrap();
        app.controller.refresh();
        assert_eq!(
            app.build_hint(),
            Some("Select a calibration YAML to enable INT8 build.")
        );

        let yaml = dir.path().join("calib.yaml");
        std::fs::write(&yaml, "train: images\n").unwrap();
        assert!(app.controller.set_calibration(yaml));
        assert_eq!(app.build_hint(), None);
    }

    #[test]
    fn focus_cycles_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        assert_eq!(app.focus, Field::Model);
        app.next_focus();
        assert_eq!(app.focus, Field::Version);
        app.previous_focus();
        app.previous_focus();
        assert_eq!(app.focus, Field::Category);
    }

    #[test]
    fn missing_calibration_file_keeps_the_prompt_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(dir.path());
        app.edit_calibration();
        app.input = dir.path().join("nope.yaml").display().to_string();

        app.submit_calibration();

        assert_eq!(app.mode, AppMode::Calibration);
        assert!(app.controller().calibration().is_none());
    }
}
