//! Engine compilation through the external `yolo export` command.

use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;

use crate::calibration;
use crate::config::CompilerConfig;
use crate::error::{Error, Result};
use crate::models::Precision;
use crate::store::WeightStore;

use super::{Progress, TaskOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    pub model: String,
    pub precision: Precision,
    pub device: String,
    pub calibration: Option<PathBuf>,
}

pub async fn run(
    store: &WeightStore,
    compiler: &CompilerConfig,
    request: &BuildRequest,
    progress: &Progress,
) -> TaskOutcome {
    let (success, message) = match build(store, compiler, request, progress).await {
        Ok(engine) => {
            let name = engine
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            progress.line(format!("Engine build successful. Renamed to {}.", name));
            (true, "Engine build successful.".to_string())
        }
        Err(e) => {
            tracing::warn!(
                "Engine build for {} ({}) failed: {}",
                request.model,
                request.precision,
                e
            );
            progress.line(format!("Error: {}", e));
            (false, e.to_string())
        }
    };

    TaskOutcome::Build {
        success,
        model: request.model.clone(),
        precision: request.precision,
        message,
    }
}

async fn build(
    store: &WeightStore,
    compiler: &CompilerConfig,
    request: &BuildRequest,
    progress: &Progress,
) -> Result<PathBuf> {
    let weights = store.weights_path(&request.model);
    if !weights.is_file() {
        return Err(Error::WeightsMissing(weights));
    }

    // Held until the end of this function so the temporary copy outlives the
    // compiler on every path.
    let resolved = if request.precision.needs_calibration() {
        let descriptor = request
            .calibration
            .as_deref()
            .ok_or(Error::CalibrationRequired)?;
        Some(calibration::resolve(descriptor)?)
    } else {
        None
    };

    progress.line(format!(
        "Starting to build TensorRT engine for {} at {} precision...",
        request.model, request.precision
    ));

    let args = compiler_args(
        compiler,
        &weights,
        &request.device,
        request.precision,
        resolved.as_ref().map(|r| r.path()),
    );
    let status = run_compiler(&compiler.program, &args, progress).await?;

    if !status.success() {
        return Err(match status.code() {
            Some(code) => Error::CompilerExit(code),
            None => Error::CompilerKilled,
        });
    }

    let generic = store.generic_engine_path(&request.model);
    if !generic.is_file() {
        return Err(Error::ArtifactNotProduced(generic));
    }

    let engine = store.engine_path(&request.model, request.precision);
    tokio::fs::rename(&generic, &engine).await?;
    tracing::info!("Engine written to {:?}", engine);
    Ok(engine)
}

/// `<args...> model=<weights> format=engine device=<device> [half | int8 data=<yaml>]`
pub fn compiler_args(
    compiler: &CompilerConfig,
    weights: &Path,
    device: &str,
    precision: Precision,
    calibration: Option<&Path>,
) -> Vec<String> {
    let mut args = compiler.args.clone();
    args.push(format!("model={}", weights.display()));
    args.push("format=engine".to_string());
    args.push(format!("device={}", device));

    match precision {
        Precision::Fp32 => {}
        Precision::Fp16 => args.push("half".to_string()),
        Precision::Int8 => {
            args.push("int8".to_string());
            if let Some(data) = calibration {
                args.push(format!("data={}", data.display()));
            }
        }
    }
    args
}

async fn run_compiler(program: &str, args: &[String], progress: &Progress) -> Result<ExitStatus> {
    tracing::debug!("Running {} {}", program, args.join(" "));

    // stdout and stderr share one pipe so lines keep the order the compiler wrote them in.
    let (reader, writer) = io::pipe()?;
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer);
    let spawned = command.spawn();
    // Drops our copies of the write end, so the reader sees EOF once the child exits.
    drop(command);

    let mut child = spawned.map_err(|source| Error::CompilerSpawn {
        program: program.to_string(),
        source,
    })?;

    let forward = {
        let progress = progress.clone();
        tokio::task::spawn_blocking(move || forward_lines(reader, &progress))
    };

    let status = child.wait().await?;
    forward.await.map_err(io::Error::other)??;
    Ok(status)
}

/// Forward each line of `reader` as an output event. Invalid UTF-8 is
/// replaced rather than treated as an error.
fn forward_lines(reader: impl Read, progress: &Progress) -> io::Result<()> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if !line.is_empty() {
            progress.line(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskEvent;
    use std::fs;

    fn compiler(program: &str, args: &[&str]) -> CompilerConfig {
        CompilerConfig {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            device: "cuda:0".to_string(),
        }
    }

    fn request(model: &str, precision: Precision, calibration: Option<PathBuf>) -> BuildRequest {
        BuildRequest {
            model: model.to_string(),
            precision,
            device: "cuda:0".to_string(),
            calibration,
        }
    }

    fn output_lines(rx: &mut tokio::sync::mpsc::UnboundedReceiver<TaskEvent>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let TaskEvent::Output(line) = event {
                lines.push(line);
            }
        }
        lines
    }

    #[test]
    fn args_carry_precision_flags() {
        let c = compiler("yolo", &["export"]);
        let weights = Path::new("/w/yolov8n.pt");

        assert_eq!(
            compiler_args(&c, weights, "cuda:0", Precision::Fp32, None),
            vec!["export", "model=/w/yolov8n.pt", "format=engine", "device=cuda:0"]
        );
        assert_eq!(
            compiler_args(&c, weights, "cuda:0", Precision::Fp16, None).last().unwrap(),
            "half"
        );
        assert_eq!(
            compiler_args(&c, weights, "0", Precision::Int8, Some(Path::new("/tmp/c.yaml")))[3..],
            ["device=0", "int8", "data=/tmp/c.yaml"]
        );
    }

    #[tokio::test]
    async fn missing_weights_fail_before_compiling() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path());
        let marker = dir.path().join("invoked");
        let c = compiler("touch", &[marker.to_str().unwrap()]);
        let (progress, _rx) = Progress::channel();

        let outcome = run(&store, &c, &request("yolov8n", Precision::Fp16, None), &progress).await;

        assert!(!outcome.success());
        assert!(outcome.message().contains("Please download the model first"));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn int8_without_calibration_fails_before_compiling() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path());
        fs::write(store.weights_path("yolov8n"), b"w").unwrap();
        let marker = dir.path().join("invoked");
        let c = compiler("touch", &[marker.to_str().unwrap()]);
        let (progress, _rx) = Progress::channel();

        let outcome = run(&store, &c, &request("yolov8n", Precision::Int8, None), &progress).await;
        assert!(!outcome.success());
        assert_eq!(outcome.message(), Error::CalibrationRequired.to_string());

        let missing = Some(dir.path().join("absent.yaml"));
        let outcome = run(&store, &c, &request("yolov8n", Precision::Int8, missing), &progress).await;
        assert!(!outcome.success());
        assert!(outcome.message().starts_with("Calibration file not found"));

        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn unknown_compiler_is_a_failure_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path());
        fs::write(store.weights_path("yolov8n"), b"w").unwrap();
        let c = compiler("enginekit-no-such-compiler", &[]);
        let (progress, _rx) = Progress::channel();

        let outcome = run(&store, &c, &request("yolov8n", Precision::Fp32, None), &progress).await;
        assert!(!outcome.success());
        assert!(outcome.message().contains("enginekit-no-such-compiler"));
    }

    // The fake compiler is a shell script; `$1` is the `model=<path>` argument.
    #[cfg(unix)]
    const PRODUCE_ENGINE: &str =
        "m=\"${1#model=}\"; echo \"exporting $m\"; echo warn >&2; touch \"${m%.pt}.engine\"";

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_compile_renames_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path());
        fs::write(store.weights_path("yolov8n"), b"w").unwrap();
        let c = compiler("sh", &["-c", PRODUCE_ENGINE, "yolo"]);
        let (progress, mut rx) = Progress::channel();

        let outcome = run(&store, &c, &request("yolov8n", Precision::Fp16, None), &progress).await;

        assert_eq!(
            outcome,
            TaskOutcome::Build {
                success: true,
                model: "yolov8n".to_string(),
                precision: Precision::Fp16,
                message: "Engine build successful.".to_string(),
            }
        );
        assert!(store.is_built("yolov8n", Precision::Fp16));
        assert!(!store.generic_engine_path("yolov8n").exists());

        let lines = output_lines(&mut rx);
        assert!(lines.iter().any(|l| l.starts_with("exporting ")));
        assert!(lines.iter().any(|l| l == "warn"));
        assert_eq!(lines.last().unwrap(), "Engine build successful. Renamed to yolov8n-fp16.engine.");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_and_stderr_lines_keep_their_order() {
        let script = "echo o1; echo e1 >&2; echo o2; echo e2 >&2; echo o3";
        let args = vec!["-c".to_string(), script.to_string()];
        let (progress, mut rx) = Progress::channel();

        let status = run_compiler("sh", &args, &progress).await.unwrap();

        assert!(status.success());
        assert_eq!(output_lines(&mut rx), vec!["o1", "e1", "o2", "e2", "o3"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_fails_without_renaming() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path());
        fs::write(store.weights_path("yolov8n"), b"w").unwrap();
        let script = format!("{}; exit 3", PRODUCE_ENGINE);
        let c = compiler("sh", &["-c", &script, "yolo"]);
        let (progress, _rx) = Progress::channel();

        let outcome = run(&store, &c, &request("yolov8n", Precision::Fp32, None), &progress).await;

        assert!(!outcome.success());
        assert!(outcome.message().contains("exit code 3"));
        assert!(store.generic_engine_path("yolov8n").exists());
        assert!(!store.is_built("yolov8n", Precision::Fp32));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn clean_exit_without_artifact_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path());
        fs::write(store.weights_path("yolov8n"), b"w").unwrap();
        let c = compiler("sh", &["-c", "echo nothing to do", "yolo"]);
        let (progress, _rx) = Progress::channel();

        let outcome = run(&store, &c, &request("yolov8n", Precision::Fp16, None), &progress).await;

        assert!(!outcome.success());
        assert!(outcome.message().contains("Engine file not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn int8_passes_resolved_copy_and_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let store = WeightStore::new(dir.path().join("weights"));
        store.ensure_dir().unwrap();
        fs::write(store.weights_path("yolov8n"), b"w").unwrap();

        let descriptor = dir.path().join("calib.yaml");
        fs::write(&descriptor, "train: images/train\n").unwrap();

        // Record the data= argument, copy the YAML it points at, then produce the engine.
        let seen = dir.path().join("seen.yaml");
        let script = format!(
            "{}; for a in \"$@\"; do case \"$a\" in data=*) echo \"${{a#data=}}\" > \"{}.path\"; cp \"${{a#data=}}\" \"{}\";; esac; done",
            PRODUCE_ENGINE,
            seen.display(),
            seen.display()
        );
        let c = compiler("sh", &["-c", &script, "yolo"]);
        let (progress, _rx) = Progress::channel();

        let outcome = run(
            &store,
            &c,
            &request("yolov8n", Precision::Int8, Some(descriptor.clone())),
            &progress,
        )
        .await;

        assert!(outcome.success(), "{}", outcome.message());
        assert!(store.is_built("yolov8n", Precision::Int8));

        let copied = fs::read_to_string(&seen).unwrap();
        let base = std::path::absolute(dir.path()).unwrap();
        assert!(copied.contains(&*base.join("images/train").to_string_lossy()));

        let tmp_path = fs::read_to_string(format!("{}.path", seen.display())).unwrap();
        assert!(!Path::new(tmp_path.trim()).exists());
        assert_eq!(fs::read_to_string(&descriptor).unwrap(), "train: images/train\n");
    }
}
