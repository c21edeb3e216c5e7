//! GPU and compiler-runtime availability checks.

use std::fmt;
use std::process::{Command, Stdio};

use crate::config::ProbeConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct GpuInfo {
    pub name: String,
    pub vram_mb: u64,
}

impl fmt::Display for GpuInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1} GB)", self.name, self.vram_mb as f64 / 1024.0)
    }
}

/// Result of both probes, taken once and consulted read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capabilities {
    pub gpu: Option<GpuInfo>,
    pub compiler_runtime: bool,
}

impl Capabilities {
    pub fn detect(probe: &ProbeConfig) -> Self {
        let caps = Self {
            gpu: detect_gpu(),
            compiler_runtime: runtime_installed(&probe.runtime),
        };
        tracing::info!(
            "GPU: {}, compiler runtime: {}",
            caps.gpu
                .as_ref()
                .map(|g| g.to_string())
                .unwrap_or_else(|| "none".to_string()),
            if caps.compiler_runtime { "installed" } else { "missing" }
        );
        caps
    }

    pub fn gpu_available(&self) -> bool {
        self.gpu.is_some()
    }

    /// Both prerequisites for any engine build.
    pub fn can_compile(&self) -> bool {
        self.gpu_available() && self.compiler_runtime
    }
}

pub fn detect_gpu() -> Option<GpuInfo> {
    // Use nvidia-smi to get GPU info
    let output = Command::new("nvidia-smi")
        .args([
            "--query-gpu=name,memory.total",
            "--format=csv,noheader,nounits",
        ])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
}

fn parse_nvidia_smi(output: &str) -> Option<GpuInfo> {
    let line = output.lines().next()?;
    let parts: Vec<&str> = line.split(", ").collect();

    if parts.len() < 2 {
        return None;
    }

    let name = parts[0].trim().to_string();
    let vram_mb: u64 = parts[1].trim().parse().ok()?;

    Some(GpuInfo { name, vram_mb })
}

/// Runs the configured probe command; exit status 0 means installed.
pub fn runtime_installed(command: &[String]) -> bool {
    let Some((program, args)) = command.split_first() else {
        return false;
    };

    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
