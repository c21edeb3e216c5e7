use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Filesystem locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// External engine compiler
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Weights download source
    #[serde(default)]
    pub download: DownloadConfig,

    /// Capability probes
    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where weights and engines live (default: ~/.config/enginekit/weights/)
    #[serde(default = "default_weights_dir")]
    pub weights_dir: PathBuf,

    /// Model catalog, relative to the working directory unless absolute
    #[serde(default = "default_catalog")]
    pub catalog: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Compiler executable
    #[serde(default = "default_compiler_program")]
    pub program: String,

    /// Arguments placed before the generated `key=value` arguments
    #[serde(default = "default_compiler_args")]
    pub args: Vec<String>,

    /// Target device passed as `device=`
    #[serde(default = "default_device")]
    pub device: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Release-asset base URL; weights are fetched from `<base_url>/<model>.pt`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Command whose success means the compiler runtime is importable
    #[serde(default = "default_runtime_probe")]
    pub runtime: Vec<String>,
}

fn default_weights_dir() -> PathBuf {
    Config::base_dir()
        .map(|p| p.join("weights"))
        .unwrap_or_else(|_| PathBuf::from("weights"))
}

fn default_catalog() -> PathBuf {
    PathBuf::from("models.json")
}

fn default_compiler_program() -> String {
    "yolo".to_string()
}

fn default_compiler_args() -> Vec<String> {
    vec!["export".to_string()]
}

fn default_device() -> String {
    "cuda:0".to_string()
}

fn default_base_url() -> String {
    "https://github.com/ultralytics/assets/releases/download/v8.3.0".to_string()
}

fn default_timeout_secs() -> u64 {
    3600
}

fn default_runtime_probe() -> Vec<String> {
    vec![
        "python3".to_string(),
        "-c".to_string(),
        "import tensorrt".to_string(),
    ]
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            weights_dir: default_weights_dir(),
            catalog: default_catalog(),
        }
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: default_compiler_program(),
            args: default_compiler_args(),
            device: default_device(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            runtime: default_runtime_probe(),
        }
    }
}

impl Config {
    /// Get the base directory: ~/.config/enginekit/
    pub fn base_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(".config").join("enginekit"))
    }

    /// Load config from default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from an explicit file, falling back to defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save config to default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the config file path: ~/.config/enginekit/config.toml
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("config.toml"))
    }

    /// Get the logs directory: ~/.config/enginekit/logs/
    pub fn logs_dir() -> Result<PathBuf> {
        Ok(Self::base_dir()?.join("logs"))
    }

    pub fn weights_dir(&self) -> PathBuf {
        self.paths.weights_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[compiler]\ndevice = \"cuda:1\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.compiler.device, "cuda:1");
        assert_eq!(config.compiler.program, "yolo");
        assert_eq!(config.compiler.args, vec!["export"]);
        assert_eq!(config.paths.catalog, PathBuf::from("models.json"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.download.timeout_secs, 3600);
    }

    #[test]
    fn save_then_load_preserves_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.paths.weights_dir = dir.path().join("w");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.paths.weights_dir, dir.path().join("w"));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[paths\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
