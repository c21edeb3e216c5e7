use anyhow::Result;
use enginekit_core::Config;
use std::path::{Path, PathBuf};

pub fn execute(config_path: &Path, key: Option<&str>, value: Option<&str>) -> Result<()> {
    let mut config = Config::load_from(config_path)?;

    match (key, value) {
        (None, None) => {
            println!("Configuration file: {}\n", config_path.display());
            println!("[paths]");
            println!("  weights_dir = {:?}", config.paths.weights_dir.display().to_string());
            println!("  catalog = {:?}", config.paths.catalog.display().to_string());
            println!();
            println!("[compiler]");
            println!("  program = {:?}", config.compiler.program);
            println!("  args = {:?}", config.compiler.args);
            println!("  device = {:?}", config.compiler.device);
            println!();
            println!("[download]");
            println!("  base_url = {:?}", config.download.base_url);
            println!("  timeout_secs = {}", config.download.timeout_secs);
            println!();
            println!("[probe]");
            println!("  runtime = {:?}", config.probe.runtime);
        }

        (Some(key), None) => {
            println!("{}", get_config_value(&config, key)?);
        }

        (Some(key), Some(value)) => {
            set_config_value(&mut config, key, value)?;
            config.save_to(config_path)?;
            println!("Set {} = {}", key, value);
        }

        (None, Some(_)) => unreachable!("clap fills key before value"),
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Result<String> {
    match key {
        "paths.weights_dir" => Ok(config.paths.weights_dir.display().to_string()),
        "paths.catalog" => Ok(config.paths.catalog.display().to_string()),
        "compiler.program" => Ok(config.compiler.program.clone()),
        "compiler.args" => Ok(config.compiler.args.join(" ")),
        "compiler.device" => Ok(config.compiler.device.clone()),
        "download.base_url" => Ok(config.download.base_url.clone()),
        "download.timeout_secs" => Ok(config.download.timeout_secs.to_string()),
        "probe.runtime" => Ok(config.probe.runtime.join(" ")),
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
}

/// List-valued keys take whitespace-separated words.
fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "paths.weights_dir" => config.paths.weights_dir = PathBuf::from(value),
        "paths.catalog" => config.paths.catalog = PathBuf::from(value),
        "compiler.program" => config.compiler.program = value.to_string(),
        "compiler.args" => config.compiler.args = words(value),
        "compiler.device" => config.compiler.device = value.to_string(),
        "download.base_url" => {
            config.download.base_url = value.trim_end_matches('/').to_string()
        }
        "download.timeout_secs" => config.download.timeout_secs = value.parse()?,
        "probe.runtime" => {
            let runtime = words(value);
            if runtime.is_empty() {
                anyhow::bail!("probe.runtime needs at least a program name");
            }
            config.probe.runtime = runtime;
        }
        _ => anyhow::bail!("Unknown config key: {}", key),
    }
    Ok(())
}

fn words(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips_through_keys() {
        let mut config = Config::default();
        set_config_value(&mut config, "compiler.device", "cuda:1").unwrap();
        set_config_value(&mut config, "compiler.args", "export  simplify=True").unwrap();
        set_config_value(&mut config, "download.base_url", "http://mirror/assets/").unwrap();

        assert_eq!(get_config_value(&config, "compiler.device").unwrap(), "cuda:1");
        assert_eq!(config.compiler.args, vec!["export", "simplify=True"]);
        assert_eq!(config.download.base_url, "http://mirror/assets");
    }

    #[test]
    fn bad_values_and_keys_are_rejected() {
        let mut config = Config::default();
        assert!(set_config_value(&mut config, "download.timeout_secs", "soon").is_err());
        assert!(set_config_value(&mut config, "probe.runtime", "   ").is_err());
        assert!(set_config_value(&mut config, "daemon.port", "1").is_err());
        assert!(get_config_value(&config, "inference.top_p").is_err());
    }

    #[test]
    fn setting_a_key_persists_to_the_given_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        execute(&path, Some("paths.catalog"), Some("/data/models.json")).unwrap();

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.paths.catalog, PathBuf::from("/data/models.json"));
    }
}
