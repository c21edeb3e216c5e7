use anyhow::Result;
use enginekit_core::{Config, WeightStore};

pub fn execute(config: &Config) -> Result<()> {
    let store = WeightStore::new(config.weights_dir());
    println!("{}", store.ensure_dir()?.display());
    Ok(())
}
