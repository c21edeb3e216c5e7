//! Remove leftovers of interrupted downloads

use anyhow::Result;
use enginekit_core::downloaders::release::format_size;
use enginekit_core::{Config, WeightStore};

pub fn execute(config: &Config) -> Result<()> {
    let store = WeightStore::new(config.weights_dir());

    println!("Scanning {} for partial downloads...", store.weights_dir().display());

    let mut cleaned_bytes: u64 = 0;
    let mut cleaned_files: u32 = 0;

    for path in store.partial_downloads() {
        let size = path.metadata().map(|m| m.len()).unwrap_or(0);
        println!("  Partial download: {} ({})", path.display(), format_size(size));

        match std::fs::remove_file(&path) {
            Ok(()) => {
                println!("    Removed");
                cleaned_bytes += size;
                cleaned_files += 1;
            }
            Err(e) => eprintln!("    Failed to remove: {}", e),
        }
    }

    if cleaned_files == 0 {
        println!("Nothing to clean.");
    } else {
        println!();
        println!(
            "Cleaned {} files, freed {}",
            cleaned_files,
            format_size(cleaned_bytes)
        );
    }

    Ok(())
}
