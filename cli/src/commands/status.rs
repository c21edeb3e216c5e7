use anyhow::Result;
use enginekit_core::{Capabilities, Config, WeightStore};

pub fn execute(config: &Config) -> Result<()> {
    println!("enginekit status\n");

    let caps = Capabilities::detect(&config.probe);
    match &caps.gpu {
        Some(gpu) => println!("GPU: {}", gpu),
        None => println!("GPU: not available"),
    }
    println!(
        "TensorRT: {}",
        if caps.compiler_runtime {
            "installed"
        } else {
            "not installed"
        }
    );
    println!("Compiler: {} (device {})", config.compiler.program, config.compiler.device);

    let store = WeightStore::new(config.weights_dir());
    println!("\nWeights directory: {}", store.weights_dir().display());

    let weights = store.cached_weights()?;
    println!("Downloaded weights: {}", weights.len());
    for name in &weights {
        println!("  {}", name);
    }

    let partial = store.partial_downloads().len();
    if partial > 0 {
        println!("\n{} partial download(s) found. Run `enginekit gc` to remove them.", partial);
    }

    if !caps.can_compile() {
        println!("\nEngine builds need an NVIDIA GPU and an installed TensorRT.");
    }

    Ok(())
}
