// This file is an example runner for the `dot_vision` library. The main
// library entry point is `src/lib.rs`.

use std::env;
use std::path::PathBuf;

use dot_vision::{AnalysisPipeline, PipelineConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: dot_vision <input_image_path> [output_dir]");
        return Ok(());
    }
    let input_path = PathBuf::from(&args[1]);
    let output_dir = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("uploads"));

    // --- 2. Pipeline Initialization ---
    // No segmentation capability is attached here; wire in a MaskGenerator
    // implementation backed by your model runtime (and attach it with
    // `attach_capability`) to get real measurements instead of the
    // placeholder result.
    let config = PipelineConfig {
        output_dir,
        ..PipelineConfig::default()
    };
    let pipeline = AnalysisPipeline::new(config);
    println!(
        "Capability status: {}",
        serde_json::to_string(&pipeline.capability_status())?
    );

    // --- 3. Analysis & Reporting ---
    match pipeline.analyze(&input_path) {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        Err(err) => {
            let record = serde_json::json!({
                "error": err.kind(),
                "details": err.details(),
            });
            eprintln!("{record}");
            std::process::exit(1);
        }
    }

    Ok(())
}
