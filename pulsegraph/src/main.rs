use std::env;
use std::error::Error;
use std::fs;

use pulsegraph::run_pipeline_from_json;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err("Please provide the path to a pipeline JSON file.".into());
    }

    let file_path = &args[1];
    let json_str = fs::read_to_string(file_path)?;
    let (dataflow, summary) = run_pipeline_from_json(&json_str)?;

    println!(
        "Tick {}: {} nodes ran, {} skipped",
        summary.clock, summary.ran, summary.skipped
    );
    println!("Live records: {}", dataflow.arena().len());

    Ok(())
}
