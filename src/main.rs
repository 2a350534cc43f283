/// Megascans descriptor to Source engine asset converter entry point
mod compiler;
mod config;
mod constants;
mod converter;
mod descriptor;
mod lod_selection;
mod material;
mod mesh_import;
mod qc_writer;
mod smd_writer;

use compiler::StudiomdlCompiler;
use config::RunConfig;
use converter::MegascansConverter;
use material::PassthroughBaker;
use mesh_import::ObjImporter;
use std::env;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <descriptor root directory>", args[0]);
        std::process::exit(1);
    }
    let root_dir = Path::new(&args[1]);

    let config = match RunConfig::load(Path::new("config.json")) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config.json: {err}");
            std::process::exit(1);
        }
    };

    println!("--- Initializing Converter ---");
    println!("Using root directory: {}", root_dir.display());

    let studiomdl = StudiomdlCompiler::new(&config.bin_path);
    let mut converter = MegascansConverter::new(
        config,
        Box::new(ObjImporter),
        Box::new(PassthroughBaker),
        Box::new(studiomdl),
    );

    let assets = converter.discover_assets(root_dir);
    if assets.is_empty() {
        println!("No Quixel assets found!");
        std::process::exit(1);
    }

    println!("--- Beginning Processing ---");
    println!(
        "\nConverting {} asset{}...",
        assets.len(),
        if assets.len() > 1 { "s" } else { "" }
    );

    let summary = converter.run(&assets)?;
    println!(
        "\nProcess completed! ({} succeeded, {} failed)",
        summary.succeeded, summary.failed
    );

    Ok(())
}
