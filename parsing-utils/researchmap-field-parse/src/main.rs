use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use researchmap_field_parse::extract::KindSelection;
use researchmap_field_parse::pipeline::{run_field_extraction, FieldRunStats};
use researchmap_field_parse::record::find_json_files;
use researchmap_field_parse::runtime::{format_elapsed, setup_logging};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "researchmap Profile Field Parser")]
#[command(about = "Extract researcher, degree, education and research experience rows from researchmap JSON profile records")]
#[command(version = "0.1.0")]
struct Cli {
    #[arg(short, long, default_value = "static/sample", help = "Directory containing one JSON file per researcher")]
    input: PathBuf,

    #[arg(short, long, default_value = "static/sampleresolver", help = "Directory for the output CSV files")]
    output_dir: PathBuf,

    #[arg(short, long, value_enum, default_value_t = KindSelection::All, help = "Record type to extract")]
    kind: KindSelection,

    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
}

fn print_final_summary(start_time: Instant, stats: &FieldRunStats) {
    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Input files found: {}", stats.files_seen);
    info!("Records loaded: {}", stats.records_loaded);
    if !stats.files_with_errors.is_empty() {
        warn!("Files with processing errors: {}", stats.files_with_errors.len());
        for err_file in stats.files_with_errors.iter().take(10) {
            warn!("  - {}", err_file.display());
        }
        if stats.files_with_errors.len() > 10 {
            warn!("  ... (and {} more)", stats.files_with_errors.len() - 10);
        }
    }
    for summary in &stats.kinds {
        info!(
            "Extracted {} {:?} records to {}",
            summary.rows_written,
            summary.kind,
            summary.output_path.display()
        );
    }
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    setup_logging(&cli.log_level)?;
    info!("Starting researchmap field extraction");

    let files = find_json_files(&cli.input)?;
    info!("Found {} JSON files.", files.len());
    if files.is_empty() {
        warn!("No .json files found in {}. Exiting.", cli.input.display());
        return Ok(());
    }

    let kinds = cli.kind.kinds();
    let stats = run_field_extraction(&files, &cli.output_dir, &kinds)?;

    print_final_summary(start_time, &stats);
    info!("Extraction process finished.");
    info!("-------------------------------------------------------");

    Ok(())
}
