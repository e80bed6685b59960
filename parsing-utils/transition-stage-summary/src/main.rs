mod summary;
mod table;

use clap::Parser;
use log::{info, warn};
use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

/// Command-line arguments parsed by Clap.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Summarize career-transition durations (doctorate to associate professor, associate to full professor) by gender from a workbook sheet or CSV export. The n column of stage_summary_counts_and_stats.csv holds integer counts (3, not 3.0).")]
struct Cli {
    /// Workbook (.xlsx/.xls/.ods) or CSV file with gender, doctor_to_ap and ap_to_fp columns.
    #[arg(short = 'i', long, default_value = "data_input/transitional.xlsx")]
    input: PathBuf,

    /// Sheet to read from a workbook. Ignored for CSV input.
    #[arg(short = 's', long, default_value = "dr-ap-fp")]
    sheet: String,

    /// Directory for the summary tables and summary.json.
    #[arg(short = 'o', long, default_value = "03_results/tables")]
    output_dir: PathBuf,

    /// Directory for run_info.txt. A leading `~` expands to $HOME.
    #[arg(long, default_value = "04_logs")]
    log_dir: String,
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), env::var_os("HOME")) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            PathBuf::from(home).join(rest.trim_start_matches('/'))
        }
        _ => PathBuf::from(path),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let start_time = Instant::now();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("Starting transition stage summary for: {}", cli.input.display());

    let rows = table::load_rows(&cli.input, &cli.sheet)?;
    info!("Loaded {} rows.", rows.len());
    if rows.is_empty() {
        warn!("Input has a header but no data rows; outputs will contain headers only.");
    }

    let summary = summary::summarize(&rows);
    for count in &summary.gender_counts {
        let label = count.gender.map_or("(unmapped)".to_string(), |g| format!("{:?}", g));
        info!("  {}: {}", label, count.count);
    }

    summary::write_outputs(&summary, &cli.output_dir)?;
    let run_info = summary::write_run_info(&expand_home(&cli.log_dir), &cli.input, rows.len())?;
    info!("Wrote {}", run_info.display());

    info!("Total time elapsed: {:.2?}", start_time.elapsed());
    Ok(())
}
