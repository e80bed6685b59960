use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use researchmap_field_parse::config::{load_service_config, PromptTemplate};
use researchmap_field_parse::llm::{ChatCompletionsClient, DEFAULT_MODEL};
use researchmap_field_parse::pipeline::{run_job_title_resolution, JobTitleRunStats};
use researchmap_field_parse::record::find_json_files;
use researchmap_field_parse::runtime::{format_elapsed, setup_logging};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "researchmap Job Title Resolver")]
#[command(about = "Extract job titles from researchmap job history text with an LLM and keep only titles found verbatim in the source. The is_verified column is written as lowercase true/false.")]
#[command(version = "0.1.0")]
struct Cli {
    #[arg(short, long, default_value = "static/sample", help = "Directory containing one JSON file per researcher")]
    input: PathBuf,

    #[arg(short, long, default_value = "static/sampleresolver/standardized_job_history.csv", help = "Output CSV file")]
    output: PathBuf,

    #[arg(short, long, default_value = "env.toml", help = "Config file with base_url and api_key")]
    config: PathBuf,

    #[arg(short, long, default_value = "static/prompt/extract_job_title.txt", help = "Prompt template containing $job_title$")]
    prompt: PathBuf,

    #[arg(long, default_value = "20", help = "Maximum number of input files to take from the sorted list, empty files included (0 for no limit)")]
    max_files: usize,

    #[arg(short, long, help = "Model name (overrides the config file)")]
    model: Option<String>,

    #[arg(long, default_value = "120", help = "HTTP request timeout in seconds")]
    timeout_secs: u64,

    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
}

fn print_final_summary(start_time: Instant, stats: &JobTitleRunStats, cli: &Cli) {
    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Files processed: {}", stats.files_processed);
    info!("Records loaded: {}", stats.records_loaded);
    info!("Job history items sent to the LLM: {}", stats.history_items);
    if stats.failed_calls > 0 {
        warn!("LLM calls that failed (treated as no titles): {}", stats.failed_calls);
    }
    if !stats.files_with_errors.is_empty() {
        warn!("Files with processing errors: {}", stats.files_with_errors.len());
        for err_file in stats.files_with_errors.iter().take(10) {
            warn!("  - {}", err_file.display());
        }
    }
    info!(
        "Wrote {} candidate titles ({} verified) to {}",
        stats.rows_written,
        stats.verified_rows,
        cli.output.display()
    );
    if stats.stopped_early {
        info!("Run was capped at {} files; raise --max-files to process more.", cli.max_files);
    }
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    setup_logging(&cli.log_level)?;
    info!("Starting job title resolution");

    let service = load_service_config(&cli.config)?;
    let prompt = PromptTemplate::load(&cli.prompt)?;
    let model = cli
        .model
        .clone()
        .or_else(|| service.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    info!("Using model {} at {}", model, service.base_url);

    let extractor = ChatCompletionsClient::new(&service, &model, prompt, Duration::from_secs(cli.timeout_secs))
        .context("Failed to build HTTP client")?;

    let files = find_json_files(&cli.input)?;
    info!("Found {} files. Processing...", files.len());
    if files.is_empty() {
        warn!("No .json files found in {}. Exiting.", cli.input.display());
        return Ok(());
    }
    if cli.max_files > 0 {
        info!("Processing at most {} files (--max-files).", cli.max_files);
    }

    let stats = run_job_title_resolution(&files, &cli.output, &extractor, cli.max_files)?;

    print_final_summary(start_time, &stats, &cli);
    info!("Job title resolution finished.");
    info!("-------------------------------------------------------");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn help_names_the_verified_column_format() {
        let about = Cli::command().get_about().map(|a| a.to_string()).unwrap_or_default();
        assert!(about.contains("is_verified column is written as lowercase true/false"));
    }

    #[test]
    fn defaults_match_the_sample_layout() {
        let cli = Cli::parse_from(["job-title-resolve"]);
        assert_eq!(cli.max_files, 20);
        assert_eq!(cli.config, PathBuf::from("env.toml"));
        assert_eq!(cli.timeout_secs, 120);
    }
}
