use crate::table::{TransitionRow, STAGES};
use csv::WriterBuilder;
use lazy_static::lazy_static;
use log::info;
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

pub const GENDER_COUNTS_FILE: &str = "overall_gender_counts.csv";
pub const STAGE_SUMMARY_FILE: &str = "stage_summary_counts_and_stats.csv";
pub const SUMMARY_JSON_FILE: &str = "summary.json";
pub const RUN_INFO_FILE: &str = "run_info.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gender {
    Male,
    Female,
}

lazy_static! {
    static ref GENDER_MAP: HashMap<&'static str, Gender> = {
        let mut map = HashMap::new();
        map.insert("M", Gender::Male);
        map.insert("Male", Gender::Male);
        map.insert("F", Gender::Female);
        map.insert("Female", Gender::Female);
        map
    };
}

/// Exact-match lookup; anything outside the table is unmapped.
pub fn standardize_gender(raw: &str) -> Option<Gender> {
    GENDER_MAP.get(raw).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subset {
    Observed,
    NonNegative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Mean,
    Median,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenderCount {
    pub gender: Option<Gender>,
    pub count: usize,
}

/// A count row (`n` set) or a statistic row (`metric`/`value` set).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub stage: &'static str,
    pub subset: Subset,
    pub gender: Option<Gender>,
    pub n: Option<usize>,
    pub metric: Option<Metric>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageSummary {
    pub total_records: usize,
    pub gender_counts: Vec<GenderCount>,
    pub rows: Vec<SummaryRow>,
}

#[derive(Serialize)]
struct SummaryJson<'a> {
    total_records: usize,
    gender_counts: &'a [GenderCount],
    stage_counts: Vec<&'a SummaryRow>,
    stage_stats: Vec<&'a SummaryRow>,
}

/// Counts per gender, largest first; ties keep first-appearance order.
pub fn value_counts<I: IntoIterator<Item = Option<Gender>>>(genders: I) -> Vec<GenderCount> {
    let mut counts: Vec<GenderCount> = Vec::new();
    for gender in genders {
        match counts.iter_mut().find(|c| c.gender == gender) {
            Some(entry) => entry.count += 1,
            None => counts.push(GenderCount { gender, count: 1 }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn count_rows(stage: &'static str, subset: Subset, genders: Vec<Option<Gender>>) -> Vec<SummaryRow> {
    value_counts(genders)
        .into_iter()
        .map(|c| SummaryRow {
            stage,
            subset,
            gender: c.gender,
            n: Some(c.count),
            metric: None,
            value: None,
        })
        .collect()
}

pub fn summarize(rows: &[TransitionRow]) -> StageSummary {
    let gender_counts = value_counts(rows.iter().map(|r| r.gender));
    let mut summary_rows = Vec::new();

    for (stage_pos, stage) in STAGES.iter().enumerate() {
        let observed: Vec<(Option<Gender>, f64)> = rows
            .iter()
            .filter_map(|r| r.durations.get(stage_pos).copied().flatten().map(|d| (r.gender, d)))
            .collect();
        let non_negative: Vec<(Option<Gender>, f64)> = observed.iter().copied().filter(|(_, d)| *d >= 0.0).collect();

        summary_rows.extend(count_rows(stage.name, Subset::Observed, observed.iter().map(|(g, _)| *g).collect()));
        summary_rows.extend(count_rows(stage.name, Subset::NonNegative, non_negative.iter().map(|(g, _)| *g).collect()));

        for gender in [Gender::Female, Gender::Male] {
            let durations: Vec<f64> = non_negative
                .iter()
                .filter(|(g, _)| *g == Some(gender))
                .map(|(_, d)| *d)
                .collect();
            for (metric, value) in [(Metric::Mean, mean(&durations)), (Metric::Median, median(&durations))] {
                if let Some(value) = value {
                    summary_rows.push(SummaryRow {
                        stage: stage.name,
                        subset: Subset::NonNegative,
                        gender: Some(gender),
                        n: None,
                        metric: Some(metric),
                        value: Some(value),
                    });
                }
            }
        }
    }

    StageSummary {
        total_records: rows.len(),
        gender_counts,
        rows: summary_rows,
    }
}

fn write_csv<R: Serialize>(path: &Path, rows: &[R], headers: &[&str]) -> Result<(), Box<dyn Error>> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
    wtr.write_record(headers)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the gender counts, the stage table and `summary.json` into `output_dir`.
pub fn write_outputs(summary: &StageSummary, output_dir: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    fs::create_dir_all(output_dir)?;

    let counts_path = output_dir.join(GENDER_COUNTS_FILE);
    write_csv(&counts_path, &summary.gender_counts, &["gender", "count"])?;

    let stage_path = output_dir.join(STAGE_SUMMARY_FILE);
    write_csv(&stage_path, &summary.rows, &["stage", "subset", "gender", "n", "metric", "value"])?;

    let json = SummaryJson {
        total_records: summary.total_records,
        gender_counts: &summary.gender_counts,
        stage_counts: summary.rows.iter().filter(|r| r.metric.is_none()).collect(),
        stage_stats: summary.rows.iter().filter(|r| r.metric.is_some()).collect(),
    };
    let json_path = output_dir.join(SUMMARY_JSON_FILE);
    fs::write(&json_path, serde_json::to_string_pretty(&json)?)?;

    for path in [&counts_path, &stage_path, &json_path] {
        info!("Wrote {}", path.display());
    }
    Ok(vec![counts_path, stage_path, json_path])
}

pub fn write_run_info(log_dir: &Path, input: &Path, rows: usize) -> Result<PathBuf, Box<dyn Error>> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(RUN_INFO_FILE);
    fs::write(&path, format!("Input: {}\nRows: {}\n", input.display(), rows))?;
    Ok(path)
}
