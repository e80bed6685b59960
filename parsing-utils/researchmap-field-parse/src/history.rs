//! Job-history strings, LLM title candidates, and the substring check that
//! keeps only titles actually present in the source text.

use crate::llm::TitleExtractor;
use crate::record::{field, graph_items, graphs_of_type, nested_field};
use log::warn;
use serde::Serialize;
use serde_json::Value;

pub const JOB_TITLE_HEADERS: &[&str] = &[
    "user_id", "source", "raw_text", "extracted_title", "is_verified", "start_year", "end_year",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    Affiliations,
    ResearchExperience,
}

/// One free-text job description pulled from a record.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    pub source: HistorySource,
    pub raw_text: String,
    pub start_year: String,
    pub end_year: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobTitleRow {
    pub user_id: String,
    pub source: HistorySource,
    pub raw_text: String,
    pub extracted_title: String,
    pub is_verified: bool,
    pub start_year: String,
    pub end_year: String,
}

/// `ja` when non-empty, else `en`, trimmed.
fn localized_text(node: &Value, key: &str) -> String {
    let ja = nested_field(node, key, "ja");
    let text = if ja.is_empty() { nested_field(node, key, "en") } else { ja };
    text.trim().to_string()
}

/// First four characters of a `YYYY-MM`-style date; empty when absent.
pub fn year_of(date: &str) -> String {
    date.chars().take(4).collect()
}

/// Job strings from `affiliations[].job` and every `research_experience`
/// item's `affiliation`, skipping items with no usable text.
pub fn extract_raw_history(record: &Value) -> Vec<HistoryItem> {
    let mut history = Vec::new();

    let affiliations = record.get("affiliations").and_then(Value::as_array).into_iter().flatten();
    for affiliation in affiliations {
        let raw_text = localized_text(affiliation, "job");
        if !raw_text.is_empty() {
            history.push(HistoryItem {
                source: HistorySource::Affiliations,
                raw_text,
                start_year: String::new(),
                end_year: String::new(),
            });
        }
    }

    for graph in graphs_of_type(record, "research_experience") {
        for item in graph_items(graph) {
            let raw_text = localized_text(item, "affiliation");
            if !raw_text.is_empty() {
                history.push(HistoryItem {
                    source: HistorySource::ResearchExperience,
                    raw_text,
                    start_year: year_of(&field(item, "from_date")),
                    end_year: year_of(&field(item, "to_date")),
                });
            }
        }
    }

    history
}

/// True only when `candidate` is a non-empty literal substring of `raw_text`.
pub fn verify_extraction(raw_text: &str, candidate: &str) -> bool {
    !candidate.is_empty() && raw_text.contains(candidate)
}

/// Outcome of resolving one record.
#[derive(Debug, Default)]
pub struct ResolvedRecord {
    pub rows: Vec<JobTitleRow>,
    pub history_items: usize,
    pub failed_calls: usize,
}

/// Sends each history item to `extractor` and emits one row per candidate.
///
/// A failed call is logged and counts as no candidates.
pub fn resolve_record<E: TitleExtractor + ?Sized>(record: &Value, extractor: &E) -> ResolvedRecord {
    let user_id = field(record, "rm:user_id");
    let mut resolved = ResolvedRecord::default();

    for item in extract_raw_history(record) {
        resolved.history_items += 1;
        let titles = match extractor.extract_titles(&item.raw_text) {
            Ok(titles) => titles,
            Err(e) => {
                let preview: String = item.raw_text.chars().take(30).collect();
                warn!("LLM call failed for text: {}... Error: {}", preview, e);
                resolved.failed_calls += 1;
                Vec::new()
            }
        };

        for title in titles {
            resolved.rows.push(JobTitleRow {
                user_id: user_id.clone(),
                source: item.source,
                raw_text: item.raw_text.clone(),
                is_verified: verify_extraction(&item.raw_text, &title),
                extracted_title: title,
                start_year: item.start_year.clone(),
                end_year: item.end_year.clone(),
            });
        }
    }

    resolved
}
