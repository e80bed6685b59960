use crate::extract::{extract, ExtractedRows, RecordKind};
use crate::history::{resolve_record, JOB_TITLE_HEADERS};
use crate::llm::TitleExtractor;
use crate::output::CsvOutput;
use crate::record::load_record;
use crate::runtime::file_progress_bar;
use anyhow::Result;
use log::{debug, error, info};
use std::path::{Path, PathBuf};

const FIELD_PROGRESS_EVERY: usize = 1000;
const JOB_TITLE_PROGRESS_EVERY: usize = 10;

#[derive(Debug)]
pub struct KindSummary {
    pub kind: RecordKind,
    pub output_path: PathBuf,
    pub rows_written: usize,
}

#[derive(Debug, Default)]
pub struct FieldRunStats {
    pub files_seen: usize,
    pub records_loaded: usize,
    pub files_with_errors: Vec<PathBuf>,
    pub kinds: Vec<KindSummary>,
}

fn write_extracted(output: &mut CsvOutput, rows: &ExtractedRows) -> Result<()> {
    match rows {
        ExtractedRows::Researchers(rows) => output.write_rows(rows),
        ExtractedRows::Degrees(rows) => output.write_rows(rows),
        ExtractedRows::Education(rows) => output.write_rows(rows),
        ExtractedRows::ResearchExperience(rows) => output.write_rows(rows),
    }
}

/// Runs the selected extractors over `files`, one CSV per kind in `output_dir`.
///
/// Each file is loaded once and fed to every selected extractor.
pub fn run_field_extraction(files: &[PathBuf], output_dir: &Path, kinds: &[RecordKind]) -> Result<FieldRunStats> {
    let mut outputs: Vec<(RecordKind, CsvOutput)> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let output = CsvOutput::create(output_dir.join(kind.file_name()), kind.headers())?;
        outputs.push((*kind, output));
    }

    let progress_bar = file_progress_bar(files.len())?;
    let mut stats = FieldRunStats::default();

    for (idx, path) in files.iter().enumerate() {
        stats.files_seen += 1;
        match load_record(path) {
            Ok(Some(record)) => {
                stats.records_loaded += 1;
                for (kind, output) in outputs.iter_mut() {
                    if let Some(rows) = extract(*kind, &record) {
                        debug!("{}: {} {:?} rows", path.display(), rows.len(), kind);
                        write_extracted(output, &rows)?;
                    }
                }
            }
            Ok(None) => debug!("Skipping {}: no usable record", path.display()),
            Err(e) => {
                error!("Error processing {}: {:#}", path.display(), e);
                stats.files_with_errors.push(path.clone());
            }
        }

        progress_bar.inc(1);
        if (idx + 1) % FIELD_PROGRESS_EVERY == 0 {
            info!("Processed {} files...", idx + 1);
        }
    }
    progress_bar.finish_with_message(format!("Processing finished. {} files read.", stats.files_seen));

    for (kind, mut output) in outputs {
        output.flush()?;
        stats.kinds.push(KindSummary {
            kind,
            output_path: output.path().to_path_buf(),
            rows_written: output.rows_written(),
        });
    }

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct JobTitleRunStats {
    pub files_processed: usize,
    pub records_loaded: usize,
    pub files_with_errors: Vec<PathBuf>,
    pub history_items: usize,
    pub failed_calls: usize,
    pub rows_written: usize,
    pub verified_rows: usize,
    pub stopped_early: bool,
}

/// Resolves job titles for at most `max_files` files (`0` means all).
///
/// The cap counts every file taken from the list, including zero-byte,
/// undecodable and unreadable ones. Zero-byte files are not skipped before
/// counting, so a directory with many empty files reaches the cap with fewer
/// records resolved than a count of non-empty files alone would give.
pub fn run_job_title_resolution<E: TitleExtractor + ?Sized>(
    files: &[PathBuf],
    output_path: &Path,
    extractor: &E,
    max_files: usize,
) -> Result<JobTitleRunStats> {
    let mut output = CsvOutput::create(output_path, JOB_TITLE_HEADERS)?;
    let limit = if max_files == 0 { files.len() } else { max_files.min(files.len()) };

    let progress_bar = file_progress_bar(limit)?;
    let mut stats = JobTitleRunStats::default();

    for path in files.iter().take(limit) {
        match load_record(path) {
            Ok(Some(record)) => {
                stats.records_loaded += 1;
                let resolved = resolve_record(&record, extractor);
                stats.history_items += resolved.history_items;
                stats.failed_calls += resolved.failed_calls;
                stats.verified_rows += resolved.rows.iter().filter(|r| r.is_verified).count();
                output.write_rows(&resolved.rows)?;
                output.flush()?;
            }
            Ok(None) => debug!("Skipping {}: no usable record", path.display()),
            Err(e) => {
                error!("Error processing {}: {:#}", path.display(), e);
                stats.files_with_errors.push(path.clone());
            }
        }

        stats.files_processed += 1;
        progress_bar.inc(1);
        if stats.files_processed % JOB_TITLE_PROGRESS_EVERY == 0 {
            info!("Processed {} files...", stats.files_processed);
        }
    }
    progress_bar.finish_with_message(format!("Processing finished. {} files read.", stats.files_processed));

    if limit < files.len() {
        stats.stopped_early = true;
        info!(
            "Stopping after {} files (--max-files); {} files left unprocessed.",
            limit,
            files.len() - limit
        );
    }

    output.flush()?;
    stats.rows_written = output.rows_written();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn sample_inputs(dir: &Path) -> Vec<PathBuf> {
        vec![
            write(
                dir,
                "a.json",
                r#"{"rm:user_id": "B001", "family_name": {"en": "Sato"},
                    "degrees": [{"degree": {"en": "PhD"}}, {"degree": {"ja": "修士"}}],
                    "affiliations": [{"job": {"en": "Senior Research Fellow, Dept. of X"}}],
                    "@graph": [{"@type": "research_experience", "items": [
                        {"rm:user_id": "B001", "affiliation": {"ja": "助教"}, "from_date": "2011-04"}]}]}"#,
            ),
            write(dir, "b.json", ""),
            write(dir, "c.json", r#"{"rm:user_id": "B003", "degrees": ["#),
            write(
                dir,
                "d.json",
                r#"{"rm:user_id": "B004", "@graph": [{"@type": "education", "items": [{"rm:id": "9"}]}]}"#,
            ),
        ]
    }

    fn data_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path).unwrap().lines().skip(1).map(str::to_string).collect()
    }

    #[test]
    fn field_run_writes_one_file_per_kind() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let files = sample_inputs(input.path());

        let stats = run_field_extraction(&files, output.path(), &RecordKind::ALL).unwrap();
        assert_eq!(stats.files_seen, 4);
        assert_eq!(stats.records_loaded, 2);
        assert!(stats.files_with_errors.is_empty());

        let counts: Vec<(RecordKind, usize)> = stats.kinds.iter().map(|k| (k.kind, k.rows_written)).collect();
        assert_eq!(
            counts,
            vec![
                (RecordKind::Researchers, 2),
                (RecordKind::Degrees, 2),
                (RecordKind::Education, 1),
                (RecordKind::ResearchExperience, 1),
            ]
        );

        let degrees = data_lines(&output.path().join("jp_researchers_degrees.csv"));
        assert_eq!(degrees, vec!["B001,,PhD,,,,,", "B001,修士,,,,,,"]);

        let education = data_lines(&output.path().join("jp_researchers_education.csv"));
        assert_eq!(education, vec!["B004,9,,0,,,,,,,,,,,,,,,,"]);
    }

    #[test]
    fn field_run_honours_kind_selection() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let files = sample_inputs(input.path());

        run_field_extraction(&files, output.path(), &[RecordKind::Degrees]).unwrap();
        assert!(output.path().join("jp_researchers_degrees.csv").exists());
        assert!(!output.path().join("jp_researchers.csv").exists());
    }

    struct EchoExtractor {
        calls: Cell<usize>,
    }

    impl TitleExtractor for EchoExtractor {
        fn extract_titles(&self, raw_text: &str) -> Result<Vec<String>, LlmError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![raw_text.split(',').next().unwrap_or_default().to_string(), "Professor".to_string()])
        }
    }

    #[test]
    fn job_title_run_writes_verified_rows() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let files = sample_inputs(input.path());
        let out_path = output.path().join("standardized_job_history.csv");
        let extractor = EchoExtractor { calls: Cell::new(0) };

        let stats = run_job_title_resolution(&files, &out_path, &extractor, 0).unwrap();
        assert_eq!(stats.files_processed, 4);
        assert_eq!(stats.history_items, 2);
        assert_eq!(extractor.calls.get(), 2);
        assert_eq!(stats.rows_written, 4);
        assert_eq!(stats.verified_rows, 2);
        assert!(!stats.stopped_early);

        let lines = data_lines(&out_path);
        assert_eq!(
            lines,
            vec![
                "B001,affiliations,\"Senior Research Fellow, Dept. of X\",Senior Research Fellow,true,,",
                "B001,affiliations,\"Senior Research Fellow, Dept. of X\",Professor,false,,",
                "B001,research_experience,助教,助教,true,2011,",
                "B001,research_experience,助教,Professor,false,2011,",
            ]
        );
    }

    #[test]
    fn zero_byte_files_count_toward_the_cap() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let files = vec![
            write(input.path(), "a.json", ""),
            write(input.path(), "b.json", r#"{"rm:user_id": "B002", "affiliations": [{"job": {"ja": "教授"}}]}"#),
        ];
        let extractor = EchoExtractor { calls: Cell::new(0) };

        let stats = run_job_title_resolution(&files, &output.path().join("out.csv"), &extractor, 1).unwrap();
        assert_eq!(stats.files_processed, 1);
        assert_eq!(stats.records_loaded, 0);
        assert!(stats.stopped_early);
        assert_eq!(extractor.calls.get(), 0);
    }

    #[test]
    fn job_title_run_stops_at_the_file_cap() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let files = sample_inputs(input.path());
        let extractor = EchoExtractor { calls: Cell::new(0) };

        let stats = run_job_title_resolution(&files, &output.path().join("out.csv"), &extractor, 1).unwrap();
        assert_eq!(stats.files_processed, 1);
        assert!(stats.stopped_early);
        assert_eq!(extractor.calls.get(), 2);
    }
}
