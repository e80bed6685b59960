use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use log::info;
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// A CSV file with a fixed header, written once at creation.
///
/// Rows are serialized positionally, so the row type's field order must match
/// the header it was created with.
pub struct CsvOutput {
    writer: Writer<File>,
    file_path: PathBuf,
    rows_written: usize,
}

impl CsvOutput {
    pub fn create<P: AsRef<Path>>(path: P, headers: &[&str]) -> Result<Self> {
        let file_path = path.as_ref().to_path_buf();
        info!("Initializing output file: {}", file_path.display());
        if let Some(parent) = file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory structure for: {}", file_path.display()))?;
            }
        }

        let file = File::create(&file_path)
            .with_context(|| format!("Failed to create output file: {}", file_path.display()))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(headers)
            .with_context(|| format!("Failed to write header to {}", file_path.display()))?;
        writer.flush()
            .with_context(|| format!("Failed to flush header to {}", file_path.display()))?;

        Ok(Self {
            writer,
            file_path,
            rows_written: 0,
        })
    }

    pub fn write_row<R: Serialize>(&mut self, row: &R) -> Result<()> {
        self.writer.serialize(row)
            .with_context(|| format!("Failed to write row to {}", self.file_path.display()))?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn write_rows<R: Serialize>(&mut self, rows: &[R]) -> Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        info!("Flushing final data to: {}", self.file_path.display());
        self.writer.flush()
            .with_context(|| format!("Failed to flush output file: {}", self.file_path.display()))?;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}
