use crate::summary::{standardize_gender, Gender};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::error::Error;
use std::fs::File;
use std::path::Path;

/// A career-transition interval and the column holding its duration in years.
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub name: &'static str,
    pub column: &'static str,
}

pub const STAGES: [StageSpec; 2] = [
    StageSpec { name: "stage1", column: "doctor_to_ap" },
    StageSpec { name: "stage2", column: "ap_to_fp" },
];

pub const GENDER_COLUMN: &str = "gender";

/// One researcher's row: standardized gender plus one duration per entry of [`STAGES`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRow {
    pub gender: Option<Gender>,
    pub durations: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Cell::Empty
        } else if let Ok(n) = raw.trim().parse::<f64>() {
            Cell::Number(n)
        } else {
            Cell::Text(raw.to_string())
        }
    }

    fn from_data(data: &Data) -> Self {
        match data {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) if s.trim().is_empty() => Cell::Empty,
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Text(b.to_string()),
            _ => Cell::Empty,
        }
    }

    fn header_name(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.trim().to_string(),
        }
    }

    fn as_duration(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if !n.is_nan() => Some(*n),
            _ => None,
        }
    }

    fn as_gender(&self) -> Option<Gender> {
        match self {
            Cell::Text(s) => standardize_gender(s),
            _ => None,
        }
    }
}

/// Loads a workbook sheet, or a CSV file when the extension is `.csv`.
pub fn load_rows(path: &Path, sheet: &str) -> Result<Vec<TransitionRow>, Box<dyn Error>> {
    let is_csv = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

    let grid = if is_csv {
        read_csv_grid(path)?
    } else {
        read_sheet_grid(path, sheet)?
    };
    rows_from_grid(grid)
}

fn read_sheet_grid(path: &Path, sheet: &str) -> Result<Vec<Vec<Cell>>, Box<dyn Error>> {
    info!("Reading sheet '{}' from {}", sheet, path.display());
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| format!("Failed to open workbook {}: {}", path.display(), e))?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| format!("Failed to read sheet '{}' from {}: {}", sheet, path.display(), e))?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(Cell::from_data).collect())
        .collect())
}

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<Cell>>, Box<dyn Error>> {
    info!("Reading CSV {}", path.display());
    let file = File::open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    let file_size = file.metadata()?.len();

    let pb_read = ProgressBar::new(file_size);
    pb_read.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Reading [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(pb_read.wrap_read(file));
    let mut grid = Vec::new();
    for record in rdr.records() {
        let record = record?;
        grid.push(record.iter().map(Cell::from_text).collect());
    }
    pb_read.finish_with_message("Reading complete.");
    Ok(grid)
}

fn column_index(header: &[String], name: &str) -> Result<usize, Box<dyn Error>> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| format!("Required column '{}' not found in header {:?}", name, header).into())
}

/// First row is the header; fully empty rows are dropped.
fn rows_from_grid(grid: Vec<Vec<Cell>>) -> Result<Vec<TransitionRow>, Box<dyn Error>> {
    let mut rows = grid.into_iter();
    let header: Vec<String> = rows
        .next()
        .ok_or("Input has no header row")?
        .iter()
        .map(Cell::header_name)
        .collect();

    let gender_idx = column_index(&header, GENDER_COLUMN)?;
    let stage_idx = STAGES
        .iter()
        .map(|stage| column_index(&header, stage.column))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows
        .filter(|cells| cells.iter().any(|c| *c != Cell::Empty))
        .map(|cells| TransitionRow {
            gender: cell_at(&cells, gender_idx).as_gender(),
            durations: stage_idx.iter().map(|&idx| cell_at(&cells, idx).as_duration()).collect(),
        })
        .collect())
}

static EMPTY_CELL: Cell = Cell::Empty;

fn cell_at(cells: &[Cell], idx: usize) -> &Cell {
    cells.get(idx).unwrap_or(&EMPTY_CELL)
}
