//! Input batch reader
//!
//! Reads a repository export (the `Detail` sheet of an `.xlsx` workbook)
//! or a CSV/TSV file into typed [`Record`]s. The layout is detected from
//! the width of the first row; rows whose first cell is `Item` are header
//! rows and are skipped wherever they appear.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use calamine::{Data, Reader, Xlsx};

use crate::record::{InputLayout, Record};

const HEADER_CELL: &str = "Item";

/// Worksheet holding the records in a repository export workbook.
pub const DETAIL_SHEET: &str = "Detail";

/// Records of one input file, in input order.
#[derive(Debug, Clone)]
pub struct Batch {
    pub layout: InputLayout,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Error reading an input batch
#[derive(Debug)]
pub enum InputError {
    Io(io::Error),
    Csv(csv::Error),
    Xlsx(calamine::XlsxError),
    /// Workbook has no `Detail` sheet
    MissingSheet { available: Vec<String> },
    /// File has no rows at all
    Empty,
    /// First row width matches no known layout
    UnknownLayout { columns: usize },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Csv(e) => write!(f, "malformed input: {e}"),
            Self::Xlsx(e) => write!(f, "unreadable workbook: {e}"),
            Self::MissingSheet { available } => write!(
                f,
                "workbook has no '{DETAIL_SHEET}' sheet (found: {})",
                available.join(", ")
            ),
            Self::Empty => write!(f, "input file is empty"),
            Self::UnknownLayout { columns } => write!(
                f,
                "unrecognized input layout: {columns} columns (expected 9, 8 or 2)"
            ),
        }
    }
}

impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Csv(e) => Some(e),
            Self::Xlsx(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for InputError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<csv::Error> for InputError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<calamine::XlsxError> for InputError {
    fn from(e: calamine::XlsxError) -> Self {
        Self::Xlsx(e)
    }
}

fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

/// Field delimiter implied by the file extension: tab for
/// `.tsv`/`.tab`/`.txt`, comma otherwise.
pub fn delimiter_for(path: &Path) -> u8 {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("tsv" | "tab" | "txt") => b'\t',
        _ => b',',
    }
}

/// Read and parse an input file: `.xlsx` workbooks by their `Detail`
/// sheet, anything else as delimited text.
pub fn read_batch(path: &Path) -> Result<Batch, InputError> {
    if is_workbook(path) {
        return read_workbook(path);
    }
    let file = File::open(path)?;
    parse_batch(file, delimiter_for(path))
}

/// Parse the `Detail` sheet of an `.xlsx` workbook.
pub fn read_workbook(path: &Path) -> Result<Batch, InputError> {
    let mut workbook: Xlsx<_> = calamine::open_workbook(path)?;
    if !workbook.sheet_names().iter().any(|name| name == DETAIL_SHEET) {
        return Err(InputError::MissingSheet {
            available: workbook.sheet_names(),
        });
    }
    let range = workbook.worksheet_range(DETAIL_SHEET)?;
    collect_batch(
        range
            .rows()
            .map(|row| Ok(row.iter().map(cell_text).collect::<Vec<_>>())),
    )
}

/// Parse delimited text from any reader.
pub fn parse_batch<R: Read>(reader: R, delimiter: u8) -> Result<Batch, InputError> {
    let mut rows = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);

    collect_batch(rows.records().map(|row| {
        row.map(|row| row.iter().map(String::from).collect::<Vec<_>>())
            .map_err(InputError::from)
    }))
}

/// Text of a worksheet cell; whole floats lose their `.0`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Turn raw rows into a batch: detect the layout, skip blank and header
/// rows, build records.
fn collect_batch<I>(rows: I) -> Result<Batch, InputError>
where
    I: IntoIterator<Item = Result<Vec<String>, InputError>>,
{
    let mut layout = None;
    let mut records = Vec::new();
    let mut position = 0;

    for row in rows {
        let row = row?;
        let cells: Vec<&str> = row.iter().map(|c| clean(c)).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }

        let current = match layout {
            Some(l) => l,
            None => {
                let columns = width(&cells);
                let detected = InputLayout::from_column_count(columns)
                    .ok_or(InputError::UnknownLayout { columns })?;
                log::debug!("input layout: {detected} ({columns} columns)");
                *layout.insert(detected)
            }
        };

        if cells[0] == HEADER_CELL {
            continue;
        }
        position += 1;
        records.push(to_record(&cells, current, position));
    }

    match layout {
        Some(layout) => Ok(Batch { layout, records }),
        None => Err(InputError::Empty),
    }
}

fn clean(cell: &str) -> &str {
    cell.trim_start_matches('\u{feff}').trim()
}

/// Row width ignoring trailing empty cells (spreadsheet exports pad rows).
fn width(cells: &[&str]) -> usize {
    cells.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1)
}

fn to_record(cells: &[&str], layout: InputLayout, position: usize) -> Record {
    let cell = |i: usize| {
        cells
            .get(i)
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
    };
    let index = cells
        .first()
        .and_then(|c| parse_number(c))
        .and_then(|n| usize::try_from(n).ok())
        .filter(|n| *n > 0)
        .unwrap_or(position);

    match layout {
        InputLayout::DoiList => Record {
            index,
            doi: cell(1),
            ..Default::default()
        },
        InputLayout::RepositoryUnion | InputLayout::RepositoryUnique => Record {
            index,
            title: cell(1),
            year: cells
                .get(2)
                .and_then(|c| parse_number(c))
                .and_then(|n| i32::try_from(n).ok()),
            doi: cell(3),
            document_type: cell(4),
            language: cell(5),
            cited_by: cells
                .get(6)
                .and_then(|c| parse_number(c))
                .and_then(|n| u64::try_from(n).ok()),
            authors: cell(7),
            repository: if layout.has_repository() {
                cell(8)
            } else {
                None
            },
        },
    }
}

/// Integer cell, tolerating spreadsheet floats such as `2021.0`.
fn parse_number(cell: &str) -> Option<i64> {
    if let Ok(n) = cell.parse::<i64>() {
        return Some(n);
    }
    let f = cell.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}
