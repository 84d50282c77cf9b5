//! End-of-run summary: counts, per-record table and the CSV/XLSX artifacts

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use rust_xlsxwriter::{Format, Workbook};
use scifetch_core::fmt_num;

use crate::input::DETAIL_SHEET;
use crate::key::ArtifactKey;
use crate::orchestrator::Outcome;
use crate::record::{InputLayout, Record, Status};

/// One input record and how it ended up.
#[derive(Debug, Clone)]
pub struct RecordRow {
    pub record: Record,
    pub status: Status,
    /// Artifact file name, set only when the record is `Ok`
    pub pdf_name: Option<String>,
}

/// Aggregated outcome of a run.
#[derive(Debug)]
pub struct Summary {
    pub layout: InputLayout,
    pub rows: Vec<RecordRow>,
    /// Index → label of records that failed this run
    pub not_available: BTreeMap<usize, String>,
    /// Index → label of records without a DOI
    pub non_existent: BTreeMap<usize, String>,
    /// Fetch collaborator invocations
    pub attempted: usize,
    /// Records in the batch, visited or not
    pub total: usize,
    /// Stopped early on a shutdown request
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl Summary {
    pub fn new(layout: InputLayout, total: usize) -> Self {
        Self {
            layout,
            rows: Vec::with_capacity(total),
            not_available: BTreeMap::new(),
            non_existent: BTreeMap::new(),
            attempted: 0,
            total,
            interrupted: false,
            elapsed: Duration::ZERO,
        }
    }

    /// Account for one processed record.
    pub fn push(&mut self, record: &Record, outcome: &Outcome) {
        let mode = self.layout.key_mode();
        let status = outcome.status();
        let label = record.label(mode).to_string();
        match status {
            Status::NotAvailable => {
                self.not_available.insert(record.index, label);
            }
            Status::Nonexistent => {
                self.non_existent.insert(record.index, label);
            }
            Status::Ok => {}
        }
        if outcome.attempted() {
            self.attempted += 1;
        }
        let pdf_name =
            (status == Status::Ok).then(|| ArtifactKey::for_record(record, mode).filename);
        self.rows.push(RecordRow {
            record: record.clone(),
            status,
            pdf_name,
        });
    }

    /// Records visited this run.
    pub fn analyzed(&self) -> usize {
        self.rows.len()
    }

    /// Analyzed minus the two failure buckets.
    pub fn downloaded(&self) -> usize {
        self.analyzed()
            .saturating_sub(self.not_available.len())
            .saturating_sub(self.non_existent.len())
    }

    /// Format the totals table as a string.
    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new(format!("Download summary ({})", self.layout))
                    .fg(Color::Cyan)
                    .add_attribute(Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        let analyzed = if self.interrupted {
            format!(
                "{} of {} (interrupted)",
                fmt_num(self.analyzed()),
                fmt_num(self.total)
            )
        } else {
            fmt_num(self.analyzed())
        };
        table.add_row(vec![Cell::new("Papers analyzed"), Cell::new(analyzed)]);
        table.add_row(vec![
            Cell::new("Papers downloaded"),
            Cell::new(fmt_num(self.downloaded())).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Not available"),
            Cell::new(fmt_num(self.not_available.len())).fg(Color::Yellow),
        ]);
        table.add_row(vec![
            Cell::new("Non-existent"),
            Cell::new(fmt_num(self.non_existent.len())),
        ]);
        table.add_row(vec![
            Cell::new("Fetch attempts"),
            Cell::new(fmt_num(self.attempted)),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
        ]);

        format!("\n{table}")
    }

    /// Table of records that did not end up `Ok`; `None` if there are none.
    pub fn format_failures(&self) -> Option<String> {
        if self.not_available.is_empty() && self.non_existent.is_empty() {
            return None;
        }
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Item").fg(Color::Cyan),
                Cell::new("Status").fg(Color::Cyan),
                Cell::new("Paper").fg(Color::Cyan),
            ]);
        for (index, label) in &self.not_available {
            table.add_row(vec![
                Cell::new(index),
                Cell::new(Status::NotAvailable).fg(Color::Yellow),
                Cell::new(label),
            ]);
        }
        for (index, label) in &self.non_existent {
            table.add_row(vec![
                Cell::new(index),
                Cell::new(Status::Nonexistent),
                Cell::new(label),
            ]);
        }
        Some(format!("\n{table}"))
    }

    /// Print tables on stderr (TTY mode).
    pub fn print(&self) {
        eprintln!("{}", self.format_table());
        if let Some(failures) = self.format_failures() {
            eprintln!("{failures}");
        }
    }

    /// Log minimal summary (non-TTY mode).
    pub fn log(&self) {
        log::info!(
            "Papers analyzed: {}, downloaded: {}, not available: {}, non-existent: {} [{:.1}s]",
            fmt_num(self.analyzed()),
            fmt_num(self.downloaded()),
            fmt_num(self.not_available.len()),
            fmt_num(self.non_existent.len()),
            self.elapsed.as_secs_f64()
        );
        for (index, label) in &self.not_available {
            log::info!("  not available: [{index}] {label}");
        }
        for (index, label) in &self.non_existent {
            log::info!("  non-existent: [{index}] {label}");
        }
        if self.interrupted {
            log::warn!(
                "Run interrupted: {} of {} records left for the next run",
                fmt_num(self.total.saturating_sub(self.analyzed())),
                fmt_num(self.total)
            );
        }
    }

    /// Write the per-record summary CSV (tmp file, then rename).
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let tmp_path = tmp_path(path);
        {
            let mut writer = csv::Writer::from_path(&tmp_path)
                .with_context(|| format!("failed to create {}", tmp_path.display()))?;
            writer.write_record(self.header())?;
            for row in &self.rows {
                writer.write_record(self.csv_fields(row))?;
            }
            writer
                .flush()
                .with_context(|| format!("failed to flush {}", tmp_path.display()))?;
        }
        fs::rename(&tmp_path, path).with_context(|| {
            format!("failed to rename {} → {}", tmp_path.display(), path.display())
        })?;
        log::debug!("summary written to {}", path.display());
        Ok(())
    }

    /// Write the per-record summary workbook, one `Detail` sheet with the
    /// same columns as the CSV (tmp file, then rename).
    pub fn write_xlsx(&self, path: &Path) -> Result<()> {
        let tmp_path = tmp_path(path);
        let header_format = Format::new().set_bold();

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(DETAIL_SHEET)?;
        for (col, title) in self.header().into_iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, title, &header_format)?;
        }
        for (i, row) in self.rows.iter().enumerate() {
            let line = i as u32 + 1;
            for (col, field) in self.csv_fields(row).iter().enumerate() {
                let col = col as u16;
                match field.parse::<f64>() {
                    Ok(n) if self.is_numeric_column(col) => sheet.write_number(line, col, n)?,
                    _ => sheet.write_string(line, col, field)?,
                };
            }
        }
        workbook
            .save(&tmp_path)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;

        fs::rename(&tmp_path, path).with_context(|| {
            format!("failed to rename {} → {}", tmp_path.display(), path.display())
        })?;
        log::debug!("summary written to {}", path.display());
        Ok(())
    }

    /// Item, Year and Cited By hold numbers.
    fn is_numeric_column(&self, col: u16) -> bool {
        match self.layout {
            InputLayout::DoiList => col == 0,
            _ => matches!(col, 0 | 2 | 6),
        }
    }

    fn header(&self) -> Vec<&'static str> {
        match self.layout {
            InputLayout::DoiList => vec!["Item", "DOI", "Download"],
            layout => {
                let mut header = vec![
                    "Item",
                    "Title",
                    "Year",
                    "DOI",
                    "Document Type",
                    "Language",
                    "Cited By",
                    "Download",
                    "Author(s)",
                ];
                if layout.has_repository() {
                    header.push("Repository");
                }
                header.push("PDF Name");
                header
            }
        }
    }

    fn csv_fields(&self, row: &RecordRow) -> Vec<String> {
        let r = &row.record;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        match self.layout {
            InputLayout::DoiList => vec![
                r.index.to_string(),
                text(&r.doi),
                row.status.to_string(),
            ],
            layout => {
                let mut fields = vec![
                    r.index.to_string(),
                    text(&r.title),
                    r.year.map(|y| y.to_string()).unwrap_or_default(),
                    text(&r.doi),
                    text(&r.document_type),
                    text(&r.language),
                    r.cited_by.map(|c| c.to_string()).unwrap_or_default(),
                    row.status.to_string(),
                    text(&r.authors),
                ];
                if layout.has_repository() {
                    fields.push(text(&r.repository));
                }
                fields.push(row.pdf_name.clone().unwrap_or_default());
                fields
            }
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
