//! `scifetch status` - read-only view of an input file against its output

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use scifetch_core::fmt_num;
use scifetch_ledger::{Plan, plan, read_batch};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Input file: repository export (.xlsx/.csv) or DOI list (.txt/.tsv)
    pub input: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let output_root = args
        .output
        .clone()
        .unwrap_or_else(|| config.output.default_dir.clone());
    let engine = config.engine(output_root);

    let batch = read_batch(&args.input)
        .with_context(|| format!("failed to read input {}", args.input.display()))?;
    let plan = plan(&engine, &batch)?;

    eprintln!(
        "\n{}",
        format_plan(&plan, &format!("{} ({})", args.input.display(), batch.layout))
    );
    Ok(())
}

fn format_plan(plan: &Plan, title: &str) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Records").fg(Color::Cyan),
        ]);
    table.add_row(vec![Cell::new("Total"), Cell::new(fmt_num(plan.total))]);
    table.add_row(vec![
        Cell::new("Downloaded"),
        Cell::new(fmt_num(plan.ok)).fg(Color::Green),
    ]);
    table.add_row(vec![
        Cell::new("Not available (will retry)"),
        Cell::new(fmt_num(plan.not_available)).fg(Color::Yellow),
    ]);
    table.add_row(vec![
        Cell::new("Non-existent"),
        Cell::new(fmt_num(plan.non_existent)),
    ]);
    table.add_row(vec![Cell::new("Pending"), Cell::new(fmt_num(plan.pending))]);
    table.add_row(vec![
        Cell::new("Next run fetches at most"),
        Cell::new(fmt_num(plan.to_fetch())),
    ]);
    table
}
