//! scifetch - Resumable PDF retrieval for bibliographic exports
//!
//! Reads a repository export (or a bare DOI list), fetches every paper
//! not yet on disk through an external download command, and keeps a
//! status ledger so repeated runs only retry what is still missing.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use scifetch_core::shutdown_flag;

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "scifetch")]
#[command(about = "Resumable PDF retrieval for bibliographic exports")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./scifetch.toml or ~/.config/scifetch/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every paper of an input file that is not downloaded yet
    Run(cmd::run::RunArgs),
    /// Show where an input file stands without fetching anything
    Status(cmd::status::StatusArgs),
    /// Show current configuration
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config before logging: the run log lives under the output root
    let config = match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let progress = Arc::new(scifetch_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug; the progress line shows activity
    //   non-TTY: info unless --debug; logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    let run_log = match &cli.command {
        Command::Run(args) => Some(cmd::run::run_log_path(&args.output_root(&config))),
        _ => None,
    };
    if let Err(e) = scifetch_core::init_logging(quiet, cli.debug, multi, run_log.as_deref()) {
        eprintln!("Cannot open run log: {e}");
        return ExitCode::from(2);
    }
    match &config.source {
        Some(path) => log::info!("Loaded config from {}", path.display()),
        None => log::debug!("No config file found, using defaults"),
    }

    let result = match cli.command {
        Command::Run(args) => {
            setup_signal_handler();
            cmd::run::run(args, &config, &progress)
        }
        Command::Status(args) => cmd::status::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            print_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            log::error!("Fatal error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn print_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![
        "Config file",
        &config
            .source
            .as_ref()
            .map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string()),
    ]);
    table.add_row(vec![
        "Output directory",
        &config.output.default_dir.display().to_string(),
    ]);
    table.add_row(vec!["Fetch command", &config.fetch.command]);
    table.add_row(vec!["Fetch arguments", &config.fetch.args.join(" ")]);
    table.add_row(vec![
        "Fetch timeout",
        &format!("{}s", config.fetch.timeout_secs),
    ]);
    table.add_row(vec![
        "Success markers",
        &if config.fetch.success_markers.is_empty() {
            "(exit code only)".to_string()
        } else {
            config.fetch.success_markers.join(", ")
        },
    ]);
    table.add_row(vec![
        "PDF verification",
        if config.verify.enabled {
            "enabled"
        } else {
            "disabled"
        },
    ]);

    eprintln!("\n{table}");
}

fn setup_signal_handler() {
    // First signal: finish the current record, then stop
    // Second signal: force exit
    // SAFETY: AtomicBool::swap and process::exit are async-signal-safe
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        let registered = unsafe {
            signal_hook::low_level::register(signal, || {
                if shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })
        };
        if let Err(e) = registered {
            log::warn!("Failed to register handler for signal {signal}: {e}");
        }
    }
}
