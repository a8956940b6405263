// LogTally - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Config loading and logging initialisation (debug mode support)
// 3. Dispatch to `process_logs` or `generate_report`
// 4. Mapping errors to exit codes (2 = usage, 1 = everything else)

use clap::{Parser, Subcommand, ValueEnum};
use logtally::app::ingest::{self, IngestOptions};
use logtally::app::report::ReportEngine;
use logtally::core::export::{self, ExportFormat};
use logtally::core::report::{self, ReportKind, ReportRequest};
use logtally::platform::config::{self, AppConfig, PlatformPaths};
use logtally::platform::fs::collect_input_files;
use logtally::store::Store;
use logtally::util::constants;
use logtally::util::error::{LogTallyError, ReportError, Result};
use logtally::util::logging;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// LogTally - access-log ingestion and traffic reports.
///
/// Load combined-format access logs into a SQLite database, then run
/// canned reports over everything loaded so far.
#[derive(Parser, Debug)]
#[command(name = "logtally", version, about)]
struct Cli {
    /// Database file (default: logtally.db in the platform data directory).
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Config file (default: config.toml in the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse access-log files and store every valid line.
    #[command(name = "process_logs")]
    ProcessLogs {
        /// Log files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Worker threads for multi-file runs (0 = auto, 1 = sequential).
        #[arg(short = 'j', long = "jobs")]
        jobs: Option<usize>,
    },

    /// Run a canned report over the stored data.
    #[command(name = "generate_report")]
    GenerateReport {
        /// top_n_ips, status_code_distribution, hourly_traffic,
        /// top_n_pages, traffic_by_os or error_logs_by_date.
        report_type: String,

        /// Row count for top_n_ips and top_n_pages.
        #[arg(short = 'n', allow_negative_numbers = true)]
        n: Option<i64>,

        /// Day for error_logs_by_date (YYYY-MM-DD, UTC). Prompted if omitted.
        #[arg(long)]
        date: Option<String>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write the report to a file instead of stdout.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Csv,
    Json,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ExportFormat::Text,
            OutputFormat::Csv => ExportFormat::Csv,
            OutputFormat::Json => ExportFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let platform_paths = PlatformPaths::resolve();

    // Config first: its [logging] level feeds logging init.
    let loaded = match cli.config {
        Some(ref path) => config::load_config(path, true),
        None => config::load_config(&platform_paths.config_file(), false),
    };
    let (app_config, config_warnings) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            logging::init(cli.debug, None);
            exit_with(&LogTallyError::from(e));
        }
    };

    logging::init(cli.debug, app_config.log_level.as_deref());

    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "LogTally starting"
    );
    for warning in &config_warnings {
        tracing::warn!(warning = %warning, "Config warning");
    }

    // CLI flag > config file > platform default
    let database = cli
        .database
        .clone()
        .or_else(|| app_config.database_path.clone())
        .unwrap_or_else(|| platform_paths.default_database());
    tracing::debug!(database = %database.display(), "Database resolved");

    let result = match cli.command {
        Command::ProcessLogs { paths, jobs } => {
            run_process_logs(&paths, jobs, &app_config, &database)
        }
        Command::GenerateReport {
            report_type,
            n,
            date,
            format,
            output,
        } => run_generate_report(
            &report_type,
            n,
            date.as_deref(),
            format.into(),
            output.as_deref(),
            &app_config,
            &database,
        ),
    };

    if let Err(e) = result {
        exit_with(&e);
    }
}

fn exit_with(e: &LogTallyError) -> ! {
    tracing::error!(error = %e, "Command failed");
    eprintln!("Error: {e}");
    std::process::exit(if e.is_usage() { 2 } else { 1 });
}

fn run_process_logs(
    inputs: &[PathBuf],
    jobs: Option<usize>,
    app_config: &AppConfig,
    database: &Path,
) -> Result<()> {
    let (files, warnings) = collect_input_files(inputs, &app_config.input_config())?;
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Input discovery warning");
    }

    let store_config = app_config.store_config();
    let mut store = Store::open(database, &store_config)?;

    let options = IngestOptions {
        worker_threads: jobs
            .unwrap_or(app_config.worker_threads)
            .min(constants::MAX_WORKER_THREADS),
        store: store_config,
    };
    let summary = ingest::ingest_files(&mut store, &files, &options)?;

    println!(
        "Finished processing {} file(s): {} events stored, {} lines skipped \
         ({} malformed, {} bad timestamps).",
        summary.files.len(),
        summary.events_inserted(),
        summary.malformed_lines() + summary.bad_timestamp_lines(),
        summary.malformed_lines(),
        summary.bad_timestamp_lines(),
    );
    Ok(())
}

fn run_generate_report(
    report_type: &str,
    n: Option<i64>,
    date: Option<&str>,
    format: ExportFormat,
    output: Option<&Path>,
    app_config: &AppConfig,
    database: &Path,
) -> Result<()> {
    // Every usage error surfaces before the database is touched.
    let kind: ReportKind = report_type.parse()?;
    let date = if kind.needs_date() {
        Some(match date {
            Some(input) => report::parse_report_date(input)?,
            None => prompt_date()?,
        })
    } else {
        None
    };
    let request = ReportRequest::new(kind, n, date)?;

    // Reports never create a database: a mistyped path is an error.
    let store = Store::open_existing(database, &app_config.store_config())?;
    let report = ReportEngine::new(&store).run(&request)?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|source| LogTallyError::Io {
                path: path.to_path_buf(),
                operation: "create report output",
                source,
            })?;
            export::export_report(
                &report,
                format,
                io::BufWriter::new(file),
                &path.display().to_string(),
            )?;
            tracing::info!(
                report = %kind,
                rows = report.len(),
                output = %path.display(),
                "Report written"
            );
        }
        None => export::export_report(&report, format, io::stdout().lock(), "stdout")?,
    }
    Ok(())
}

/// Ask for the `error_logs_by_date` day on stdin.
fn prompt_date() -> Result<chrono::NaiveDate> {
    let stdin_err = |source| LogTallyError::Io {
        path: PathBuf::from("<stdin>"),
        operation: "read date",
        source,
    };

    let mut stdout = io::stdout().lock();
    write!(stdout, "{}", constants::DATE_PROMPT)
        .and_then(|_| stdout.flush())
        .map_err(|source| LogTallyError::Io {
            path: PathBuf::from("<stdout>"),
            operation: "write prompt",
            source,
        })?;

    let mut input = String::new();
    let read = io::stdin().lock().read_line(&mut input).map_err(stdin_err)?;
    if read == 0 {
        return Err(ReportError::MissingDate.into());
    }
    Ok(report::parse_report_date(&input)?)
}
