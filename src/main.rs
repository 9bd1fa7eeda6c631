/// Version injected at compile time via SVCTL_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("SVCTL_VERSION") {
    Some(v) => v,
    None => "dev",
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use svctl::config::Config;
use svctl::modules::invocation::{is_failure, Invocation};
use svctl::modules::{failure_bundle, ModuleKind};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Declarative management of IBM Storage Virtualize systems
#[derive(Parser, Debug)]
#[command(name = "svctl", version, about, long_about = None)]
struct Args {
    /// Module to run
    #[arg(value_enum)]
    module: ModuleKind,

    /// JSON argument file; read from stdin when omitted
    args_file: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Log file (overridden by the module's log_path argument)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// File logging only: stdout carries the result bundle
fn setup_logging(
    level: LogLevel,
    log_path: Option<PathBuf>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // An explicit log_path turns on debug logging even without --log-level
    let level = match (level, &log_path) {
        (LogLevel::Off, Some(_)) => LogLevel::Debug,
        (level, _) => level,
    };
    let tracing_level = level.to_tracing_level()?;

    let log_path = log_path.unwrap_or_else(get_log_path);

    let file = match open_log_file(&log_path) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("svctl: {:#}", err);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("svctl {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

/// Open the log file for appending, creating its directory first
fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create log directory {:?}", parent))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {:?}", path))
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("svctl").join("svctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".svctl").join("svctl.log");
    }
    PathBuf::from("svctl.log")
}

fn read_input(path: Option<&Path>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read argument file {:?}", path)),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read arguments from stdin")?;
            Ok(raw)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let invocation =
        read_input(args.args_file.as_deref()).and_then(|raw| Invocation::from_bundle(args.module, &raw));

    let log_path = invocation
        .as_ref()
        .ok()
        .and_then(|inv| inv.connection.log_path.clone())
        .or_else(|| args.log_file.clone());
    let _log_guard = setup_logging(args.log_level, log_path);

    let output = match invocation {
        Ok(invocation) => invocation.run(&Config::load()).await,
        Err(err) => {
            tracing::error!("{} rejected its arguments: {:#}", args.module, err);
            failure_bundle(&err)
        }
    };

    println!("{}", output);

    if is_failure(&output) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
