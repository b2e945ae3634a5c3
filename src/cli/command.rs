use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ")\nsif ",
    env!("SIF_VERSION"),
    "\nbuilt ",
    env!("BUILD_TIMESTAMP"),
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting and converting Andor SIF camera files",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Warn)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first warning).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert SIF spectra to CSV.
    Convert(ConvertArgs),

    /// Print file information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Glob pattern(s) matching the files to convert.
    #[arg(value_name = "PATTERN", default_value = "*.sif")]
    pub pattern: Vec<String>,

    /// Directory to write converted files to (must exist).
    #[arg(long, visible_alias = "output", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Combine all spectra into a single file.
    #[arg(long)]
    pub join: bool,

    /// Log every converted file (raises the log level to info).
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input SIF file or spool directory.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Report format.
    #[arg(long, value_enum, default_value_t = InfoFormat::Text)]
    pub format: InfoFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors (default).
    Warn,
    /// Show info, warnings and errors.
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl Cli {
    /// Effective log level; `convert --verbose` never lowers an explicit one.
    pub fn level_filter(&self) -> log::LevelFilter {
        match &self.command {
            Commands::Convert(args) if args.verbose => self.loglevel.max(LogLevel::Info),
            _ => self.loglevel,
        }
        .to_level_filter()
    }

    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum InfoFormat {
    /// Aligned human-readable report.
    Text,
    /// YAML document.
    Yaml,
}
