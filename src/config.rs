//! Configuration management
//!
//! Command line flags are combined with an optional JSON config file into
//! one immutable [`Options`] value for the run.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use tracing::warn;

use crate::xmltv::{TimeShift, DEFAULT_DATE_FILTER_OFFSET};

/// Utility to inspect and manipulate XMLTV files.
///
/// If -i, -c, -d or -p are used, a summary of the input files is printed.
/// Otherwise the processed XMLTV document is printed. Input files are merged
/// into one before processing.
#[derive(Debug, Clone, Parser)]
#[command(name = "xmltv-tool", version)]
pub struct Cli {
    /// Print stats about the files instead of the resulting file. Equivalent to -cd
    #[arg(short = 'i', long)]
    pub inspect: bool,

    /// Print debug statements during the execution of the program
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Inspect channels, implies -i
    #[arg(short = 'c', long)]
    pub print_channels: bool,

    /// Inspect dates and per-day time coverage, implies -i
    #[arg(short = 'd', long)]
    pub print_days: bool,

    /// Inspect programs, implies -i
    #[arg(short = 'p', long)]
    pub print_programs: bool,

    /// Filter by channel ids (comma separated)
    #[arg(short = 'C', long, value_name = "IDS")]
    pub filter_channels: Option<String>,

    /// Filter by channel ids loaded from a file (one per line)
    #[arg(short = 'f', long, value_name = "PATH")]
    pub filter_channels_file: Option<PathBuf>,

    /// Drop programmes starting at or after this date and time (YYYYMMDDHHMMSS)
    #[arg(short = 'j', long, value_name = "DATETIME")]
    pub filter_date: Option<String>,

    /// Shift programme times onwards. Accepts time definitions as: 1d, 3M, 6y, 4w, 2h, 30m, 15s
    #[arg(short = 's', long, value_name = "SHIFT", allow_hyphen_values = true)]
    pub shift_time_onwards: Option<String>,

    /// Shift programme times backwards. Same syntax as --shift-time-onwards
    #[arg(short = 'S', long, value_name = "SHIFT", allow_hyphen_values = true)]
    pub shift_time_backwards: Option<String>,

    /// Normalize programme times to UTC
    #[arg(short = 'u', long = "utc", visible_alias = "normalize-utc")]
    pub utc: bool,

    /// Print program duration instead of stop time when possible
    #[arg(short = 't', long)]
    pub print_duration: bool,

    /// Config file (default: <config dir>/xmltv_tool/config.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// XMLTV files to merge and process (.xml or .xml.gz)
    #[arg(value_name = "FILES")]
    pub files: Vec<PathBuf>,
}

/// Settings read from the JSON config file
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub filter_channels: Vec<String>,
    #[serde(default)]
    pub filter_channels_file: Option<PathBuf>,
    #[serde(default = "default_date_filter_offset")]
    pub date_filter_offset: String,
    #[serde(default)]
    pub normalize_utc: bool,
    #[serde(default)]
    pub print_duration: bool,
}

fn default_date_filter_offset() -> String {
    DEFAULT_DATE_FILTER_OFFSET.to_string()
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            filter_channels: Vec::new(),
            filter_channels_file: None,
            date_filter_offset: default_date_filter_offset(),
            normalize_utc: false,
            print_duration: false,
        }
    }
}

impl FileConfig {
    fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("xmltv_tool");
        path.push("config.json");
        Some(path)
    }

    /// Load `explicit`, or the default location when `None`. A missing
    /// default file is normal; anything unreadable falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Self::default(),
            },
        };

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Ignoring invalid config file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Cannot read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Fully resolved settings for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub inputs: Vec<PathBuf>,
    pub debug: bool,
    pub print_channels: bool,
    pub print_days: bool,
    pub print_programs: bool,
    pub print_duration: bool,
    /// Comma separated allow-list entries; `Some` enables the channel filter
    pub filter_channels: Option<Vec<String>>,
    pub filter_channels_file: Option<PathBuf>,
    pub filter_date: Option<String>,
    pub date_filter_offset: String,
    pub shift: Option<TimeShift>,
    pub normalize_utc: bool,
}

impl Options {
    pub fn resolve(cli: Cli, file: FileConfig) -> Self {
        let mut filter_channels: Option<Vec<String>> = cli
            .filter_channels
            .as_deref()
            .map(|list| vec![list.to_string()]);
        if !file.filter_channels.is_empty() {
            filter_channels
                .get_or_insert_with(Vec::new)
                .extend(file.filter_channels);
        }

        Self {
            inputs: cli.files,
            debug: cli.debug,
            print_channels: cli.print_channels || cli.inspect,
            print_days: cli.print_days || cli.inspect,
            print_programs: cli.print_programs,
            print_duration: cli.print_duration || file.print_duration,
            filter_channels,
            filter_channels_file: cli.filter_channels_file.or(file.filter_channels_file),
            filter_date: cli.filter_date,
            date_filter_offset: file.date_filter_offset,
            shift: TimeShift::from_specs(
                cli.shift_time_onwards.as_deref(),
                cli.shift_time_backwards.as_deref(),
            ),
            normalize_utc: cli.utc || file.normalize_utc,
        }
    }

    /// Whether any summary report replaces the XML output
    pub fn wants_report(&self) -> bool {
        self.print_channels || self.print_days || self.print_programs
    }

    pub fn filters_channels(&self) -> bool {
        self.filter_channels.is_some() || self.filter_channels_file.is_some()
    }
}
