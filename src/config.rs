use anyhow::{Context, Result, anyhow};
use clap::Parser;
use ini::Ini;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::dialect::{ConnectionTarget, Dialect};
use crate::migrator::FailurePolicy;
use crate::remap::ChannelTypeMap;

pub const SOURCE_ENV: &str = "ONEAPI_OLD_SQL_DSN";
pub const TARGET_ENV: &str = "ONEAPI_NEW_SQL_DSN";

#[derive(Parser, Debug, Clone)]
#[command(name = "oneapi-migrate", version)]
#[command(about = "Copy one-api data from a legacy schema into the current schema")]
pub struct Cli {
    /// Connection descriptor of the legacy database
    #[arg(env = SOURCE_ENV)]
    pub source: Option<String>,

    /// Connection descriptor of the new database
    #[arg(env = TARGET_ENV)]
    pub target: Option<String>,

    /// Optional INI file with [database], [migration] and [channel_types] sections
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep migrating the remaining tables after a table fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Write a JSON report of every table outcome to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Wait for Enter before exiting
    #[arg(long)]
    pub pause: bool,
}

/// Values read from the INI config file. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub source: Option<String>,
    pub target: Option<String>,
    pub source_dialect: Option<Dialect>,
    pub target_dialect: Option<Dialect>,
    pub continue_on_error: Option<bool>,
    pub channel_types: BTreeMap<i64, i64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let ini = Ini::load_from_file(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_ini(&ini).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let ini = Ini::load_from_str(text).context("Failed to parse config")?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self> {
        let mut config = FileConfig::default();

        if let Some(database) = ini.section(Some("database")) {
            config.source = non_empty(database.get("source"));
            config.target = non_empty(database.get("target"));
            config.source_dialect = non_empty(database.get("source_dialect"))
                .map(|d| d.parse())
                .transpose()?;
            config.target_dialect = non_empty(database.get("target_dialect"))
                .map(|d| d.parse())
                .transpose()?;
        }

        if let Some(migration) = ini.section(Some("migration")) {
            config.continue_on_error = migration
                .get("continue_on_error")
                .map(parse_bool)
                .transpose()?;
        }

        if let Some(channel_types) = ini.section(Some("channel_types")) {
            for (legacy, current) in channel_types.iter() {
                let legacy: i64 = legacy
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid legacy channel type {:?}", legacy))?;
                let current: i64 = current
                    .trim()
                    .parse()
                    .with_context(|| format!("Invalid current channel type {:?}", current))?;
                config.channel_types.insert(legacy, current);
            }
        }

        Ok(config)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(anyhow!("Invalid boolean value: {}", other)),
    }
}

/// Fully resolved settings the engine runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: ConnectionTarget,
    pub target: ConnectionTarget,
    pub policy: FailurePolicy,
    pub channel_types: ChannelTypeMap,
}

impl Settings {
    /// Merges CLI arguments (already carrying the environment fallback) over the config file.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self> {
        let source = cli.source.clone().or(file.source).ok_or_else(|| {
            anyhow!(
                "No source database given: pass it as the first argument or set {}",
                SOURCE_ENV
            )
        })?;
        let target = cli.target.clone().or(file.target).ok_or_else(|| {
            anyhow!(
                "No target database given: pass it as the second argument or set {}",
                TARGET_ENV
            )
        })?;

        let policy = if cli.continue_on_error || file.continue_on_error.unwrap_or(false) {
            FailurePolicy::Continue
        } else {
            FailurePolicy::FailFast
        };

        Ok(Settings {
            source: endpoint(&source, file.source_dialect),
            target: endpoint(&target, file.target_dialect),
            policy,
            channel_types: ChannelTypeMap::with_overrides(&file.channel_types),
        })
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(cli, file)
    }
}

/// Dialect overrides change statement syntax only; the driver still follows the URL.
fn endpoint(descriptor: &str, dialect: Option<Dialect>) -> ConnectionTarget {
    let mut target = Dialect::resolve(descriptor);
    if let Some(dialect) = dialect {
        target.dialect = dialect;
    }
    target
}
