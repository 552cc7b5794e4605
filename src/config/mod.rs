//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "foglio";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_VOLATILE_OP_TIMEOUT_MS: u64 = 250;
const DEFAULT_CACHE_DETAIL_TTL_SECS: u64 = 1200;
const DEFAULT_CACHE_LIST_TTL_SECS: u64 = 60;
// Every five minutes; seconds-resolution cron as apalis-cron expects.
const DEFAULT_RECONCILE_SCHEDULE: &str = "0 */5 * * * *";

/// Command-line arguments for the Foglio binary.
#[derive(Debug, Parser)]
#[command(name = "foglio", version, about = "Foglio publishing backend")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOGLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run one reconciliation pass and exit; non-zero on any per-record failure.
    Reconcile(ReconcileArgs),
    /// Run the resident worker that reconciles on a cron cadence.
    Worker(WorkerArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,

    /// Override the reconciliation cron schedule (seconds-resolution cron).
    #[arg(long = "reconcile-schedule", value_name = "CRON")]
    pub reconcile_schedule: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the volatile store connection URL.
    #[arg(long = "volatile-url", value_name = "URL")]
    pub volatile_url: Option<String>,

    /// Override the volatile store per-operation timeout.
    #[arg(long = "volatile-op-timeout-ms", value_name = "MILLIS")]
    pub volatile_op_timeout_ms: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub volatile: VolatileSettings,
    pub cache: CacheSettings,
    pub reconciler: ReconcilerSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct VolatileSettings {
    pub url: Option<String>,
    pub op_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub detail_ttl_secs: u64,
    pub list_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub schedule: String,
}

impl From<&CacheSettings> for crate::cache::CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            detail_ttl_secs: settings.detail_ttl_secs,
            list_ttl_secs: settings.list_ttl_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOGLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match &cli.command {
        Command::Reconcile(args) => raw.apply_common_overrides(&args.overrides),
        Command::Worker(args) => {
            raw.apply_common_overrides(&args.overrides);
            if let Some(schedule) = args.reconcile_schedule.as_ref() {
                raw.reconciler.schedule = Some(schedule.clone());
            }
        }
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    volatile: RawVolatileSettings,
    cache: RawCacheSettings,
    reconciler: RawReconcilerSettings,
}

impl RawSettings {
    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.volatile_url.as_ref() {
            self.volatile.url = Some(url.clone());
        }
        if let Some(timeout) = overrides.volatile_op_timeout_ms {
            self.volatile.op_timeout_ms = Some(timeout);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            volatile,
            cache,
            reconciler,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            volatile: build_volatile_settings(volatile)?,
            cache: build_cache_settings(cache)?,
            reconciler: build_reconciler_settings(reconciler)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_volatile_settings(volatile: RawVolatileSettings) -> Result<VolatileSettings, LoadError> {
    let url = volatile.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let timeout_ms = volatile
        .op_timeout_ms
        .unwrap_or(DEFAULT_VOLATILE_OP_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "volatile.op_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(VolatileSettings {
        url,
        op_timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let detail_ttl_secs = cache
        .detail_ttl_secs
        .unwrap_or(DEFAULT_CACHE_DETAIL_TTL_SECS);
    if detail_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.detail_ttl_secs",
            "must be greater than zero",
        ));
    }

    let list_ttl_secs = cache.list_ttl_secs.unwrap_or(DEFAULT_CACHE_LIST_TTL_SECS);
    if list_ttl_secs == 0 {
        return Err(LoadError::invalid(
            "cache.list_ttl_secs",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        detail_ttl_secs,
        list_ttl_secs,
    })
}

fn build_reconciler_settings(
    reconciler: RawReconcilerSettings,
) -> Result<ReconcilerSettings, LoadError> {
    let schedule = reconciler
        .schedule
        .unwrap_or_else(|| DEFAULT_RECONCILE_SCHEDULE.to_string());
    if schedule.trim().is_empty() {
        return Err(LoadError::invalid(
            "reconciler.schedule",
            "must not be empty",
        ));
    }

    Ok(ReconcilerSettings { schedule })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawVolatileSettings {
    url: Option<String>,
    op_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    detail_ttl_secs: Option<u64>,
    list_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawReconcilerSettings {
    schedule: Option<String>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.database.url = Some("postgres://file".to_string());
        raw.logging.level = Some("info".to_string());

        let overrides = CommonOverrides {
            database_url: Some("postgres://cli".to_string()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_common_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.database.url.as_deref(), Some("postgres://cli"));
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn volatile_timeout_defaults_to_250ms() {
        let raw = RawSettings::default();
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.volatile.op_timeout, Duration::from_millis(250));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut raw = RawSettings::default();
        raw.volatile.op_timeout_ms = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = CommonOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_common_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn parse_reconcile_arguments() {
        let args = CliArgs::parse_from([
            "foglio",
            "reconcile",
            "--database-url",
            "postgres://example",
            "--volatile-url",
            "redis://localhost",
        ]);

        match args.command {
            Command::Reconcile(reconcile) => {
                assert_eq!(
                    reconcile.overrides.database_url.as_deref(),
                    Some("postgres://example")
                );
                assert_eq!(
                    reconcile.overrides.volatile_url.as_deref(),
                    Some("redis://localhost")
                );
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_worker_schedule_override() {
        let args = CliArgs::parse_from([
            "foglio",
            "worker",
            "--reconcile-schedule",
            "0 * * * * *",
        ]);

        match args.command {
            Command::Worker(worker) => {
                assert_eq!(worker.reconcile_schedule.as_deref(), Some("0 * * * * *"));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn default_schedule_applies() {
        let raw = RawSettings::default();
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.reconciler.schedule, DEFAULT_RECONCILE_SCHEDULE);
    }
}
