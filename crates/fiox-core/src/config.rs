//! Command-line interface and resolved configuration.
//!
//! Flags mirror the conventional fio exporter surface: short flags for the
//! common knobs, env fallbacks for container deployments. Parsing is clap's
//! job; semantic validation happens once in [`Cli::into_config`].

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use fiox_common::Error;

use crate::driver::DriverConfig;
use crate::logging::{LogFormat, LogLevel};
use crate::server::TelemetryConfig;

/// Supervise a fio workload and export its periodic statistics.
#[derive(Parser, Debug)]
#[command(
    name = "fiox-core",
    author,
    version,
    about = "Run fio under supervision and expose its periodic terse statistics for Prometheus",
    long_about = None
)]
pub struct Cli {
    /// Path to the fio binary
    #[arg(
        short = 'p',
        long = "path",
        default_value = "fio",
        env = "FIOX_FIO_PATH"
    )]
    pub fio_path: String,

    /// Path to the fio job file
    #[arg(short = 'j', long = "job", env = "FIOX_JOB_FILE")]
    pub job_file: PathBuf,

    /// Seconds between fio status lines
    #[arg(short = 'i', long, default_value_t = 30, env = "FIOX_INTERVAL")]
    pub interval: u64,

    /// Port for the telemetry endpoint
    #[arg(short = 'l', long, default_value_t = 8080, env = "FIOX_PORT")]
    pub port: u16,

    /// Bind address for the telemetry endpoint
    #[arg(long, default_value = "0.0.0.0", env = "FIOX_BIND")]
    pub bind: String,

    /// URL path the metrics are served on
    #[arg(long = "telemetry-path", default_value = "/metrics")]
    pub telemetry_path: String,

    /// Log output format (human, jsonl)
    #[arg(long = "log-format", default_value_t = LogFormat::Human)]
    pub log_format: LogFormat,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long = "log-level", default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

/// Resolved and validated runtime configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub driver: DriverConfig,
    pub telemetry: TelemetryConfig,
}

impl Cli {
    /// Validate the parsed flags and build the runtime configuration.
    pub fn into_config(self) -> Result<Config, Error> {
        if self.fio_path.is_empty() {
            return Err(Error::Config(
                "fio binary path should not be empty".to_string(),
            ));
        }
        if self.job_file.as_os_str().is_empty() {
            return Err(Error::Config("job file path should not be empty".to_string()));
        }
        if self.interval == 0 {
            return Err(Error::Config(
                "refresh interval should be greater than 0".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(Error::Config(
                "telemetry port should be greater than 0".to_string(),
            ));
        }
        if !self.telemetry_path.starts_with('/') {
            return Err(Error::Config(format!(
                "telemetry path should start with '/': {}",
                self.telemetry_path
            )));
        }

        Ok(Config {
            driver: DriverConfig {
                fio_path: self.fio_path,
                job_file: self.job_file,
                interval: self.interval,
            },
            telemetry: TelemetryConfig {
                bind: self.bind,
                port: self.port,
                path: self.telemetry_path,
            },
        })
    }
}
