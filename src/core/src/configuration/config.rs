use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Command-line arguments of the `miel-audit` binary.
///
/// Most settings live in the TOML file; the command line only names that file,
/// the event streams to read and the few values operators override per run.
#[derive(Parser, Debug, Clone)]
#[command(name = "miel-audit")]
#[command(version)]
#[command(about = "Session-correlating audit pipeline for the Miel honeypot")]
pub struct CliArgs {
    /// Path to the TOML configuration file
    pub config_file: PathBuf,

    /// Sensor name reported with every event.
    ///
    /// Overrides `honeypot.sensor_name` from the configuration file.
    ///
    /// # Command Line
    /// Use `--sensor-name <NAME>` or the `MIEL_SENSOR_NAME` environment variable
    #[arg(long, env = "MIEL_SENSOR_NAME")]
    pub sensor_name: Option<String>,

    /// Event streams to ingest, one JSON event per line.
    ///
    /// May be given several times; each stream is read concurrently. `-` is
    /// standard input, which is also the default when no input is given.
    ///
    /// # Command Line
    /// Use `--input <PATH>` once per stream
    #[arg(long = "input", value_name = "PATH")]
    pub inputs: Vec<String>,
}

/// Application configuration
///
/// # Fields Overview
///
/// - `honeypot`: sensor identity and the log prefix the correlator is parsed from
/// - `output`: one table per output backend, keyed by backend name (`json`,
///   `database`). Tables are handed to the backend untouched when it starts;
///   a table with `enabled = false` is skipped.
///
/// # Examples
///
/// ```
/// use miel_audit::configuration::Config;
///
/// let config = Config::from_toml_str(r#"
///     [honeypot]
///     sensor_name = "hp-eu-1"
///
///     [output.json]
///     logfile = "log/miel-audit.json"
/// "#).unwrap();
/// assert_eq!(config.sensor(), "hp-eu-1");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub honeypot: HoneypotConfig,
    #[serde(default)]
    pub output: BTreeMap<String, toml::Table>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let class = &self.honeypot.transport_class;
        if class.is_empty()
            || !class
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            return Err(ConfigError::InvalidValue(format!(
                "honeypot.transport_class must be a class name, got '{}'",
                class
            )));
        }
        if let Some(name) = &self.honeypot.sensor_name {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "honeypot.sensor_name must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Fold command-line overrides into the file configuration.
    pub fn apply_args(&mut self, args: &CliArgs) {
        if let Some(name) = &args.sensor_name {
            self.honeypot.sensor_name = Some(name.clone());
        }
    }

    /// Sensor name: configured value, then host name.
    pub fn sensor(&self) -> String {
        if let Some(name) = &self.honeypot.sensor_name {
            return name.clone();
        }
        match hostname::get() {
            Ok(host) => host.to_string_lossy().into_owned(),
            Err(e) => {
                warn!("Unable to read host name for sensor: {}", e);
                String::from("unknown")
            }
        }
    }

    /// Output tables that are not explicitly disabled.
    pub fn enabled_outputs(&self) -> impl Iterator<Item = (&str, &toml::Table)> {
        self.output
            .iter()
            .filter(|(_, table)| {
                table
                    .get("enabled")
                    .and_then(toml::Value::as_bool)
                    .unwrap_or(true)
            })
            .map(|(name, table)| (name.as_str(), table))
    }
}
