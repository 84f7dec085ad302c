//! Output subsystem
//!
//! This module provides the sink contract every output backend implements,
//! and the backends shipped with the pipeline.
//!
//! Components:
//! - `output_trait`: the `OutputSink` trait and the per-event context.
//! - `json_output`: newline-delimited JSON file, the reference backend.
//! - `database_output`: SeaORM/SQLite backend.
//! - `db_entities`: SeaORM entity models for the database backend.

pub mod database_output;
pub mod db_entities;
pub mod json_output;
pub mod output_trait;

pub use database_output::DatabaseOutput;
pub use json_output::JsonOutput;
pub use output_trait::{EventContext, OutputSink, SinkFailure};

use crate::configuration::Config;
use crate::error_handling::types::ConfigError;

/// Instantiate one backend per enabled `[output.<name>]` table, paired with
/// the table it must be started with.
pub fn build_outputs(
    config: &Config,
) -> Result<Vec<(Box<dyn OutputSink>, toml::Table)>, ConfigError> {
    config
        .enabled_outputs()
        .map(|(name, table)| {
            let sink: Box<dyn OutputSink> = match name {
                json_output::NAME => Box::new(JsonOutput::new()),
                database_output::NAME => Box::new(DatabaseOutput::new()),
                other => return Err(ConfigError::UnknownOutput(other.to_string())),
            };
            Ok((sink, table.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_outputs() {
        let config = Config::from_toml_str(
            r#"
            [output.json]
            logfile = "audit.json"

            [output.database]
            enabled = false
            path = "audit.sqlite3"
            "#,
        )
        .unwrap();
        let outputs = build_outputs(&config).unwrap();
        let names: Vec<&str> = outputs.iter().map(|(s, _)| s.name()).collect();
        assert_eq!(names, vec!["json"]);
    }

    #[test]
    fn test_unknown_output_is_rejected() {
        let config = Config::from_toml_str("[output.mysql]\nhost = \"db\"").unwrap();
        match build_outputs(&config) {
            Err(ConfigError::UnknownOutput(name)) => assert_eq!(name, "mysql"),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("mysql output should not exist"),
        }
    }
}
