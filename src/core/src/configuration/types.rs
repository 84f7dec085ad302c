use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::event_taxonomy::raw_event::DEFAULT_TRANSPORT_CLASS;

/// `[honeypot]` section.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct HoneypotConfig {
    /// Name reported with every event. Falls back to the host name.
    #[serde(default)]
    pub sensor_name: Option<String>,
    /// Class name the front end prints in its log prefix, ahead of the
    /// correlator.
    #[serde(default = "default_transport_class")]
    pub transport_class: String,
}

impl Default for HoneypotConfig {
    fn default() -> Self {
        Self {
            sensor_name: None,
            transport_class: default_transport_class(),
        }
    }
}

fn default_transport_class() -> String {
    DEFAULT_TRANSPORT_CLASS.to_string()
}

/// `[output.json]` section, read by the JSON output on start.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct JsonOutputConfig {
    pub logfile: PathBuf,
}

/// `[output.database]` section, read by the database output on start.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DatabaseOutputConfig {
    pub path: PathBuf,
}
