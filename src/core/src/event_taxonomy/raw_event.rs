use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::session_management::Correlator;

/// Class name the front end's transport puts in the log prefix.
pub const DEFAULT_TRANSPORT_CLASS: &str = "HoneyPotTransport";

/// One event exactly as the front end emitted it: a JSON object with loosely
/// typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent(Value);

impl RawEvent {
    /// Parse one line of the front end's event stream.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        let map: Map<String, Value> = serde_json::from_str(line)?;
        Ok(Self(Value::Object(map)))
    }

    /// Wrap an already-parsed value. Only JSON objects are events.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(_) => Some(Self(value)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Stdout/stderr passthrough carries a `printed` marker.
    pub fn is_printed(&self) -> bool {
        self.get("printed").is_some()
    }

    pub fn event_id(&self) -> Option<&str> {
        self.get("eventid").and_then(Value::as_str)
    }

    pub fn system(&self) -> Option<&str> {
        self.get("system").and_then(Value::as_str)
    }

    pub fn message(&self) -> Option<&str> {
        self.get("message").and_then(Value::as_str)
    }

    /// Event time from the `time` field (unix seconds, possibly fractional),
    /// or now when it is absent or unusable.
    pub fn time(&self) -> DateTime<Utc> {
        self.get("time")
            .and_then(Value::as_f64)
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .and_then(|secs| {
                let whole = secs.trunc();
                let nanos = ((secs - whole) * 1e9) as u32;
                DateTime::from_timestamp(whole as i64, nanos)
            })
            .unwrap_or_else(Utc::now)
    }

    /// Correlator set explicitly by the caller: `sessionid` first, then the
    /// `sessionno` the front end uses on connection events. Integers and
    /// decimal strings are both accepted.
    pub fn explicit_correlator(&self) -> Option<Correlator> {
        ["sessionid", "sessionno"]
            .into_iter()
            .find_map(|key| self.get(key).and_then(correlator_value))
    }

    /// Tie this event to `correlator` regardless of its log prefix.
    pub fn set_correlator(&mut self, correlator: Correlator) {
        if let Value::Object(map) = &mut self.0 {
            map.insert("sessionid".to_string(), Value::from(correlator.0));
        }
    }

    /// Deserialize the subset of fields `T` declares, ignoring the rest.
    pub fn deserialize_fields<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.0)
    }
}

fn correlator_value(value: &Value) -> Option<Correlator> {
    match value {
        Value::Number(n) => n.as_u64().map(Correlator),
        Value::String(s) => s.parse::<u64>().ok().map(Correlator),
        _ => None,
    }
}

/// Extracts the correlator from the front end's log prefix,
/// `...<TransportClass>,<digits>,<ip-literal>`.
#[derive(Debug, Clone)]
pub struct CorrelatorPattern {
    regex: Regex,
}

impl CorrelatorPattern {
    pub fn new(transport_class: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!(
            r"^.*{},([0-9]+),[0-9A-Fa-f.:]+$",
            regex::escape(transport_class)
        ))?;
        Ok(Self { regex })
    }

    pub fn extract(&self, system: &str) -> Option<Correlator> {
        let caps = self.regex.captures(system)?;
        caps.get(1)?.as_str().parse::<u64>().ok().map(Correlator)
    }
}
