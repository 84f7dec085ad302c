use std::fmt;

use crate::event_taxonomy::EventKind;
use crate::session_management::Correlator;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidValue(String),
    UnknownOutput(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
            ConfigError::UnknownOutput(e) => write!(f, "Unknown output backend: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// A recognized event kind that does not carry the fields its kind requires.
///
/// This is a contract violation between the front end and the router, never
/// a routine runtime condition, so it is always surfaced to the caller.
#[derive(Debug)]
pub enum EventError {
    MalformedPayload { kind: EventKind, reason: String },
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::MalformedPayload { kind, reason } => write!(
                f,
                "Malformed {} ({}) payload: {}",
                kind,
                kind.event_id(),
                reason
            ),
        }
    }
}

impl std::error::Error for EventError {}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    DuplicateSession(Correlator),
    NotFound(Correlator),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::DuplicateSession(c) => {
                write!(f, "Session already exists for correlator {}", c)
            }
            SessionError::NotFound(c) => write!(f, "No session for correlator {}", c),
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug)]
pub enum TtyLogError {
    NotRecorded(String),
    Io(std::io::Error),
}

impl fmt::Display for TtyLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtyLogError::NotRecorded(id) => write!(f, "No tty log recorded for session {}", id),
            TtyLogError::Io(e) => write!(f, "TTY log IO error: {}", e),
        }
    }
}

impl std::error::Error for TtyLogError {}

impl From<std::io::Error> for TtyLogError {
    fn from(err: std::io::Error) -> Self {
        TtyLogError::Io(err)
    }
}

#[derive(Debug)]
pub enum SinkError {
    NotStarted,
    Config(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::NotStarted => write!(f, "Output sink used before start"),
            SinkError::Config(e) => write!(f, "Output sink configuration error: {}", e),
            SinkError::Io(e) => write!(f, "Output sink IO error: {}", e),
            SinkError::Serialization(e) => write!(f, "Output sink serialization error: {}", e),
            SinkError::Database(e) => write!(f, "Output sink database error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        SinkError::Io(err)
    }
}

impl From<serde_json::Error> for SinkError {
    fn from(err: serde_json::Error) -> Self {
        SinkError::Serialization(err)
    }
}

impl From<sea_orm::DbErr> for SinkError {
    fn from(err: sea_orm::DbErr) -> Self {
        SinkError::Database(err.to_string())
    }
}

#[derive(Debug)]
pub enum RouterError {
    Event(EventError),
    Session(SessionError),
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::Event(e) => write!(f, "Event contract violation: {}", e),
            RouterError::Session(e) => write!(f, "Session error: {}", e),
        }
    }
}

impl std::error::Error for RouterError {}

impl From<EventError> for RouterError {
    fn from(err: EventError) -> Self {
        RouterError::Event(err)
    }
}

impl From<SessionError> for RouterError {
    fn from(err: SessionError) -> Self {
        RouterError::Session(err)
    }
}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    SinkError(String, SinkError),
    RouterError(RouterError),
    IoError(std::io::Error),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::SinkError(name, e) => write!(f, "Output '{}' error: {}", name, e),
            ControllerError::RouterError(e) => write!(f, "Router error: {}", e),
            ControllerError::IoError(e) => write!(f, "Input IO error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}

impl From<RouterError> for ControllerError {
    fn from(err: RouterError) -> Self {
        ControllerError::RouterError(err)
    }
}

impl From<std::io::Error> for ControllerError {
    fn from(err: std::io::Error) -> Self {
        ControllerError::IoError(err)
    }
}
