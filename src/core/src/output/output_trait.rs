//! Output Trait
//!
//! This module defines the `OutputSink` trait implemented by every output
//! backend (files, databases, alerting), and the read-only context the router
//! hands to it with each event.
//!
//! Implementors of this trait are responsible for:
//! - Setting up their backend in `start`, before the first event arrives
//! - Recording or forwarding each classified event
//! - Flushing and releasing their handles in `stop`
//!
//! The trait has no default method bodies: a backend that forgets a handler
//! does not compile.

use chrono::{DateTime, Utc};

use crate::data_capture::TtyLogStore;
use crate::error_handling::types::{SinkError, TtyLogError};
use crate::event_taxonomy::{
    ClientVersion, CommandInput, ConnectionLost, FileDownload, ForwardRequest, Input,
    LoginAttempt, TerminalSize, TtyOpened,
};
use crate::session_management::Session;

/// What a sink gets to know about an event besides its payload.
///
/// Only shared references: sinks can look at the session and read its
/// terminal recording, never change either.
pub struct EventContext<'a> {
    pub session: &'a Session,
    pub time: DateTime<Utc>,
    pub message: Option<&'a str>,
    tty_logs: &'a TtyLogStore,
}

impl<'a> EventContext<'a> {
    pub fn new(
        session: &'a Session,
        time: DateTime<Utc>,
        message: Option<&'a str>,
        tty_logs: &'a TtyLogStore,
    ) -> Self {
        Self {
            session,
            time,
            message,
            tty_logs,
        }
    }

    /// ISO8601 UTC event time with a trailing `Z`.
    pub fn timestamp(&self) -> String {
        self.time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }

    /// The session's terminal recording, bounded.
    pub fn ttylog(&self) -> Result<Vec<u8>, TtyLogError> {
        self.tty_logs.read(self.session)
    }

    pub fn has_ttylog(&self) -> bool {
        self.tty_logs.path(self.session).is_some()
    }
}

/// The `OutputSink` trait defines the interface for output backends.
///
/// All handlers return a `Result`; the router logs failures and keeps
/// delivering the event to the remaining sinks.
pub trait OutputSink: Send {
    /// Backend name, as used for its `[output.<name>]` table.
    fn name(&self) -> &str;

    /// Connects the backend using its own configuration table.
    fn start(&mut self, config: &toml::Table) -> Result<(), SinkError>;

    /// Flushes and closes every long-lived handle.
    fn stop(&mut self) -> Result<(), SinkError>;

    /// A new session entered the registry.
    fn on_session_created(&mut self, ctx: &EventContext<'_>) -> Result<(), SinkError>;

    fn on_login_success(
        &mut self,
        ctx: &EventContext<'_>,
        event: &LoginAttempt,
    ) -> Result<(), SinkError>;

    fn on_login_failure(
        &mut self,
        ctx: &EventContext<'_>,
        event: &LoginAttempt,
    ) -> Result<(), SinkError>;

    fn on_tty_opened(&mut self, ctx: &EventContext<'_>, event: &TtyOpened)
        -> Result<(), SinkError>;

    fn on_command(&mut self, ctx: &EventContext<'_>, event: &CommandInput)
        -> Result<(), SinkError>;

    fn on_unknown_command(
        &mut self,
        ctx: &EventContext<'_>,
        event: &CommandInput,
    ) -> Result<(), SinkError>;

    fn on_file_download(
        &mut self,
        ctx: &EventContext<'_>,
        event: &FileDownload,
    ) -> Result<(), SinkError>;

    fn on_input(&mut self, ctx: &EventContext<'_>, event: &Input) -> Result<(), SinkError>;

    fn on_client_version(
        &mut self,
        ctx: &EventContext<'_>,
        event: &ClientVersion,
    ) -> Result<(), SinkError>;

    fn on_terminal_size(
        &mut self,
        ctx: &EventContext<'_>,
        event: &TerminalSize,
    ) -> Result<(), SinkError>;

    /// The session is about to leave the registry; its recording is still
    /// readable through `ctx` during this call.
    fn on_connection_lost(
        &mut self,
        ctx: &EventContext<'_>,
        event: &ConnectionLost,
    ) -> Result<(), SinkError>;

    fn on_forward_request(
        &mut self,
        ctx: &EventContext<'_>,
        event: &ForwardRequest,
    ) -> Result<(), SinkError>;
}

/// A handler that failed during one dispatch.
#[derive(Debug)]
pub struct SinkFailure {
    pub sink: String,
    pub error: SinkError,
}

/// Deserialize a backend's settings out of its opaque configuration table.
pub fn sink_settings<T: serde::de::DeserializeOwned>(
    name: &str,
    config: &toml::Table,
) -> Result<T, SinkError> {
    toml::Value::Table(config.clone())
        .try_into()
        .map_err(|e| SinkError::Config(format!("[output.{}] {}", name, e)))
}
