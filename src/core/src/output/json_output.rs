use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::PathBuf;

use log::{debug, error, info};
use serde::Serialize;

use crate::configuration::JsonOutputConfig;
use crate::error_handling::types::SinkError;
use crate::event_taxonomy::{
    ClientVersion, CommandInput, ConnectionLost, EventKind, FileDownload, ForwardRequest, Input,
    LoginAttempt, SessionCreated, TerminalSize, TtyOpened,
};
use crate::output::output_trait::{sink_settings, EventContext, OutputSink};

pub const NAME: &str = "json";

/// One line of the log file.
#[derive(Serialize)]
struct LogEntry<'a, P: Serialize> {
    eventid: &'static str,
    #[serde(flatten)]
    payload: &'a P,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    session: &'a str,
    sensor: &'a str,
    timestamp: String,
}

/// Appends every event as one JSON document per line.
///
/// The file is opened in append mode and flushed after each line, so a crash
/// loses at most the event being written.
#[derive(Debug, Default)]
pub struct JsonOutput {
    logfile: Option<PathBuf>,
    writer: Option<LineWriter<File>>,
    written: u64,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written since start.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn write<P: Serialize>(
        &mut self,
        ctx: &EventContext<'_>,
        kind: EventKind,
        payload: &P,
        message: Option<&str>,
    ) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::NotStarted)?;
        let entry = LogEntry {
            eventid: kind.event_id(),
            payload,
            message,
            session: &ctx.session.durable_id,
            sensor: &ctx.session.sensor,
            timestamp: ctx.timestamp(),
        };
        // whole line or nothing, so a failed record never merges into the next
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        writer.write_all(&line)?;
        writer.flush()?;
        self.written += 1;
        Ok(())
    }
}

impl OutputSink for JsonOutput {
    fn name(&self) -> &str {
        NAME
    }

    fn start(&mut self, config: &toml::Table) -> Result<(), SinkError> {
        let settings: JsonOutputConfig = sink_settings(NAME, config)?;
        if let Some(parent) = settings.logfile.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    error!("Failed to create log dir {}: {}", parent.display(), e);
                    SinkError::Io(e)
                })?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&settings.logfile)
            .map_err(|e| {
                error!("Open append failed {}: {}", settings.logfile.display(), e);
                SinkError::Io(e)
            })?;
        info!("JSON output writing to {}", settings.logfile.display());
        self.writer = Some(LineWriter::new(file));
        self.logfile = Some(settings.logfile);
        self.written = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            debug!(
                "JSON output closed {} after {} line(s)",
                self.logfile
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
                self.written
            );
        }
        Ok(())
    }

    fn on_session_created(&mut self, ctx: &EventContext<'_>) -> Result<(), SinkError> {
        let peer = ctx.session.peer_addr;
        let local = ctx.session.local_addr;
        let opened = SessionCreated {
            src_ip: peer.ip(),
            src_port: peer.port(),
            dst_ip: local.ip(),
            dst_port: local.port(),
        };
        let message = format!("New connection: {}:{}", peer.ip(), peer.port());
        self.write(ctx, EventKind::SessionCreated, &opened, Some(&message))
    }

    fn on_login_success(
        &mut self,
        ctx: &EventContext<'_>,
        event: &LoginAttempt,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::LoginSuccess, event, ctx.message)
    }

    fn on_login_failure(
        &mut self,
        ctx: &EventContext<'_>,
        event: &LoginAttempt,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::LoginFailure, event, ctx.message)
    }

    fn on_tty_opened(
        &mut self,
        ctx: &EventContext<'_>,
        event: &TtyOpened,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::TtyOpened, event, ctx.message)
    }

    fn on_command(
        &mut self,
        ctx: &EventContext<'_>,
        event: &CommandInput,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::Command, event, ctx.message)
    }

    fn on_unknown_command(
        &mut self,
        ctx: &EventContext<'_>,
        event: &CommandInput,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::UnknownCommand, event, ctx.message)
    }

    fn on_file_download(
        &mut self,
        ctx: &EventContext<'_>,
        event: &FileDownload,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::FileDownload, event, ctx.message)
    }

    fn on_input(&mut self, ctx: &EventContext<'_>, event: &Input) -> Result<(), SinkError> {
        self.write(ctx, EventKind::Input, event, ctx.message)
    }

    fn on_client_version(
        &mut self,
        ctx: &EventContext<'_>,
        event: &ClientVersion,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::ClientVersion, event, ctx.message)
    }

    fn on_terminal_size(
        &mut self,
        ctx: &EventContext<'_>,
        event: &TerminalSize,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::TerminalSize, event, ctx.message)
    }

    fn on_connection_lost(
        &mut self,
        ctx: &EventContext<'_>,
        event: &ConnectionLost,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::ConnectionLost, event, ctx.message)
    }

    fn on_forward_request(
        &mut self,
        ctx: &EventContext<'_>,
        event: &ForwardRequest,
    ) -> Result<(), SinkError> {
        self.write(ctx, EventKind::ForwardRequest, event, ctx.message)
    }
}
