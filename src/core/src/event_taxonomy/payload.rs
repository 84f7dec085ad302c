//! Typed payloads, one per taxonomy entry.
//!
//! Each struct names exactly the fields its kind requires; anything else the
//! front end put in the raw object is ignored. Deserialization is where a
//! missing field turns into a contract violation.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::kind::EventKind;
use super::raw_event::RawEvent;
use crate::error_handling::types::EventError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_ip: IpAddr,
    pub dst_port: u16,
}

/// Credentials offered during authentication, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginAttempt {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TtyOpened {
    pub logfile: String,
}

/// Shell input line, recognized or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandInput {
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDownload {
    pub url: String,
    pub outfile: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub realm: String,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientVersion {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionLost {}

/// direct-tcpip forwarding request. The originator is optional because not
/// every transport reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardRequest {
    pub dst_ip: IpAddr,
    pub dst_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    SessionCreated(SessionCreated),
    LoginSuccess(LoginAttempt),
    LoginFailure(LoginAttempt),
    TtyOpened(TtyOpened),
    Command(CommandInput),
    UnknownCommand(CommandInput),
    FileDownload(FileDownload),
    Input(Input),
    ClientVersion(ClientVersion),
    TerminalSize(TerminalSize),
    ConnectionLost(ConnectionLost),
    ForwardRequest(ForwardRequest),
}

impl Payload {
    /// Build the payload for `kind` out of the raw event's fields.
    pub fn parse(kind: EventKind, raw: &RawEvent) -> Result<Self, EventError> {
        Ok(match kind {
            EventKind::SessionCreated => Payload::SessionCreated(fields(kind, raw)?),
            EventKind::LoginSuccess => Payload::LoginSuccess(fields(kind, raw)?),
            EventKind::LoginFailure => Payload::LoginFailure(fields(kind, raw)?),
            EventKind::TtyOpened => Payload::TtyOpened(fields(kind, raw)?),
            EventKind::Command => Payload::Command(fields(kind, raw)?),
            EventKind::UnknownCommand => Payload::UnknownCommand(fields(kind, raw)?),
            EventKind::FileDownload => Payload::FileDownload(fields(kind, raw)?),
            EventKind::Input => Payload::Input(fields(kind, raw)?),
            EventKind::ClientVersion => Payload::ClientVersion(fields(kind, raw)?),
            EventKind::TerminalSize => Payload::TerminalSize(fields(kind, raw)?),
            EventKind::ConnectionLost => Payload::ConnectionLost(ConnectionLost {}),
            EventKind::ForwardRequest => Payload::ForwardRequest(fields(kind, raw)?),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Payload::SessionCreated(_) => EventKind::SessionCreated,
            Payload::LoginSuccess(_) => EventKind::LoginSuccess,
            Payload::LoginFailure(_) => EventKind::LoginFailure,
            Payload::TtyOpened(_) => EventKind::TtyOpened,
            Payload::Command(_) => EventKind::Command,
            Payload::UnknownCommand(_) => EventKind::UnknownCommand,
            Payload::FileDownload(_) => EventKind::FileDownload,
            Payload::Input(_) => EventKind::Input,
            Payload::ClientVersion(_) => EventKind::ClientVersion,
            Payload::TerminalSize(_) => EventKind::TerminalSize,
            Payload::ConnectionLost(_) => EventKind::ConnectionLost,
            Payload::ForwardRequest(_) => EventKind::ForwardRequest,
        }
    }
}

fn fields<T: DeserializeOwned>(kind: EventKind, raw: &RawEvent) -> Result<T, EventError> {
    raw.deserialize_fields().map_err(|e| EventError::MalformedPayload {
        kind,
        reason: e.to_string(),
    })
}

/// A classified event: when it happened, the optional human-readable line
/// the front end attached, and its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub time: DateTime<Utc>,
    pub message: Option<String>,
    pub payload: Payload,
}

impl Event {
    pub fn from_raw(kind: EventKind, raw: &RawEvent) -> Result<Self, EventError> {
        Ok(Self {
            time: raw.time(),
            message: raw.message().map(str::to_owned),
            payload: Payload::parse(kind, raw)?,
        })
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}
