//! Event taxonomy.
//!
//! The closed catalog of audit events the front end may report, the typed
//! payload each of them carries, and a thin accessor over the raw JSON
//! object the front end actually emits.

pub mod kind;
pub mod payload;
pub mod raw_event;

pub use kind::EventKind;
pub use payload::{
    ClientVersion, CommandInput, ConnectionLost, Event, FileDownload, ForwardRequest, Input,
    LoginAttempt, Payload, SessionCreated, TerminalSize, TtyOpened,
};
pub use raw_event::{CorrelatorPattern, RawEvent};
