use std::fmt;

use serde::{Deserialize, Serialize};

/// Every event kind the front end can emit.
///
/// The wire identifier (`KIPP0001` ...) is what appears in the raw event's
/// `eventid` field; the variant is what the rest of the crate matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    SessionCreated,
    LoginSuccess,
    LoginFailure,
    TtyOpened,
    Command,
    UnknownCommand,
    FileDownload,
    Input,
    ClientVersion,
    TerminalSize,
    ConnectionLost,
    ForwardRequest,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::SessionCreated,
        EventKind::LoginSuccess,
        EventKind::LoginFailure,
        EventKind::TtyOpened,
        EventKind::Command,
        EventKind::UnknownCommand,
        EventKind::FileDownload,
        EventKind::Input,
        EventKind::ClientVersion,
        EventKind::TerminalSize,
        EventKind::ConnectionLost,
        EventKind::ForwardRequest,
    ];

    /// Wire identifier written in `eventid`.
    pub fn event_id(self) -> &'static str {
        match self {
            EventKind::SessionCreated => "KIPP0001",
            EventKind::LoginSuccess => "KIPP0002",
            EventKind::LoginFailure => "KIPP0003",
            EventKind::TtyOpened => "KIPP0004",
            EventKind::Command => "KIPP0005",
            EventKind::UnknownCommand => "KIPP0006",
            EventKind::FileDownload => "KIPP0007",
            EventKind::Input => "KIPP0008",
            EventKind::ClientVersion => "KIPP0009",
            EventKind::TerminalSize => "KIPP0010",
            EventKind::ConnectionLost => "KIPP0011",
            EventKind::ForwardRequest => "KIPP0012",
        }
    }

    /// Resolve a wire identifier. Older front ends wrote the id with a dash
    /// (`KIPP-0005`), so both spellings are accepted.
    pub fn from_event_id(id: &str) -> Option<Self> {
        let digits = id.strip_prefix("KIPP")?;
        let digits = digits.strip_prefix('-').unwrap_or(digits);
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::ALL
            .into_iter()
            .find(|kind| &kind.event_id()[4..] == digits)
    }

    /// Fields the raw event must carry for this kind.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            EventKind::SessionCreated => &["src_ip", "src_port", "dst_ip", "dst_port"],
            EventKind::LoginSuccess | EventKind::LoginFailure => &["username", "password"],
            EventKind::TtyOpened => &["logfile"],
            EventKind::Command | EventKind::UnknownCommand => &["input"],
            EventKind::FileDownload => &["url", "outfile"],
            EventKind::Input => &["realm", "input"],
            EventKind::ClientVersion => &["version"],
            EventKind::TerminalSize => &["width", "height"],
            EventKind::ConnectionLost => &[],
            EventKind::ForwardRequest => &["dst_ip", "dst_port"],
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            EventKind::SessionCreated => "SESSION_CREATED",
            EventKind::LoginSuccess => "LOGIN_SUCCESS",
            EventKind::LoginFailure => "LOGIN_FAILURE",
            EventKind::TtyOpened => "TTY_OPENED",
            EventKind::Command => "COMMAND",
            EventKind::UnknownCommand => "UNKNOWN_COMMAND",
            EventKind::FileDownload => "FILE_DOWNLOAD",
            EventKind::Input => "INPUT",
            EventKind::ClientVersion => "CLIENT_VERSION",
            EventKind::TerminalSize => "TERMINAL_SIZE",
            EventKind::ConnectionLost => "CONNECTION_LOST",
            EventKind::ForwardRequest => "TCP_FORWARD_REQUEST",
        };
        f.write_str(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_event_ids_are_unique_and_resolve_back() {
        let ids: HashSet<&str> = EventKind::ALL.iter().map(|k| k.event_id()).collect();
        assert_eq!(ids.len(), EventKind::ALL.len());
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_event_id(kind.event_id()), Some(kind));
        }
    }

    #[test]
    fn test_dashed_ids_are_accepted() {
        assert_eq!(EventKind::from_event_id("KIPP-0005"), Some(EventKind::Command));
        assert_eq!(EventKind::from_event_id("KIPP-0011"), Some(EventKind::ConnectionLost));
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        assert_eq!(EventKind::from_event_id("KIPP0013"), None);
        assert_eq!(EventKind::from_event_id("KIPP0000"), None);
        assert_eq!(EventKind::from_event_id("COW0001"), None);
        assert_eq!(EventKind::from_event_id("KIPP00011"), None);
        assert_eq!(EventKind::from_event_id(""), None);
    }

    #[test]
    fn test_connection_lost_requires_nothing() {
        assert!(EventKind::ConnectionLost.required_fields().is_empty());
        assert_eq!(
            EventKind::SessionCreated.required_fields(),
            &["src_ip", "src_port", "dst_ip", "dst_port"]
        );
    }
}
