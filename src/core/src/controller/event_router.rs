//! Event routing.
//!
//! `EventRouter::emit` is the one entry point for raw events. It drops what
//! is not part of the audit stream, ties everything else to a session through
//! its correlator, and hands the classified event to every attached output.
//!
//! Drops are silent by design of the front end: diagnostic lines, events
//! without a known id or correlator, and events for sessions the registry
//! does not (or no longer) know are routine. A recognized event that lacks a
//! required field, or a second creation for a live correlator, is a bug
//! upstream and comes back as an error.

use log::{debug, error, trace};

use crate::data_capture::TtyLogStore;
use crate::error_handling::types::{RouterError, SinkError, TtyLogError};
use crate::event_taxonomy::{CorrelatorPattern, Event, EventKind, Payload, RawEvent};
use crate::output::{EventContext, OutputSink, SinkFailure};
use crate::session_management::{Correlator, Session, SessionRegistry};

/// Why an event was not delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// stdout/stderr passthrough
    Printed,
    MissingEventId,
    UnknownEventId(String),
    /// Neither an explicit session id nor a `system` prefix.
    NoCorrelator,
    /// `system` prefix present but not in the transport's format.
    UnmatchedSystem(String),
    UnknownSession(Correlator),
}

/// Result of routing one event.
#[derive(Debug)]
pub enum Outcome {
    Delivered {
        kind: EventKind,
        session: String,
        sinks: usize,
        failures: Vec<SinkFailure>,
    },
    Dropped(DropReason),
}

impl Outcome {
    pub fn is_dropped(&self) -> bool {
        matches!(self, Outcome::Dropped(_))
    }
}

/// Correlates raw events to sessions and dispatches them.
///
/// The session registry and the TTY log store are owned here and nowhere
/// else; outputs only ever see them through a read-only [`EventContext`].
/// Every mutating method takes `&mut self`, so concurrent producers have to
/// share the router behind a single lock.
pub struct EventRouter {
    sensor: String,
    pattern: CorrelatorPattern,
    sessions: SessionRegistry,
    tty_logs: TtyLogStore,
    sinks: Vec<Box<dyn OutputSink>>,
}

impl EventRouter {
    pub fn new<S: Into<String>>(sensor: S, pattern: CorrelatorPattern) -> Self {
        Self {
            sensor: sensor.into(),
            pattern,
            sessions: SessionRegistry::new(),
            tty_logs: TtyLogStore::new(),
            sinks: Vec::new(),
        }
    }

    /// Start `sink` with its configuration table and attach it. A sink that
    /// fails to start is not attached.
    pub fn attach(
        &mut self,
        mut sink: Box<dyn OutputSink>,
        config: &toml::Table,
    ) -> Result<(), SinkError> {
        sink.start(config)?;
        debug!("Output '{}' started and attached", sink.name());
        self.sinks.push(sink);
        Ok(())
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn tty_logs(&self) -> &TtyLogStore {
        &self.tty_logs
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub fn ttylog(&self, session: &Session) -> Result<Vec<u8>, TtyLogError> {
        self.tty_logs.read(session)
    }

    /// Emit `raw` on behalf of an internal caller that knows the correlator
    /// but has no transport log prefix to offer.
    pub fn log_dispatch(
        &mut self,
        correlator: Correlator,
        mut raw: RawEvent,
    ) -> Result<Outcome, RouterError> {
        raw.set_correlator(correlator);
        self.emit(&raw)
    }

    pub fn emit(&mut self, raw: &RawEvent) -> Result<Outcome, RouterError> {
        if raw.is_printed() {
            return Ok(dropped(DropReason::Printed));
        }
        let kind = match raw.event_id() {
            None => return Ok(dropped(DropReason::MissingEventId)),
            Some(id) => match EventKind::from_event_id(id) {
                Some(kind) => kind,
                None => return Ok(dropped(DropReason::UnknownEventId(id.to_string()))),
            },
        };
        let correlator = match self.resolve_correlator(raw) {
            Ok(correlator) => correlator,
            Err(reason) => return Ok(dropped(reason)),
        };

        // Events for sessions the registry does not know are dropped before
        // their payload is looked at; only creation can start a session.
        let known = if kind == EventKind::SessionCreated {
            None
        } else {
            match self.sessions.lookup(correlator) {
                Ok(session) => Some(session.clone()),
                Err(_) => return Ok(dropped(DropReason::UnknownSession(correlator))),
            }
        };

        let event = Event::from_raw(kind, raw).map_err(|e| {
            error!("[{}] {}", correlator, e);
            RouterError::from(e)
        })?;

        let session = match (known, &event.payload) {
            (Some(session), _) => session,
            (None, Payload::SessionCreated(fields)) => self
                .sessions
                .create(correlator, fields, &self.sensor, event.time)
                .map_err(|e| {
                    error!("[{}] {}", correlator, e);
                    RouterError::from(e)
                })?,
            (None, _) => return Ok(dropped(DropReason::UnknownSession(correlator))),
        };

        if let Payload::TtyOpened(opened) = &event.payload {
            self.tty_logs.record(&session, &opened.logfile);
        }

        let ctx = EventContext::new(
            &session,
            event.time,
            event.message.as_deref(),
            &self.tty_logs,
        );
        let failures = dispatch(&mut self.sinks, &ctx, &event.payload);
        trace!(
            "[{}] {} delivered to {} output(s), {} failure(s)",
            session.durable_id,
            kind,
            self.sinks.len(),
            failures.len()
        );

        if kind == EventKind::ConnectionLost {
            self.tty_logs.forget(&session);
            self.sessions.remove_all_for_session(&session);
            debug!("[{}] Session closed", session.durable_id);
        }

        Ok(Outcome::Delivered {
            kind,
            session: session.durable_id,
            sinks: self.sinks.len(),
            failures,
        })
    }

    /// Stop every output. Failures are collected; every output gets stopped.
    pub fn shutdown(&mut self) -> Vec<SinkFailure> {
        let mut failures = Vec::new();
        for sink in self.sinks.iter_mut() {
            if let Err(error) = sink.stop() {
                error!("Output '{}' failed to stop: {}", sink.name(), error);
                failures.push(SinkFailure {
                    sink: sink.name().to_string(),
                    error,
                });
            }
        }
        self.sinks.clear();
        failures
    }

    fn resolve_correlator(&self, raw: &RawEvent) -> Result<Correlator, DropReason> {
        if let Some(correlator) = raw.explicit_correlator() {
            return Ok(correlator);
        }
        match raw.system() {
            None => Err(DropReason::NoCorrelator),
            Some(system) => self
                .pattern
                .extract(system)
                .ok_or_else(|| DropReason::UnmatchedSystem(system.to_string())),
        }
    }
}

fn dropped(reason: DropReason) -> Outcome {
    debug!("Event dropped: {:?}", reason);
    Outcome::Dropped(reason)
}

/// Deliver one event to every sink; a failing sink does not stop the others.
fn dispatch(
    sinks: &mut [Box<dyn OutputSink>],
    ctx: &EventContext<'_>,
    payload: &Payload,
) -> Vec<SinkFailure> {
    let mut failures = Vec::new();
    for sink in sinks.iter_mut() {
        let result = match payload {
            Payload::SessionCreated(_) => sink.on_session_created(ctx),
            Payload::LoginSuccess(p) => sink.on_login_success(ctx, p),
            Payload::LoginFailure(p) => sink.on_login_failure(ctx, p),
            Payload::TtyOpened(p) => sink.on_tty_opened(ctx, p),
            Payload::Command(p) => sink.on_command(ctx, p),
            Payload::UnknownCommand(p) => sink.on_unknown_command(ctx, p),
            Payload::FileDownload(p) => sink.on_file_download(ctx, p),
            Payload::Input(p) => sink.on_input(ctx, p),
            Payload::ClientVersion(p) => sink.on_client_version(ctx, p),
            Payload::TerminalSize(p) => sink.on_terminal_size(ctx, p),
            Payload::ConnectionLost(p) => sink.on_connection_lost(ctx, p),
            Payload::ForwardRequest(p) => sink.on_forward_request(ctx, p),
        };
        if let Err(error) = result {
            error!(
                "[{}] Output '{}' failed on {}: {}",
                ctx.session.durable_id,
                sink.name(),
                payload.kind(),
                error
            );
            failures.push(SinkFailure {
                sink: sink.name().to_string(),
                error,
            });
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::types::SessionError;
    use crate::event_taxonomy::raw_event::DEFAULT_TRANSPORT_CLASS;
    use crate::event_taxonomy::{
        ClientVersion, CommandInput, ConnectionLost, FileDownload, ForwardRequest, Input,
        LoginAttempt, TerminalSize, TtyOpened,
    };
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// What a recording sink saw: kind, durable id, interesting payload text.
    type Calls = Arc<Mutex<Vec<(EventKind, String, String)>>>;

    struct RecordingSink {
        name: String,
        calls: Calls,
        fail: bool,
        ttylog_on_close: Arc<Mutex<Option<Vec<u8>>>>,
    }

    impl RecordingSink {
        fn new(name: &str, fail: bool) -> (Self, Calls) {
            let calls = Calls::default();
            let sink = Self {
                name: name.to_string(),
                calls: calls.clone(),
                fail,
                ttylog_on_close: Arc::default(),
            };
            (sink, calls)
        }

        fn record(
            &mut self,
            ctx: &EventContext<'_>,
            kind: EventKind,
            detail: String,
        ) -> Result<(), SinkError> {
            self.calls
                .lock()
                .unwrap()
                .push((kind, ctx.session.durable_id.clone(), detail));
            if self.fail {
                Err(SinkError::Database("backend down".into()))
            } else {
                Ok(())
            }
        }
    }

    impl OutputSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }
        fn start(&mut self, _config: &toml::Table) -> Result<(), SinkError> {
            Ok(())
        }
        fn stop(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
        fn on_session_created(&mut self, ctx: &EventContext<'_>) -> Result<(), SinkError> {
            let peer = ctx.session.peer_addr.to_string();
            self.record(ctx, EventKind::SessionCreated, peer)
        }
        fn on_login_success(
            &mut self,
            ctx: &EventContext<'_>,
            e: &LoginAttempt,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::LoginSuccess, e.username.clone())
        }
        fn on_login_failure(
            &mut self,
            ctx: &EventContext<'_>,
            e: &LoginAttempt,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::LoginFailure, e.username.clone())
        }
        fn on_tty_opened(
            &mut self,
            ctx: &EventContext<'_>,
            e: &TtyOpened,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::TtyOpened, e.logfile.clone())
        }
        fn on_command(
            &mut self,
            ctx: &EventContext<'_>,
            e: &CommandInput,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::Command, e.input.clone())
        }
        fn on_unknown_command(
            &mut self,
            ctx: &EventContext<'_>,
            e: &CommandInput,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::UnknownCommand, e.input.clone())
        }
        fn on_file_download(
            &mut self,
            ctx: &EventContext<'_>,
            e: &FileDownload,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::FileDownload, e.url.clone())
        }
        fn on_input(&mut self, ctx: &EventContext<'_>, e: &Input) -> Result<(), SinkError> {
            self.record(ctx, EventKind::Input, e.input.clone())
        }
        fn on_client_version(
            &mut self,
            ctx: &EventContext<'_>,
            e: &ClientVersion,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::ClientVersion, e.version.clone())
        }
        fn on_terminal_size(
            &mut self,
            ctx: &EventContext<'_>,
            e: &TerminalSize,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::TerminalSize, format!("{}x{}", e.width, e.height))
        }
        fn on_connection_lost(
            &mut self,
            ctx: &EventContext<'_>,
            _e: &ConnectionLost,
        ) -> Result<(), SinkError> {
            *self.ttylog_on_close.lock().unwrap() = ctx.ttylog().ok();
            self.record(ctx, EventKind::ConnectionLost, String::new())
        }
        fn on_forward_request(
            &mut self,
            ctx: &EventContext<'_>,
            e: &ForwardRequest,
        ) -> Result<(), SinkError> {
            self.record(ctx, EventKind::ForwardRequest, e.dst_port.to_string())
        }
    }

    fn router() -> EventRouter {
        EventRouter::new("test-sensor", CorrelatorPattern::new(DEFAULT_TRANSPORT_CLASS).unwrap())
    }

    fn router_with_sink() -> (EventRouter, Calls) {
        let mut router = router();
        let (sink, calls) = RecordingSink::new("recording", false);
        router.attach(Box::new(sink), &toml::Table::new()).unwrap();
        (router, calls)
    }

    fn raw(value: serde_json::Value) -> RawEvent {
        RawEvent::from_value(value).unwrap()
    }

    fn created(sessionno: u64) -> RawEvent {
        raw(json!({
            "eventid": "KIPP0001",
            "sessionno": sessionno,
            "src_ip": "10.0.0.5", "src_port": 4444,
            "dst_ip": "10.0.0.1", "dst_port": 22,
            "time": 1_425_211_200
        }))
    }

    fn system(correlator: u64) -> String {
        format!("SSHChannel session (0) on SSHService ssh-connection on HoneyPotTransport,{},10.0.0.5", correlator)
    }

    #[test]
    fn test_session_created_registers_and_notifies() {
        let (mut router, calls) = router_with_sink();
        let outcome = router.emit(&created(1)).unwrap();
        assert!(matches!(
            outcome,
            Outcome::Delivered { kind: EventKind::SessionCreated, sinks: 1, .. }
        ));

        let session = router.sessions().lookup(Correlator(1)).unwrap().clone();
        assert_eq!(router.sessions().len(), 1);
        assert_eq!(session.peer_addr, "10.0.0.5:4444".parse().unwrap());
        assert_eq!(session.local_addr, "10.0.0.1:22".parse().unwrap());
        assert_eq!(session.sensor, "test-sensor");
        assert_eq!(session.created_at.timestamp(), 1_425_211_200);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, EventKind::SessionCreated);
        assert_eq!(calls[0].1, session.durable_id);
    }

    #[test]
    fn test_command_reaches_sink_once() {
        let (mut router, calls) = router_with_sink();
        router.emit(&created(1)).unwrap();
        let durable = router.sessions().lookup(Correlator(1)).unwrap().durable_id.clone();

        let outcome = router
            .emit(&raw(json!({"eventid": "KIPP0005", "system": system(1), "input": "ls -la"})))
            .unwrap();
        assert!(!outcome.is_dropped());

        let calls = calls.lock().unwrap();
        let commands: Vec<_> = calls.iter().filter(|c| c.0 == EventKind::Command).collect();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].1, durable);
        assert_eq!(commands[0].2, "ls -la");
    }

    #[test]
    fn test_unknown_correlator_is_dropped_silently() {
        let (mut router, calls) = router_with_sink();
        let outcome = router
            .emit(&raw(json!({"eventid": "KIPP0005", "system": system(77), "input": "ls"})))
            .unwrap();
        match outcome {
            Outcome::Dropped(DropReason::UnknownSession(c)) => assert_eq!(c, Correlator(77)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_filtered_events_touch_nothing() {
        let (mut router, calls) = router_with_sink();
        router.emit(&created(1)).unwrap();
        calls.lock().unwrap().clear();

        let cases = vec![
            (
                json!({"printed": 1, "eventid": "KIPP0005", "sessionid": 1, "input": "x"}),
                DropReason::Printed,
            ),
            (json!({"sessionid": 1, "message": "hello"}), DropReason::MissingEventId),
            (
                json!({"eventid": "KIPP0099", "sessionid": 1}),
                DropReason::UnknownEventId("KIPP0099".into()),
            ),
            (
                json!({"eventid": "KIPP0001", "src_ip": "10.0.0.9", "src_port": 1, "dst_ip": "10.0.0.1", "dst_port": 22}),
                DropReason::NoCorrelator,
            ),
            (
                json!({"eventid": "KIPP0005", "system": "HoneyPotSSHFactory", "input": "x"}),
                DropReason::UnmatchedSystem("HoneyPotSSHFactory".into()),
            ),
        ];
        for (value, reason) in cases {
            match router.emit(&raw(value)).unwrap() {
                Outcome::Dropped(got) => assert_eq!(got, reason),
                other => panic!("expected drop {:?}, got {:?}", reason, other),
            }
        }
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(router.sessions().len(), 1);
    }

    #[test]
    fn test_explicit_sessionid_wins_over_system() {
        let (mut router, calls) = router_with_sink();
        router.emit(&created(1)).unwrap();
        router.emit(&created(2)).unwrap();
        let second = router.sessions().lookup(Correlator(2)).unwrap().durable_id.clone();

        router
            .emit(&raw(json!({
                "eventid": "KIPP0008", "sessionid": 2, "system": system(1),
                "realm": "ssh", "input": "typed"
            })))
            .unwrap();
        let calls = calls.lock().unwrap();
        let input = calls.iter().find(|c| c.0 == EventKind::Input).unwrap();
        assert_eq!(input.1, second);
    }

    #[test]
    fn test_duplicate_creation_is_fatal() {
        let (mut router, calls) = router_with_sink();
        let first = router.emit(&created(1)).unwrap();
        let err = router.emit(&created(1)).unwrap_err();
        assert!(matches!(
            err,
            RouterError::Session(SessionError::DuplicateSession(Correlator(1)))
        ));
        assert!(!first.is_dropped());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_required_field_is_fatal() {
        let (mut router, calls) = router_with_sink();
        router.emit(&created(1)).unwrap();
        let err = router
            .emit(&raw(json!({"eventid": "KIPP0002", "sessionid": 1, "username": "root"})))
            .unwrap_err();
        match err {
            RouterError::Event(e) => assert!(e.to_string().contains("password")),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_event_for_closed_session_is_dropped() {
        let (mut router, calls) = router_with_sink();
        router.emit(&created(1)).unwrap();
        router.emit(&raw(json!({"eventid": "KIPP0011", "sessionid": 1}))).unwrap();

        // late line for the closed session, missing its password
        let late = raw(json!({"eventid": "KIPP0002", "sessionid": 1, "username": "root"}));
        match router.emit(&late).unwrap() {
            Outcome::Dropped(DropReason::UnknownSession(c)) => assert_eq!(c, Correlator(1)),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_connection_lost_cleans_up() {
        let dir = TempDir::new().unwrap();
        let tty_path = dir.path().join("20150301-120000-1.log");
        std::fs::write(&tty_path, b"recorded").unwrap();

        let mut router = router();
        let (sink, calls) = RecordingSink::new("recording", false);
        let seen_ttylog = sink.ttylog_on_close.clone();
        router.attach(Box::new(sink), &toml::Table::new()).unwrap();

        router.emit(&created(5)).unwrap();
        let session = router.sessions().lookup(Correlator(5)).unwrap().clone();
        router
            .emit(&raw(json!({
                "eventid": "KIPP0004", "sessionid": 5,
                "logfile": tty_path.display().to_string()
            })))
            .unwrap();
        assert_eq!(router.ttylog(&session).unwrap(), b"recorded");

        let lost = raw(json!({"eventid": "KIPP0011", "system": system(5)}));
        assert!(!router.emit(&lost).unwrap().is_dropped());
        // sinks still saw the recording while handling the loss
        assert_eq!(seen_ttylog.lock().unwrap().as_deref(), Some(&b"recorded"[..]));

        assert!(router.sessions().lookup(Correlator(5)).is_err());
        assert!(router.tty_logs().path(&session).is_none());
        assert!(router.tty_logs().is_empty());

        // a second loss for the absent correlator is a silent no-op
        match router.emit(&lost).unwrap() {
            Outcome::Dropped(DropReason::UnknownSession(_)) => {}
            other => panic!("unexpected outcome {:?}", other),
        }
        let kinds: Vec<EventKind> = calls.lock().unwrap().iter().map(|c| c.0).collect();
        assert_eq!(
            kinds,
            vec![EventKind::SessionCreated, EventKind::TtyOpened, EventKind::ConnectionLost]
        );
    }

    #[test]
    fn test_connection_lost_removes_aliases() {
        let (mut router, _calls) = router_with_sink();
        router.emit(&created(1)).unwrap();
        let session = router.sessions().lookup(Correlator(1)).unwrap().clone();
        router.sessions.alias(Correlator(100), &session).unwrap();

        router
            .log_dispatch(Correlator(100), raw(json!({"eventid": "KIPP0011"})))
            .unwrap();
        assert!(router.sessions().is_empty());
    }

    #[test]
    fn test_correlator_can_be_reused_after_loss() {
        let (mut router, _calls) = router_with_sink();
        router.emit(&created(1)).unwrap();
        let first = router.sessions().lookup(Correlator(1)).unwrap().durable_id.clone();
        router.emit(&raw(json!({"eventid": "KIPP0011", "sessionid": 1}))).unwrap();
        router.emit(&created(1)).unwrap();
        let second = router.sessions().lookup(Correlator(1)).unwrap().durable_id.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let mut router = router();
        let (broken, broken_calls) = RecordingSink::new("broken", true);
        let (healthy, healthy_calls) = RecordingSink::new("healthy", false);
        router.attach(Box::new(broken), &toml::Table::new()).unwrap();
        router.attach(Box::new(healthy), &toml::Table::new()).unwrap();

        router.emit(&created(1)).unwrap();
        let outcome = router
            .emit(&raw(json!({"eventid": "KIPP0006", "sessionid": 1, "input": "wget"})))
            .unwrap();
        match outcome {
            Outcome::Delivered { sinks, failures, .. } => {
                assert_eq!(sinks, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].sink, "broken");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(broken_calls.lock().unwrap().len(), 2);
        assert_eq!(healthy_calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_events_arrive_in_order() {
        let (mut router, calls) = router_with_sink();
        router.emit(&created(1)).unwrap();
        for (i, cmd) in ["id", "uname -a", "cat /etc/passwd"].iter().enumerate() {
            router
                .emit(&raw(json!({"eventid": "KIPP0005", "sessionid": 1, "input": cmd, "time": i})))
                .unwrap();
        }
        let seen: Vec<String> = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.0 == EventKind::Command)
            .map(|c| c.2.clone())
            .collect();
        assert_eq!(seen, vec!["id", "uname -a", "cat /etc/passwd"]);
    }

    #[test]
    fn test_shutdown_stops_and_detaches() {
        let (mut router, _calls) = router_with_sink();
        assert_eq!(router.sink_count(), 1);
        assert!(router.shutdown().is_empty());
        assert_eq!(router.sink_count(), 0);
    }
}
