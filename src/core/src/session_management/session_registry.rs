use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::session::{Correlator, Session};
use crate::error_handling::types::SessionError;
use crate::event_taxonomy::SessionCreated;

/// The structure owning every live session
///
/// Maps the front end's correlators to `Session` values. A correlator maps to
/// at most one session; several correlators may alias the same session when an
/// internal caller binds one explicitly with [`SessionRegistry::alias`].
///
/// The registry holds no lock of its own. It is owned by the event router,
/// and whoever shares the router serializes access to it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<Correlator, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the session for `correlator`.
    ///
    /// A second creation for a live correlator is rejected rather than
    /// replacing the first session.
    pub fn create(
        &mut self,
        correlator: Correlator,
        fields: &SessionCreated,
        sensor: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Session, SessionError> {
        if self.sessions.contains_key(&correlator) {
            return Err(SessionError::DuplicateSession(correlator));
        }
        let session = Session::new(
            correlator,
            SocketAddr::new(fields.src_ip, fields.src_port),
            SocketAddr::new(fields.dst_ip, fields.dst_port),
            sensor.to_string(),
            created_at,
        );
        info!(
            "[{}] Session created for correlator {} from {}",
            session.durable_id, correlator, session.peer_addr
        );
        self.sessions.insert(correlator, session.clone());
        Ok(session)
    }

    pub fn lookup(&self, correlator: Correlator) -> Result<&Session, SessionError> {
        self.sessions
            .get(&correlator)
            .ok_or(SessionError::NotFound(correlator))
    }

    pub fn contains(&self, correlator: Correlator) -> bool {
        self.sessions.contains_key(&correlator)
    }

    /// Bind another correlator to an existing session.
    ///
    /// The router never aliases on its own. This is for embedding front ends
    /// that renumber a transport mid-session and want later events under the
    /// new correlator to land on the same session; connection loss on either
    /// correlator closes both.
    pub fn alias(&mut self, correlator: Correlator, session: &Session) -> Result<(), SessionError> {
        if self.sessions.contains_key(&correlator) {
            return Err(SessionError::DuplicateSession(correlator));
        }
        debug!(
            "[{}] Correlator {} aliased to session",
            session.durable_id, correlator
        );
        self.sessions.insert(correlator, session.clone());
        Ok(())
    }

    /// Removing an unknown correlator is a no-op.
    pub fn remove(&mut self, correlator: Correlator) -> Option<Session> {
        self.sessions.remove(&correlator)
    }

    /// Drop every correlator that points at `session`. Returns how many went.
    pub fn remove_all_for_session(&mut self, session: &Session) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, live| live.durable_id != session.durable_id);
        let removed = before - self.sessions.len();
        debug!(
            "[{}] Removed {} correlator(s) for session",
            session.durable_id, removed
        );
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Correlator, &Session)> {
        self.sessions.iter()
    }
}
