use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier the front end assigns to one connection. Only unique while
/// that connection lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Correlator(pub u64);

impl fmt::Display for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One honeypot-attacker interaction.
///
/// Identity fields are fixed at creation; sinks only ever see shared
/// references to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub correlator: Correlator,
    /// 32 lowercase hex digits, stable for external systems.
    pub durable_id: String,
    pub peer_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub sensor: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        correlator: Correlator,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
        sensor: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            correlator,
            durable_id: Uuid::new_v4().simple().to_string(),
            peer_addr,
            local_addr,
            sensor,
            created_at,
        }
    }
}
