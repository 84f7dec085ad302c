//! Session management core module.
//!
//! This module provides the `Session` entity and the registry that maps the
//! front end's volatile correlators to live sessions.

/// Submodule for session data structures.
pub mod session;
/// Submodule for the correlator to session registry.
pub mod session_registry;

pub use session::{Correlator, Session};
pub use session_registry::SessionRegistry;
