//! Controller subsystem
//!
//! - `event_router`: correlates raw events to sessions and dispatches them
//!   to the configured outputs.
//! - `controller_handler`: builds the router from configuration and feeds it
//!   from the input sources.

pub mod controller_handler;
pub mod event_router;
