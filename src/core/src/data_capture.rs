//! Terminal recordings.
//!
//! The front end writes each session's terminal stream to a file of its own
//! and announces the path with a TTY_OPENED event. This subsystem only keeps
//! the session to path association and reads recordings back, bounded.

pub mod tty_log_store;

pub use tty_log_store::{TtyLogStore, TTYLOG_READ_LIMIT};
