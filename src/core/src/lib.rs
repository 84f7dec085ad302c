//! Audit pipeline for a medium-interaction SSH honeypot.
//!
//! Raw events from the honeypot front end are correlated to sessions,
//! classified into a fixed taxonomy and fanned out to pluggable outputs.

#![deny(unreachable_patterns)]

pub mod configuration;
pub mod controller;
pub mod data_capture;
pub mod error_handling;
pub mod event_taxonomy;
pub mod output;
pub mod session_management;
