//! KB Relay API Library Crate
//!
//! This library contains the HTTP side of the relay service: configuration,
//! application state, handlers and routing. The binaries are thin wrappers
//! around it.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
