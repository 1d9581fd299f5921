//! Engine sync client
//!
//! Keeps a local, queryable replica of a trading engine's state over a single
//! WebSocket link and forwards user commands back to the engine.

pub mod application;
pub mod config;
pub mod domain;
