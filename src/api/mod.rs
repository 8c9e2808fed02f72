//! Web API module for the sell bot
//!
//! REST endpoints for settings and the monitor lifecycle, plus a WebSocket
//! push channel for status messages and price updates.

pub mod routes;
pub mod server;
pub mod ws;

pub use server::{create_app, AppState};
