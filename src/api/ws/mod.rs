//! WebSocket push channel

mod handler;

pub use handler::{ws_handler, WsClientMessage, WsServerMessage};
