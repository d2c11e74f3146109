//! Wire formats: the real-time push WebSocket (`GET /ws`) and the HTTP
//! bodies exchanged with the chat relay.

pub mod frames;
pub mod handshake;
pub mod methods;
pub mod relay;
