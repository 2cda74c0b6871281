//! Realtime update channel — a persistent push connection that keeps
//! computed attribution results fresh for subscribers, with heartbeats
//! and bounded reconnection.

pub mod channel;
pub mod protocol;

pub use channel::{ConnectionState, PushTransport, RealtimeChannel, TransportConn};
pub use protocol::PushMessage;
