// Well-known WS method and event names.

// handshake
pub const CONNECT: &str = "connect";

// utility
pub const PING: &str = "ping";

// server → client events
pub const EVENT_CHALLENGE: &str = "connect.challenge";
pub const EVENT_TICK: &str = "tick";
pub const EVENT_NOTIFICATION: &str = "notification";
