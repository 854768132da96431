//! Connection gateway
//!
//! One duplex connection per client. Frames are parsed into
//! [`protocol::ClientMessage`] and dispatched by [`handler::Gateway`] to room
//! actors and the matchmaking queue.

pub mod connection;
pub mod handler;
pub mod protocol;
pub mod session;
pub mod ws;

pub use connection::ConnectionHandle;
pub use handler::Gateway;
pub use protocol::{ClientMessage, ServerMessage};
pub use session::{Session, SessionTable};
pub use ws::ws_handler;
