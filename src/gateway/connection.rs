//! Handle to a live client connection
//!
//! Rooms and the matchmaking queue only ever hold this handle. Sending is
//! non-blocking; a dropped socket shows up as a closed channel.

use crate::gateway::protocol::ServerMessage;
use crate::types::ConnectionId;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Outbound side of one client connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ConnectionHandle {
    /// Wrap an existing sender
    pub fn new(tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx,
        }
    }

    /// Create a handle together with the receiver the socket writer drains
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message for the client. Returns false when the socket is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        match self.tx.send(message) {
            Ok(()) => true,
            Err(_) => {
                debug!("Dropping message for closed connection {}", self.id);
                false
            }
        }
    }

    /// Whether the socket behind this handle is still open
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_liveness() {
        let (handle, mut rx) = ConnectionHandle::channel();
        assert!(handle.is_live());
        assert!(handle.send(ServerMessage::RankedQueueLeft));
        assert_eq!(rx.try_recv().unwrap(), ServerMessage::RankedQueueLeft);

        drop(rx);
        assert!(!handle.is_live());
        assert!(!handle.send(ServerMessage::RankedQueueLeft));
    }

    #[test]
    fn test_handles_compare_by_id() {
        let (a, _rx_a) = ConnectionHandle::channel();
        let (b, _rx_b) = ConnectionHandle::channel();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
