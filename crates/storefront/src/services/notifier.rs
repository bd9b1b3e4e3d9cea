//! Fan-out of push messages to connected checkout pages.
//!
//! Each websocket registers an unbounded channel under its socket ID; the
//! webhook emits into that channel without waiting on the socket.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use elecommerce_core::{PushMessage, SocketId};

/// Registry of live checkout sockets.
///
/// Cloning shares the registry.
#[derive(Debug, Clone, Default)]
pub struct NotificationHub {
    sockets: Arc<RwLock<HashMap<SocketId, mpsc::UnboundedSender<PushMessage>>>>,
}

impl NotificationHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket and return the receiving end of its channel.
    ///
    /// Registering an ID again replaces the previous channel.
    pub async fn register(&self, socket_id: SocketId) -> mpsc::UnboundedReceiver<PushMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sockets.write().await.insert(socket_id, tx);
        rx
    }

    /// Forget a socket.
    pub async fn unregister(&self, socket_id: &SocketId) {
        self.sockets.write().await.remove(socket_id);
    }

    /// Send a message to one socket.
    ///
    /// Returns `false` when nobody is listening, which is not an error: the
    /// page may have been closed before payment completed.
    pub async fn emit(&self, socket_id: &SocketId, message: PushMessage) -> bool {
        let event = message.event_name();
        let delivered = self
            .sockets
            .read()
            .await
            .get(socket_id)
            .is_some_and(|tx| tx.send(message).is_ok());

        debug!(%socket_id, event, delivered, "Push message emitted");
        delivered
    }

    /// Number of registered sockets.
    pub async fn len(&self) -> usize {
        self.sockets.read().await.len()
    }

    /// Whether no sockets are registered.
    pub async fn is_empty(&self) -> bool {
        self.sockets.read().await.is_empty()
    }
}
