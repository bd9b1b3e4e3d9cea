//! Server-to-client messages on the checkout push channel.
//!
//! Frames are JSON objects tagged by `event`, with the payload under `data`:
//!
//! ```json
//! {"event":"connected","data":{"socketId":"4f9c..."}}
//! {"event":"completeOrder","data":{"order":{ ... }}}
//! ```

use serde::{Deserialize, Serialize};

use super::id::SocketId;
use super::order::Order;

/// A message pushed to a checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PushMessage {
    /// First frame after the websocket upgrade.
    #[serde(rename_all = "camelCase")]
    Connected { socket_id: SocketId },

    /// The payment succeeded and the order carries its final shipping details.
    CompleteOrder { order: Box<Order> },
}

impl PushMessage {
    /// Event name as seen by the client.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::CompleteOrder { .. } => "completeOrder",
        }
    }
}
