//! Checkout push channel.
//!
//! The checkout page opens `GET /ws/checkout/{cart_id}`. The server
//! allocates a socket ID, stores it on the cart (so the next payment intent
//! update carries it to Stripe) and pushes JSON frames:
//!
//! ```json
//! {"event":"connected","data":{"socketId":"..."}}
//! {"event":"completeOrder","data":{"order":{ ... }}}
//! ```
//!
//! Client frames are ignored apart from close.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use elecommerce_core::{CartId, PushMessage, SocketId};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::db::CheckoutStore;
use crate::error::{AppError, Result};
use crate::services::NotificationHub;
use crate::state::AppState;
use crate::stripe::PaymentGateway;

/// GET /ws/checkout/{cart_id} - Upgrade to the checkout push channel.
#[instrument(skip(state, upgrade))]
pub async fn checkout_socket<S: CheckoutStore, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    Path(cart_id): Path<CartId>,
    upgrade: WebSocketUpgrade,
) -> Result<Response> {
    let socket_id = SocketId::new(Uuid::new_v4().to_string());
    if !state.store().attach_socket(cart_id, &socket_id).await? {
        return Err(AppError::NotFound(format!("cart {cart_id}")));
    }

    let hub = state.hub().clone();
    Ok(upgrade.on_upgrade(move |socket| serve_socket(socket, hub, socket_id)))
}

async fn serve_socket(mut socket: WebSocket, hub: NotificationHub, socket_id: SocketId) {
    let mut outgoing = hub.register(socket_id.clone()).await;
    debug!(%socket_id, "Checkout socket connected");

    let connected = PushMessage::Connected {
        socket_id: socket_id.clone(),
    };
    if send(&mut socket, &connected).await {
        loop {
            tokio::select! {
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                message = outgoing.recv() => {
                    let Some(message) = message else { break };
                    if !send(&mut socket, &message).await {
                        break;
                    }
                }
            }
        }
    }

    hub.unregister(&socket_id).await;
    debug!(%socket_id, "Checkout socket disconnected");
}

/// Send one frame; returns `false` once the socket is gone.
async fn send(socket: &mut WebSocket, message: &PushMessage) -> bool {
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, event = message.event_name(), "Failed to encode push message");
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}
