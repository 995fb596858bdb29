use {
    crate::api::Context,
    axum::{
        extract::{
            Query, State,
            ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        },
        response::Response,
    },
    std::collections::HashMap,
};

const POLICY_VIOLATION: u16 = 1008;
const INTERNAL_ERROR: u16 = 1011;

/// `GET /api/orders/execute?orderId=...` — upgrades to the per-order
/// update stream. Each frame is one JSON status message.
pub async fn handler(
    State(context): State<Context>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let order_id = params.get("orderId").cloned();
    ws.on_upgrade(move |socket| serve(socket, context, order_id))
}

async fn serve(mut socket: WebSocket, context: Context, order_id: Option<String>) {
    let Some(order_id) = order_id.filter(|order_id| !order_id.is_empty()) else {
        close(&mut socket, POLICY_VIOLATION, "orderId query param required").await;
        return;
    };
    tracing::debug!(%order_id, "subscriber attached");

    let mut subscription = context.hub.attach(&order_id);
    loop {
        tokio::select! {
            update = subscription.receiver.recv() => match update {
                Some(message) => {
                    let payload = match serde_json::to_string(&message) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::error!(%order_id, ?err, "unserializable status message");
                            close(&mut socket, INTERNAL_ERROR, "Internal server error").await;
                            break;
                        }
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                // A newer subscriber took over this order.
                None => break,
            },
            incoming = socket.recv() => match incoming {
                // Clients only ever send pings and noise; ignore it.
                Some(Ok(_)) => (),
                Some(Err(_)) | None => break,
            },
        }
    }

    context.hub.detach(&subscription);
    tracing::debug!(%order_id, "subscriber detached");
}

async fn close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await;
}
