use axum::{
    Router, Extension,
    routing::get,
    response::IntoResponse,
    extract::ws::{WebSocketUpgrade, WebSocket, Message},
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::{
    room::{Outbox, OUTBOX_CAPACITY},
    session::Session,
    state::SharedRegistry,
};

pub fn router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(registry): Extension<SharedRegistry>,
) -> impl IntoResponse {
    ws.on_upgrade(move |sock| user_ws(sock, registry))
}

/* ---------------- per connection ---------------- */
async fn user_ws(sock: WebSocket, registry: SharedRegistry) {
    let (mut sink, mut stream) = sock.split();
    let (tx, mut rx) = Outbox::channel(OUTBOX_CAPACITY);
    let kicked = tx.clone();
    let mut session = Session::new(registry, tx);
    let conn = session.id();
    info!(%conn, "connected");

    /* outbox → socket */
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if sink.send(Message::Text(event.encode())).await.is_err() {
                break;
            }
        }
    });

    /* socket → session, until the peer goes away or its room drops it */
    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(raw))) => session.handle_text(&raw).await,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => debug!(%conn, "ignoring non-text frame"),
            },
            _ = kicked.closed() => {
                warn!(%conn, "dropping slow consumer");
                break;
            }
        }
    }

    session.disconnect().await;
    drop(session);
    writer.abort();
    info!(%conn, "disconnected");
}
