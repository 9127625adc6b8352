use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use thiep_core::AppError;
use thiep_core::ports::Subscription;
use thiep_core::send::Author;
use thiep_core::thread::{derive_thread_key, send_chat_message};
use thiep_types::api::{Claims, SendChatMessageRequest};
use thiep_types::events::ThreadEvent;

use crate::auth::AppStateInner;
use crate::error::ApiError;
use crate::middleware::identity_from_claims;

pub async fn get_messages(
    State(state): State<Arc<AppStateInner>>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let key = derive_thread_key(&claims.sub, &peer_id);
    let messages = state
        .directory
        .thread_messages(&key)
        .await
        .map_err(AppError::Lookup)?;

    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<Arc<AppStateInner>>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendChatMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author = Author::from_identity(Some(&identity_from_claims(&claims)));
    let message = send_chat_message(
        state.directory.as_ref(),
        &author.id,
        &author.name,
        &peer_id,
        &req.text,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Live feed of the thread with `peer_id`. Every frame is the full ordered
/// message list.
pub async fn live(
    State(state): State<Arc<AppStateInner>>,
    Path(peer_id): Path<String>,
    Extension(claims): Extension<Claims>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    let key = derive_thread_key(&claims.sub, &peer_id);
    let subscription = state
        .directory
        .watch_thread(&key)
        .await
        .map_err(AppError::Lookup)?;

    info!("{} following thread {}", claims.sub, key);
    Ok(ws.on_upgrade(move |socket| stream_thread(socket, key, subscription)))
}

async fn stream_thread(socket: WebSocket, thread_key: String, mut subscription: Subscription) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            snapshot = subscription.next() => {
                let Some(messages) = snapshot else {
                    let closed = ThreadEvent::Closed { thread_key: thread_key.clone() };
                    let _ = send_event(&mut sender, &closed).await;
                    break;
                };
                let event = ThreadEvent::Snapshot { thread_key: thread_key.clone(), messages };
                if send_event(&mut sender, &event).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Thread {} socket error: {}", thread_key, e);
                        break;
                    }
                }
            }
        }
    }

    debug!("Thread {} feed closed", thread_key);
}

async fn send_event(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &ThreadEvent,
) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not encode thread event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}
