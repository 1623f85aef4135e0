// websocket.rs
use crate::AppState;
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use discuss_embed_core::{Command, DirectConfig, Session, Snapshot, Theme};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct WsQuery {
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    repo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage<'a> {
    Snapshot { snapshot: &'a Snapshot },
    Error { message: String },
}

impl WsMessage<'_> {
    fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(text) => Some(Message::Text(text.into())),
            Err(e) => {
                error!("Failed to encode message: {}", e);
                None
            }
        }
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let session_id = Uuid::new_v4();
        handle_socket(socket, state, params)
            .instrument(tracing::info_span!("session", id = %session_id))
    })
}

async fn send(socket: &mut WebSocket, message: WsMessage<'_>) -> bool {
    match message.to_message() {
        Some(message) => socket.send(message).await.is_ok(),
        None => true,
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, params: WsQuery) {
    state.metrics.record_session().await;

    let theme = params
        .theme
        .as_deref()
        .and_then(|t| t.parse::<Theme>().ok())
        .unwrap_or_default();

    let (session, handle) = Session::spawn(
        state.lookup.clone(),
        state.metrics.clone(),
        state.settings.debounce,
        DirectConfig {
            theme,
            ..DirectConfig::default()
        },
    );
    let mut snapshots = session.subscribe();

    if let Some(repo) = params.repo {
        session.send(Command::RepositoryInput { value: repo });
    }

    info!("Session opened");

    let initial = session.snapshot();
    if !send(&mut socket, WsMessage::Snapshot { snapshot: &initial }).await {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Socket error: {}", e);
                        break;
                    }
                };

                match serde_json::from_str::<Command>(text.as_str()) {
                    Ok(command) => {
                        debug!(?command, "Command received");
                        session.send(command);
                    }
                    Err(e) => {
                        let message = format!("Invalid command: {e}");
                        if !send(&mut socket, WsMessage::Error { message }).await {
                            break;
                        }
                    }
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if !send(&mut socket, WsMessage::Snapshot { snapshot: &snapshot }).await {
                    break;
                }
            }
        }
    }

    drop(snapshots);
    drop(session);
    let _ = handle.await;

    info!("Session closed");
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(websocket_handler))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
