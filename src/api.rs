//! HTTP and WebSocket endpoints

use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    database::Database,
    errors::TrackerError,
    hub::Hub,
    models::{PositionReport, ServerEvent, VehicleRecord},
    service::{QueryService, UpdateService},
};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub updates: UpdateService,
    pub queries: QueryService,
    pub hub: Arc<Hub>,
}

impl AppState {
    pub fn new(database: Database, hub: Arc<Hub>) -> Self {
        Self {
            updates: UpdateService::new(database.clone(), hub.clone()),
            queries: QueryService::new(database),
            hub,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/vehicles", get(list_vehicles))
        .route("/api/update-position", post(update_position))
        .route("/ws", get(viewer_socket))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_vehicles(
    State(state): State<AppState>,
) -> Result<Json<Vec<VehicleRecord>>, TrackerError> {
    Ok(Json(state.queries.snapshot().await?))
}

async fn update_position(
    State(state): State<AppState>,
    payload: Result<Json<PositionReport>, JsonRejection>,
) -> Result<Json<Value>, TrackerError> {
    let Json(report) = payload.map_err(|e| TrackerError::Validation(e.body_text()))?;
    state.updates.report_position(report).await?;
    Ok(Json(json!({ "success": true })))
}

async fn viewer_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| serve_viewer(socket, state.hub))
}

/// Forward hub updates to one viewer until either side goes away
async fn serve_viewer(socket: WebSocket, hub: Arc<Hub>) {
    let (session, mut updates) = hub.open_session();
    let id = session.id();
    hub.register(&session).await;
    info!("Viewer connected: {}", id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break };
                let text = match serde_json::to_string(&ServerEvent::PositionUpdate(update)) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode update for viewer {}: {}", id, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("Viewer {} socket error: {}", id, e);
                        break;
                    }
                }
            }
        }
    }

    hub.unregister(id).await;
    info!("Viewer disconnected: {}", id);
}
