//! HTTP administration surface
//!
//! Room creation, room listing and the WebSocket upgrade that attaches a
//! peer to a room. All handlers share one [`RoomRegistry`] as router state.

use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{debug, error, info};

use crate::client::Client;
use crate::connection::{Connection, ConnectionSink, WebSocketConnection};
use crate::error::AppError;
use crate::message::RoomInfo;
use crate::registry::RoomRegistry;
use crate::room::RoomHandle;

/// Build the relay's router
pub fn router(registry: RoomRegistry) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/{id}", get(join_room))
        .with_state(registry)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}

async fn list_rooms(State(registry): State<RoomRegistry>) -> Json<Vec<RoomInfo>> {
    Json(registry.list())
}

async fn create_room(
    State(registry): State<RoomRegistry>,
) -> Result<(StatusCode, Json<RoomInfo>), AppError> {
    let info = registry.create().inspect_err(|e| {
        error!("Failed to create room: {}", e);
    })?;
    Ok((StatusCode::CREATED, Json(info)))
}

async fn join_room(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(registry): State<RoomRegistry>,
) -> Result<Response, AppError> {
    let Some(room) = registry.find(&id) else {
        debug!("Upgrade rejected, unknown room {}", id);
        return Err(AppError::RoomNotFound(id));
    };

    Ok(ws
        .on_upgrade(move |socket| attach_client(WebSocketConnection::new(socket), room, registry))
        .into_response())
}

/// Bind an upgraded connection to its room and pump it until it fails
async fn attach_client<C: Connection>(connection: C, room: RoomHandle, registry: RoomRegistry) {
    let client_id = match registry.new_client_id() {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to assign client id in room {}: {}", room.id(), e);
            let (mut sink, _stream) = connection.split();
            sink.close().await;
            return;
        }
    };

    info!("Client {} connecting to room {}", client_id, room.id());
    if let Err(e) = Client::new(client_id, room, connection).run().await {
        debug!("Client ended with transport error: {}", e);
    }
}
