// THEORY:
// These routes are the inbound side of the handoff. Each callback does one
// thing: write into the registry and wake the parked worker. They never block
// and never create registry entries; an id nobody is waiting on is answered
// with a client error and otherwise ignored.
//
// The websocket route is the outbound side: every connected editor gets every
// preview notice published on the bus.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use normal_relight::bus::PREVIEW_EVENT;
use normal_relight::nodes::{NodeDescriptor, NodeKind};
use normal_relight::{EditorBus, HandoffBridge, HandoffRegistry, PreviewNotice, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;

pub const UPDATE_IMAGE_PATH: &str = "/relight/update_image";
pub const CANCEL_PATH: &str = "/relight/cancel";
pub const NODES_PATH: &str = "/relight/nodes";
pub const EDITOR_SOCKET_PATH: &str = "/ws";

/// Shared by every route and by the bridge that parks workers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<HandoffRegistry>,
    pub bus: EditorBus,
}

impl AppState {
    pub fn new(bus_capacity: usize) -> Self {
        Self {
            registry: Arc::new(HandoffRegistry::new()),
            bus: EditorBus::new(bus_capacity),
        }
    }

    /// A bridge wired to this state's registry and bus.
    pub fn bridge(&self) -> HandoffBridge {
        HandoffBridge::new(Arc::clone(&self.registry), Arc::new(self.bus.clone()))
    }
}

/// Hosts hand out node ids as strings or numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    Text(String),
    Number(serde_json::Number),
}

impl NodeId {
    fn into_request_id(self) -> Option<RequestId> {
        match self {
            Self::Text(text) if text.trim().is_empty() => None,
            Self::Text(text) => Some(RequestId::from(text)),
            Self::Number(number) => Some(RequestId::from(number.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateImageBody {
    #[serde(default)]
    pub node_id: Option<NodeId>,
    /// Data URI of the finished image.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub node_id: Option<NodeId>,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    UnknownRequest(String),
    PayloadTooLarge(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownRequest(_) => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (Self::BadRequest(message)
        | Self::UnknownRequest(message)
        | Self::PayloadTooLarge(message)
        | Self::Internal(message)) = self;
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge(rejection.body_text());
        }
        match rejection {
            JsonRejection::BytesRejection(e) => Self::Internal(e.body_text()),
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl From<normal_relight::Error> for ApiError {
    fn from(error: normal_relight::Error) -> Self {
        match error {
            normal_relight::Error::UnknownRequest { .. } => Self::UnknownRequest(error.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

pub type ApiResult = Result<Json<Value>, ApiError>;

fn success() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

pub async fn update_image(
    State(state): State<AppState>,
    payload: Result<Json<UpdateImageBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let id = body.node_id.and_then(NodeId::into_request_id);
    let image = body.image.filter(|image| !image.is_empty());
    let (Some(id), Some(image)) = (id, image) else {
        return Err(ApiError::BadRequest("node_id and image are required".to_string()));
    };

    state.registry.deliver(&id, image).inspect_err(|e| {
        tracing::warn!("update_image rejected: {e}");
    })?;
    tracing::info!("request {id}: editor delivered an image");
    Ok(success())
}

pub async fn cancel(
    State(state): State<AppState>,
    payload: Result<Json<CancelBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let Some(id) = body.node_id.and_then(NodeId::into_request_id) else {
        return Err(ApiError::BadRequest("node_id is required".to_string()));
    };

    state.registry.cancel(&id).inspect_err(|e| {
        tracing::warn!("cancel rejected: {e}");
    })?;
    tracing::info!("request {id}: editor cancelled");
    Ok(success())
}

pub async fn list_nodes() -> Json<Vec<NodeDescriptor>> {
    Json(NodeKind::ALL.iter().map(|kind| kind.descriptor()).collect())
}

/// Envelope editors receive over the websocket.
#[derive(Debug, Serialize)]
pub struct EditorEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: PreviewNotice,
}

pub async fn editor_socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let notices = state.bus.subscribe();
    ws.on_upgrade(move |socket| forward_notices(socket, notices))
}

async fn forward_notices(socket: WebSocket, mut notices: broadcast::Receiver<PreviewNotice>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    tracing::debug!("editor connected");

    loop {
        tokio::select! {
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    let event = EditorEvent { kind: PREVIEW_EVENT, data: notice };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!("could not serialize preview: {e}");
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("editor connection lagged, {skipped} preview(s) dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("editor disconnected");
}

/// Builds the app. `max_body_bytes` caps callback bodies, which carry whole
/// encoded images.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(UPDATE_IMAGE_PATH, post(update_image))
        .route(CANCEL_PATH, post(cancel))
        .route(NODES_PATH, get(list_nodes))
        .route(EDITOR_SOCKET_PATH, get(editor_socket))
        .route("/healthz", get(|| async { "ok" }))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
