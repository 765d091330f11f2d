use std::net::SocketAddr;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use normal_relight::codec;
use normal_relight::{Image, RequestId};
use normal_relight_server::routes::{self, AppState, CancelBody, UpdateImageBody};
use normal_relight_server::{start_server, ServerConfig};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn update_body(value: Value) -> UpdateImageBody {
    serde_json::from_value(value).expect("valid update body")
}

fn cancel_body(value: Value) -> CancelBody {
    serde_json::from_value(value).expect("valid cancel body")
}

async fn respond(response: impl IntoResponse) -> (StatusCode, Value) {
    let response = response.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

fn gradient(height: usize, width: usize) -> Image {
    Image::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
        ((x * 3 + y * 5 + c * 7) % 32) as f32 / 31.0
    })
}

/// Every channel of every pixel is independent, so the PNG barely compresses.
fn noise(height: usize, width: usize) -> Image {
    Image::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
        let mut v = (((y * width + x) * 3 + c) as u32) ^ 0x9E37_79B9;
        v ^= v << 13;
        v ^= v >> 17;
        v ^= v << 5;
        f32::from((v & 0xFF) as u8) / 255.0
    })
}

/// Sends a JSON POST over a fresh HTTP/1.1 connection.
async fn post_json(addr: SocketAddr, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let head = format!(
        "POST {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await.expect("write head");
    stream.write_all(body.as_bytes()).await.expect("write body");

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.expect("read response");
    let text = String::from_utf8_lossy(&raw);
    let status = text
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status line");
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

async fn serve(state: &AppState, max_body_bytes: usize) -> normal_relight_server::ServerHandle {
    let cfg = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        max_body_bytes,
        ..ServerConfig::default()
    };
    start_server(state.clone(), &cfg).await.unwrap()
}

/// Starts a blocking interactive relight and waits until its preview is out.
async fn park_worker(state: &AppState, image: &Image, id: &str) -> tokio::task::JoinHandle<Image> {
    let mut notices = state.bus.subscribe();
    let bridge = state.bridge();
    let image = image.clone();
    let normals = Image::from_elem((1, 8, 8, 3), 0.5);
    let id = id.to_string();

    let worker = tokio::task::spawn_blocking(move || bridge.interactive_relight(&image, &normals, id));
    notices.recv().await.expect("preview notice");
    worker
}

#[tokio::test]
async fn cancel_returns_original_and_cleans_up() {
    let state = AppState::new(4);
    let image = gradient(16, 16);
    let worker = park_worker(&state, &image, "r1").await;

    let (status, body) = respond(
        routes::cancel(State(state.clone()), Ok(Json(cancel_body(json!({ "node_id": "r1" }))))).await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "success" }));

    assert_eq!(worker.await.unwrap(), image);
    assert!(!state.registry.contains(&RequestId::from("r1")));
}

#[tokio::test]
async fn delivered_png_becomes_the_result() {
    let state = AppState::new(4);
    let image = gradient(16, 16);
    let edited = gradient(64, 64).mapv(|v| v * 0.5);
    let worker = park_worker(&state, &image, "r2").await;

    let body = update_body(json!({
        "node_id": "r2",
        "image": codec::encode_data_uri(&edited).unwrap(),
    }));
    let (status, _) = respond(routes::update_image(State(state.clone()), Ok(Json(body))).await).await;
    assert_eq!(status, StatusCode::OK);

    let result = worker.await.unwrap();
    assert_eq!(result.dim(), (1, 64, 64, 3));
    for (a, b) in result.iter().zip(edited.iter()) {
        assert!((a - b).abs() <= 1.0 / 255.0 + 1e-6);
    }
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn numeric_node_ids_match_string_ids() {
    let state = AppState::new(4);
    let image = gradient(4, 4);
    let worker = park_worker(&state, &image, "17").await;

    let (status, _) = respond(
        routes::cancel(State(state.clone()), Ok(Json(cancel_body(json!({ "node_id": 17 }))))).await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(worker.await.unwrap(), image);
}

#[tokio::test]
async fn unknown_id_is_a_client_error() {
    let state = AppState::new(4);

    let body = update_body(json!({ "node_id": "ghost", "image": "data:image/png;base64,AAAA" }));
    let (status, body) = respond(routes::update_image(State(state.clone()), Ok(Json(body))).await).await;
    assert!(status.is_client_error());
    assert!(body.get("error").is_some());

    let (status, _) = respond(
        routes::cancel(State(state.clone()), Ok(Json(cancel_body(json!({ "node_id": "ghost" }))))).await,
    )
    .await;
    assert!(status.is_client_error());

    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn missing_fields_are_bad_requests() {
    let state = AppState::new(4);

    for value in [
        json!({}),
        json!({ "node_id": "x" }),
        json!({ "image": "data:image/png;base64,AAAA" }),
        json!({ "node_id": "", "image": "data:image/png;base64,AAAA" }),
        json!({ "node_id": "x", "image": "" }),
    ] {
        let (status, body) =
            respond(routes::update_image(State(state.clone()), Ok(Json(update_body(value)))).await)
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    let (status, _) =
        respond(routes::cancel(State(state.clone()), Ok(Json(cancel_body(json!({}))))).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn corrupt_payload_falls_back_to_original() {
    let state = AppState::new(4);
    let image = gradient(8, 8);
    let worker = park_worker(&state, &image, "junk").await;

    let body = update_body(json!({ "node_id": "junk", "image": "data:image/png;base64,aGVsbG8=" }));
    let (status, _) = respond(routes::update_image(State(state.clone()), Ok(Json(body))).await).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(worker.await.unwrap(), image);
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn node_listing_describes_both_nodes() {
    let Json(nodes) = routes::list_nodes().await;
    let json = serde_json::to_value(&nodes).unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["type_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["RelightBasic", "Relight"]);
    assert_eq!(json[1]["output_node"], true);
}

#[tokio::test]
async fn shutdown_releases_parked_workers() {
    let state = AppState::new(4);
    let cfg = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        ..ServerConfig::default()
    };
    let handle = start_server(state.clone(), &cfg).await.unwrap();
    assert_ne!(handle.local_addr().port(), 0);

    let image = gradient(8, 8);
    let worker = park_worker(&state, &image, "late").await;

    handle.shutdown().await.unwrap();
    assert_eq!(worker.await.unwrap(), image);
    assert!(state.registry.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn full_size_image_is_accepted_over_http() {
    let state = AppState::new(4);
    let handle = serve(&state, ServerConfig::default().max_body_bytes).await;

    let image = gradient(8, 8);
    let worker = park_worker(&state, &image, "big").await;

    let edited = noise(1024, 1024);
    let body = json!({ "node_id": "big", "image": codec::encode_data_uri(&edited).unwrap() })
        .to_string();
    assert!(body.len() > 2 * 1024 * 1024, "payload is only {} bytes", body.len());

    let (status, _) = post_json(handle.local_addr(), routes::UPDATE_IMAGE_PATH, &body).await;
    assert_eq!(status, 200);

    let result = worker.await.unwrap();
    assert_eq!(result.dim(), (1, 1024, 1024, 3));
    for (a, b) in result.iter().zip(edited.iter()).step_by(997) {
        assert!((a - b).abs() <= 1e-6);
    }
    assert!(state.registry.is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_body_is_payload_too_large() {
    let state = AppState::new(4);
    let handle = serve(&state, 1024).await;

    let image = gradient(8, 8);
    let worker = park_worker(&state, &image, "capped").await;

    let body = json!({ "node_id": "capped", "image": "A".repeat(4096) }).to_string();
    let (status, response) =
        post_json(handle.local_addr(), routes::UPDATE_IMAGE_PATH, &body).await;
    assert_eq!(status, 413);
    let response: Value = serde_json::from_str(&response).expect("json error body");
    assert!(response["error"].is_string());

    assert!(state.registry.contains(&RequestId::from("capped")));
    handle.shutdown().await.unwrap();
    assert_eq!(worker.await.unwrap(), image);
}
