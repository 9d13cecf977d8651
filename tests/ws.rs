//! Viewer push channel over a real WebSocket connection.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    Router,
};
use futures::StreamExt;
use serde_json::{json, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tempfile::TempDir;
use tokio::{net::TcpListener, net::TcpStream, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use fleet_tracker::{
    api::{router, AppState},
    database::Database,
    hub::Hub,
};

type Viewer = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    _dir: TempDir,
    hub: Arc<Hub>,
    router: Router,
    url: String,
}

async fn start_server() -> TestServer {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("tracking.db"))
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to connect to database");

    let database = Database::new(pool).await.expect("Failed to migrate");
    let hub = Arc::new(Hub::new(8));
    let router = router(AppState::new(database, hub.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = router.clone();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        _dir: dir,
        hub,
        router,
        url: format!("ws://{address}/ws"),
    }
}

async fn wait_for_sessions(hub: &Hub, expected: usize) {
    timeout(WAIT, async {
        while hub.session_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("hub never reached {expected} sessions"));
}

async fn next_event(viewer: &mut Viewer) -> Value {
    loop {
        let message = timeout(WAIT, viewer.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Socket closed")
            .expect("Socket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn report(router: &Router, body: Value) {
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/update-position")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_viewers_receive_each_report_once() {
    let server = start_server().await;

    let (mut first, _) = connect_async(server.url.as_str()).await.unwrap();
    let (mut second, _) = connect_async(server.url.as_str()).await.unwrap();
    wait_for_sessions(&server.hub, 2).await;

    report(
        &server.router,
        json!({
            "plat_nomor": "B 1234 ABC",
            "latitude": -6.2088,
            "longitude": 106.8456,
            "speed": 40.0
        }),
    )
    .await;
    report(
        &server.router,
        json!({
            "plat_nomor": "B 1234 ABC",
            "latitude": -6.3,
            "longitude": 106.9,
            "speed": 55.5
        }),
    )
    .await;

    for viewer in [&mut first, &mut second] {
        assert_eq!(
            next_event(viewer).await,
            json!({
                "event": "position_update",
                "data": {
                    "plat_nomor": "B 1234 ABC",
                    "latitude": -6.2088,
                    "longitude": 106.8456,
                    "speed": 40.0
                }
            })
        );
        // The next frame is the second report, not a repeat of the first
        assert_eq!(next_event(viewer).await["data"]["speed"], json!(55.5));
    }
}

#[tokio::test]
async fn test_closed_viewer_is_unregistered() {
    let server = start_server().await;

    let (mut viewer, _) = connect_async(server.url.as_str()).await.unwrap();
    wait_for_sessions(&server.hub, 1).await;

    viewer.close(None).await.unwrap();
    wait_for_sessions(&server.hub, 0).await;
}

#[tokio::test]
async fn test_dropped_viewer_is_unregistered() {
    let server = start_server().await;

    let (viewer, _) = connect_async(server.url.as_str()).await.unwrap();
    wait_for_sessions(&server.hub, 1).await;

    drop(viewer);
    wait_for_sessions(&server.hub, 0).await;
}
