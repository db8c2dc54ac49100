//! HTTP surface served on a real socket.

use recwatch::api::ApiServer;
use recwatch::config::ServerConfig;
use recwatch::pipeline::StatusHandle;
use recwatch::relay::TelemetryRelay;
use recwatch::watcher::ActiveSession;
use serde_json::Value;

async fn serve(status: StatusHandle) -> String {
    let server = ApiServer::new(status, TelemetryRelay::new(), &ServerConfig::default());
    let app = server.router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

#[tokio::test]
async fn test_status_reports_active_session() {
    let status = StatusHandle::new(true);
    status.set_active(Some(&ActiveSession {
        filename: "rec1.flv".to_string(),
        started_at_ms: 1_700_000_000_000,
    }));
    status.set_progress(vec!["rec0.flv".to_string()], 3, 1);
    let base = serve(status).await;

    let body: Value = reqwest::get(format!("{base}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["isRecording"], true);
    assert_eq!(body["remoteSinkEnabled"], true);
    assert_eq!(body["activeSession"]["filename"], "rec1.flv");
    assert_eq!(body["inFlight"][0], "rec0.flv");
    assert_eq!(body["processedCount"], 3);
    assert!(body["lostSessions"].as_array().unwrap().is_empty());
    assert!(body["lastOutcome"].is_null());
}

#[tokio::test]
async fn test_idle_status_and_service_info() {
    let base = serve(StatusHandle::new(false)).await;

    let status: Value = reqwest::get(format!("{base}/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["isRecording"], false);
    assert_eq!(status["remoteSinkEnabled"], false);
    assert!(status["activeSession"].is_null());

    let info: Value = reqwest::get(format!("{base}/"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["service"], "recwatch");
    assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_relay_endpoints_require_websocket_upgrade() {
    let base = serve(StatusHandle::new(false)).await;

    let response = reqwest::get(format!("{base}/relay/subscribe")).await.unwrap();
    assert!(response.status().is_client_error());
}
