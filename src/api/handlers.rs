use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use mongodb::bson::doc;
use serde_json::{json, Value};
use utoipa::OpenApi;

use super::{dto::ApiResponse, errors::AppError, AppState};
use crate::db::models::AccessRecord;
use crate::readings::{sanitize, validate, REQUIRED_FIELDS};

/// Page size for both listing endpoints.
const LIST_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Ingest one sensor reading: validate, sanitize, persist, audit.
#[utoipa::path(
    post,
    path = "/readings",
    request_body(content = Object, description = "Raw reading payload from a device"),
    responses(
        (status = 201, description = "Reading recorded", body = ApiResponse),
        (status = 400, description = "Malformed payload or failed validation", body = ApiResponse),
        (status = 503, description = "Store not initialized", body = ApiResponse),
        (status = 500, description = "Store failure", body = ApiResponse),
    ),
    tag = "readings"
)]
pub async fn create_reading(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse>), AppError> {
    let started = Instant::now();
    let ip = client_ip(&headers, &peer);

    let Ok(Json(body)) = payload else {
        return Ok(bad_request("invalid JSON payload"));
    };
    let raw = match mongodb::bson::to_document(&body) {
        Ok(doc) if !doc.is_empty() => doc,
        _ => return Ok(bad_request("invalid JSON payload")),
    };

    if let Err(e) = validate(&raw, REQUIRED_FIELDS) {
        let message = e.to_string();
        state
            .audit
            .record(AccessRecord {
                endpoint: "/readings".into(),
                method: "POST".into(),
                reading_id: None,
                client_ip: ip,
                payload: None,
                status: 400,
                response_time_ms: Some(elapsed_ms(started)),
            })
            .await;
        return Ok(bad_request(&message));
    }

    let reading = sanitize(raw);
    let id = state.repo.insert_reading(&reading).await?;

    state
        .audit
        .record(AccessRecord {
            endpoint: "/readings".into(),
            method: "POST".into(),
            reading_id: Some(id.clone()),
            client_ip: ip,
            payload: Some(doc! { "uid_tag": &reading.uid_tag }),
            status: 201,
            response_time_ms: Some(elapsed_ms(started)),
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(json!({ "id": id }), "reading recorded")),
    ))
}

/// List the most recent readings (up to 100, newest first).
#[utoipa::path(
    get,
    path = "/readings",
    responses(
        (status = 200, description = "Readings, newest first", body = ApiResponse),
        (status = 503, description = "Store not initialized", body = ApiResponse),
        (status = 500, description = "Store failure", body = ApiResponse),
    ),
    tag = "readings"
)]
pub async fn list_readings(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ApiResponse>), AppError> {
    let started = Instant::now();
    let ip = client_ip(&headers, &peer);

    let readings = state.repo.list_readings(LIST_LIMIT).await?;
    let total = readings.len();

    state
        .audit
        .record(AccessRecord {
            endpoint: "/readings".into(),
            method: "GET".into(),
            reading_id: None,
            client_ip: ip,
            payload: Some(doc! { "returned": total as i64 }),
            status: 200,
            response_time_ms: Some(elapsed_ms(started)),
        })
        .await;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(
            json!({ "total": total, "items": readings }),
            "OK",
        )),
    ))
}

/// List the most recent audit entries (up to 100, newest first). Not
/// itself audited, so the trail never feeds back into itself.
#[utoipa::path(
    get,
    path = "/access-logs",
    responses(
        (status = 200, description = "Audit entries, newest first", body = ApiResponse),
        (status = 503, description = "Store not initialized", body = ApiResponse),
        (status = 500, description = "Store failure", body = ApiResponse),
    ),
    tag = "access-logs"
)]
pub async fn list_access_logs(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse>), AppError> {
    let logs = state.repo.list_access_logs(LIST_LIMIT).await?;
    let total = logs.len();

    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(json!({ "total": total, "items": logs }), "OK")),
    ))
}

/// Liveness plus store readiness.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is running"),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = if state.repo.is_ready().await {
        "ready"
    } else {
        "unavailable"
    };
    Json(json!({ "status": "ok", "database": database }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn bad_request(message: &str) -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message)))
}

fn elapsed_ms(started: Instant) -> i64 {
    started.elapsed().as_millis() as i64
}

/// First entry of `X-Forwarded-For` when a proxy set it, else the peer
/// address.
fn client_ip(headers: &HeaderMap, peer: &SocketAddr) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .or_else(|| Some(peer.ip().to_string()))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(create_reading, list_readings, list_access_logs, health),
    components(schemas(ApiResponse)),
    tags(
        (name = "readings", description = "Sensor reading ingestion and listing"),
        (name = "access-logs", description = "API audit trail"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "IoT Readings API",
        version = "0.1.0",
        description = "Ingests ESP32 sensor readings into MongoDB and keeps an audit trail of API accesses"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum_test::TestServer;
    use serde_json::{json, Value};

    use super::*;
    use crate::api::router;
    use crate::audit::AuditLogger;
    use crate::db::{repository::Repository, ConnectionManager};

    /// Server whose connection never reached `Ready`: exercises the
    /// not-initialized gate and the audit swallow path without a store.
    fn uninitialized_server() -> TestServer {
        let conn = Arc::new(ConnectionManager::new("mongodb://127.0.0.1:27017", "test"));
        let repo = Repository::new(conn);
        let state = AppState {
            audit: AuditLogger::new(repo.clone()),
            repo,
        };
        // Real HTTP transport so `ConnectInfo` sees a peer address.
        TestServer::builder()
            .http_transport()
            .build(router(state).into_make_service_with_connect_info::<SocketAddr>())
            .unwrap()
    }

    #[tokio::test]
    async fn post_missing_field_is_rejected_with_envelope() {
        let server = uninitialized_server();
        let resp = server
            .post("/readings")
            .json(&json!({ "acesso": "true", "uid_tag": "AABBCCDD" }))
            .await;

        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "missing required field: presenca");
        assert_eq!(body["data"], json!({}));
    }

    #[tokio::test]
    async fn post_invalid_uid_is_rejected() {
        let server = uninitialized_server();
        let resp = server
            .post("/readings")
            .json(&json!({ "presenca": "1", "acesso": "true", "uid_tag": "nope" }))
            .await;

        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["message"], "invalid UID");
    }

    #[tokio::test]
    async fn post_non_object_payload_is_rejected() {
        let server = uninitialized_server();
        let resp = server.post("/readings").json(&json!([1, 2, 3])).await;

        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["message"], "invalid JSON payload");
    }

    #[tokio::test]
    async fn post_empty_object_is_rejected_as_invalid_json() {
        let server = uninitialized_server();
        let resp = server.post("/readings").json(&json!({})).await;

        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["message"], "invalid JSON payload");
    }

    #[tokio::test]
    async fn post_valid_reading_without_store_reports_unavailable() {
        let server = uninitialized_server();
        let resp = server
            .post("/readings")
            .json(&json!({ "presenca": "1", "acesso": "true", "uid_tag": "AABBCCDD" }))
            .await;

        resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
        let body: Value = resp.json();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "database not ready");
    }

    // The 400 above is produced after an audit write against an unready
    // store; the swallowed audit failure must not change the response.
    #[tokio::test]
    async fn audit_failure_does_not_change_primary_outcome() {
        let server = uninitialized_server();
        let resp = server
            .post("/readings")
            .json(&json!({ "acesso": "true" }))
            .await;

        resp.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = resp.json();
        assert_eq!(body["message"], "missing required field: presenca");
    }

    #[tokio::test]
    async fn list_readings_without_store_reports_unavailable() {
        let server = uninitialized_server();
        let resp = server.get("/readings").await;
        resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn list_access_logs_without_store_reports_unavailable() {
        let server = uninitialized_server();
        let resp = server.get("/access-logs").await;
        resp.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn health_reports_store_readiness() {
        let server = uninitialized_server();
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "unavailable");
    }

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let server = uninitialized_server();
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "IoT Readings API");
    }

    #[test]
    fn client_ip_prefers_forwarding_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, &peer), Some("203.0.113.7".into()));
    }

    #[test]
    fn client_ip_falls_back_to_peer_address() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.0.2.1:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, &peer), Some("192.0.2.1".into()));
    }
}
