//! Shared utilities for integration tests.
//!
//! Mock backends are plain axum routers bound to ephemeral ports.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use erp_gateway::{GatewayConfig, GatewayServer};

/// 1x1 PNG.
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

/// Serve `router` on an ephemeral port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Gateway config pointing at a backend whose API lives under `/api/v1`.
pub fn gateway_config(backend: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.backend.base_url = format!("http://{}/api/v1/", backend);
    config.timeouts.request_secs = 5;
    config.gate.pages_root = pages_dir().to_string_lossy().into_owned();
    config
}

/// Start a gateway and return its base URL.
pub async fn spawn_gateway(config: GatewayConfig) -> String {
    let server = GatewayServer::new(config).unwrap();
    let addr = serve(server.router()).await;
    format!("http://{}", addr)
}

/// Plain test client that never follows redirects or stores cookies.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Static pages: `/login`, `/dashboard/clientes`.
pub fn pages_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("erp-gateway-pages-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(dir.join("dashboard")).unwrap();
    std::fs::write(dir.join("login"), "login page").unwrap();
    std::fs::write(dir.join("dashboard").join("clientes"), "clientes page").unwrap();
    dir
}

/// Echo of what the backend received.
async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "content_type": header_str(header::CONTENT_TYPE),
        "authorization": header_str(header::AUTHORIZATION),
        "accept": header_str(header::ACCEPT),
        "request_id": headers.get("x-request-id").and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn login(Json(credentials): Json<Value>) -> Response {
    if credentials["username"] == "admin" && credentials["password"] == "secret" {
        (
            AppendHeaders([
                (header::SET_COOKIE, "access=tok-a; Path=/; HttpOnly"),
                (header::SET_COOKIE, "refresh=tok-r; Path=/; HttpOnly"),
            ]),
            Json(json!({ "user": { "username": "admin", "role": "tecnico" } })),
        )
            .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "No active account found with the given credentials" })),
        )
            .into_response()
    }
}

async fn me(headers: HeaderMap) -> Response {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if cookie.contains("access=") {
        Json(json!({ "username": "admin", "role": "tecnico" })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Authentication credentials were not provided." })))
            .into_response()
    }
}

async fn refresh(Json(body): Json<Value>) -> Response {
    if body["refresh"] == "tok-r" {
        Json(json!({ "access": "tok-b" })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Token is invalid or expired" }))).into_response()
    }
}

async fn media(uri: Uri) -> Response {
    if uri.path() == "/media/fotos/a.png" {
        ([(header::CONTENT_TYPE, "image/png")], PNG).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Backend with the ERP API shape: auth endpoints, a few fixed resources and
/// an echo for everything else under `/api/v1`.
pub fn erp_backend() -> Router {
    Router::new()
        .route("/api/v1/auth/login/", post(login))
        .route("/api/v1/auth/me/", get(me))
        .route("/api/v1/auth/refresh/", post(refresh))
        .route("/api/v1/auth/logout/", post(|| async { Json(json!({ "detail": "ok" })) }))
        .route(
            "/api/v1/cadastro/clientes/",
            get(|| async { Json(json!([{ "id": 1, "nome": "ACME" }, { "id": 2, "nome": "Globex" }])) }),
        )
        .route(
            "/api/v1/cadastro/clientes/invalido/",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "nome": ["Este campo é obrigatório."] }))) }),
        )
        .route(
            "/api/v1/arquivos/logo.png",
            get(|| async { ([(header::CONTENT_TYPE, "image/png")], PNG) }),
        )
        .route("/api/v1/saude", get(|| async { "pong" }))
        .route("/api/v1/equipamentos", get(|| async { Redirect::permanent("/api/v1/equipamentos/") }))
        .route("/api/v1/{*path}", any(echo))
        .route("/api/v1/", any(echo))
        .route("/api/v1", any(echo))
        .route("/media/{*path}", get(media))
}
