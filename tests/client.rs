mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect},
    routing::{get, post},
    Json, Router,
};
use futures_util::future::join_all;
use serde_json::{json, Value};

use common::{gateway_config, serve, spawn_gateway};
use erp_gateway::client::FormField;
use erp_gateway::config::ClientConfig;
use erp_gateway::{ApiClient, ClientError};

fn fast_retries() -> ClientConfig {
    ClientConfig {
        retry_delay_ms: 10,
        ..ClientConfig::default()
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok())
}

#[derive(Clone, Default)]
struct Calls {
    pedidos: Arc<AtomicUsize>,
    refresh: Arc<AtomicUsize>,
}

/// Backend where `tok-a` is expired and a refresh yields `tok-b`, unless
/// `refresh_ok` is false.
fn session_backend(calls: Calls, refresh_ok: bool) -> Router {
    let pedidos = calls.pedidos.clone();
    let refreshes = calls.refresh.clone();

    Router::new()
        .route(
            "/api/v1/auth/login/",
            post(|| async {
                (
                    AppendHeaders([
                        (header::SET_COOKIE, "access=tok-a; Path=/"),
                        (header::SET_COOKIE, "refresh=tok-r; Path=/"),
                    ]),
                    Json(json!({ "user": { "username": "admin" } })),
                )
            }),
        )
        .route(
            "/api/v1/auth/refresh/",
            post(move || {
                let refreshes = refreshes.clone();
                async move {
                    refreshes.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(150)).await;
                    if refresh_ok {
                        Json(json!({ "access": "tok-b" })).into_response()
                    } else {
                        StatusCode::UNAUTHORIZED.into_response()
                    }
                }
            }),
        )
        .route(
            "/api/v1/compras/pedidos/",
            get(move |headers: HeaderMap| {
                let pedidos = pedidos.clone();
                async move {
                    pedidos.fetch_add(1, Ordering::SeqCst);
                    if bearer(&headers) == Some("Bearer tok-b") {
                        Json(json!({ "count": 2 })).into_response()
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Token expired" }))).into_response()
                    }
                }
            }),
        )
}

async fn logged_in_client(calls: Calls, refresh_ok: bool, redirects: Arc<AtomicUsize>) -> ApiClient {
    let backend = serve(session_backend(calls, refresh_ok)).await;
    let gw = spawn_gateway(gateway_config(backend)).await;

    let client = ApiClient::new(&gw, &fast_retries()).unwrap().with_navigator(move || {
        redirects.fetch_add(1, Ordering::SeqCst);
    });
    client.login("admin", "secret").await.unwrap();
    client
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let calls = Calls::default();
    let redirects = Arc::new(AtomicUsize::new(0));
    let client = logged_in_client(calls.clone(), true, redirects.clone()).await;

    let results = join_all((0..5).map(|_| client.get("/compras/pedidos/"))).await;

    assert_eq!(calls.refresh.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap(), Some(json!({ "count": 2 })));
    }
    assert_eq!(redirects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_refresh_redirects_once() {
    let calls = Calls::default();
    let redirects = Arc::new(AtomicUsize::new(0));
    let client = logged_in_client(calls.clone(), false, redirects.clone()).await;

    let results = join_all((0..5).map(|_| client.get("/compras/pedidos/"))).await;

    assert_eq!(calls.refresh.load(Ordering::SeqCst), 1);
    for result in results {
        assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    }
    assert_eq!(redirects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_second_401_after_refresh_is_terminal() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = refreshes.clone();
    let backend = serve(Router::new().route(
        "/api/v1/financeiro/contas/",
        get(|| async { StatusCode::UNAUTHORIZED }),
    ))
    .await;
    let gw = spawn_gateway(gateway_config(backend)).await;

    let redirects = Arc::new(AtomicUsize::new(0));
    let seen = redirects.clone();
    let client = ApiClient::new(&gw, &fast_retries())
        .unwrap()
        .with_refresher(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            futures_util::FutureExt::boxed(async { true })
        })
        .with_navigator(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

    let result = client.get("/financeiro/contas/").await;
    assert!(matches!(result, Err(ClientError::NotAuthenticated)));
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(redirects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cold_start_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let backend = serve(Router::new().route(
        "/api/v1/estoque/itens/",
        get(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                } else {
                    Json(json!([{ "id": 7 }])).into_response()
                }
            }
        }),
    ))
    .await;
    let gw = spawn_gateway(gateway_config(backend)).await;
    let client = ApiClient::new(&gw, &fast_retries()).unwrap();

    let items = client.get("/estoque/itens/").await.unwrap();
    assert_eq!(items, Some(json!([{ "id": 7 }])));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_cold_start_exhausted() {
    let backend = serve(Router::new().route(
        "/api/v1/estoque/itens/",
        get(|| async { StatusCode::BAD_GATEWAY }),
    ))
    .await;
    let gw = spawn_gateway(gateway_config(backend)).await;
    let client = ApiClient::new(&gw, &fast_retries()).unwrap();

    match client.get("/estoque/itens/").await {
        Err(ClientError::Exhausted { status, attempts }) => {
            assert_eq!(status, 502);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_validation_error_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let backend = serve(Router::new().route(
        "/api/v1/cadastro/clientes/",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::BAD_REQUEST, Json(json!({ "cnpj": ["CNPJ inválido"] })))
            }
        }),
    ))
    .await;
    let gw = spawn_gateway(gateway_config(backend)).await;
    let client = ApiClient::new(&gw, &fast_retries()).unwrap();

    match client.post_json("/cadastro/clientes/", &json!({ "cnpj": "123" })).await {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body["cnpj"][0], "CNPJ inválido");
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_non_json_body_is_none() {
    let backend = serve(Router::new().route("/api/v1/relatorio.csv", get(|| async { "id;nome\n1;ACME\n" }))).await;
    let gw = spawn_gateway(gateway_config(backend)).await;
    let client = ApiClient::new(&gw, &fast_retries()).unwrap();

    assert_eq!(client.get("/relatorio.csv").await.unwrap(), None);

    let request = erp_gateway::client::ApiRequest::new(reqwest::Method::GET, client.proxy_path("/relatorio.csv"));
    let bytes = client.fetch_bytes(&request).await.unwrap();
    assert_eq!(bytes.as_ref(), b"id;nome\n1;ACME\n");
}

#[tokio::test]
async fn test_redirect_surfaces_as_error() {
    // Talks to a server that redirects directly, as a misrouted gateway would.
    let addr = serve(Router::new().route(
        "/api/proxy/equipamentos",
        get(|| async { Redirect::temporary("/api/proxy/equipamentos/") }),
    ))
    .await;
    let client = ApiClient::new(&format!("http://{}", addr), &fast_retries()).unwrap();

    match client.get("/equipamentos").await {
        Err(ClientError::Redirect { status, location }) => {
            assert_eq!(status, 307);
            assert_eq!(location.as_deref(), Some("/api/proxy/equipamentos/"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_form_upload_through_gateway() {
    let backend = serve(Router::new().route(
        "/api/v1/manutencoes/anexos/",
        post(|headers: HeaderMap, body: axum::body::Bytes| async move {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            Json(json!({
                "multipart": content_type.starts_with("multipart/form-data; boundary="),
                "body": String::from_utf8_lossy(&body),
            }))
        }),
    ))
    .await;
    let gw = spawn_gateway(gateway_config(backend)).await;
    let client = ApiClient::new(&gw, &fast_retries()).unwrap();

    let fields = vec![
        FormField::text("ordem", "15"),
        FormField::file("arquivo", "foto.png", Some("image/png"), b"PNGDATA".to_vec()),
    ];
    let echoed: Value = client
        .post_form("/manutencoes/anexos/", fields)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(echoed["multipart"], true);
    let body = echoed["body"].as_str().unwrap();
    assert!(body.contains("filename=\"foto.png\""));
    assert!(body.contains("PNGDATA"));
}

#[tokio::test]
async fn test_me_and_logout() {
    let backend = serve(common::erp_backend()).await;
    let gw = spawn_gateway(gateway_config(backend)).await;
    let client = ApiClient::new(&gw, &fast_retries()).unwrap();

    assert_eq!(client.me().await.unwrap(), None);

    let session = client.login("admin", "secret").await.unwrap();
    assert_eq!(session["access"], "tok-a");
    let user = client.me().await.unwrap().unwrap();
    assert_eq!(user["username"], "admin");

    client.logout().await.unwrap();
    assert_eq!(client.me().await.unwrap(), None);
}

#[tokio::test]
async fn test_login_failure() {
    let backend = serve(common::erp_backend()).await;
    let gw = spawn_gateway(gateway_config(backend)).await;
    let client = ApiClient::new(&gw, &fast_retries()).unwrap();

    match client.login("admin", "wrong").await {
        Err(ClientError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body["error"], "No active account found with the given credentials");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
