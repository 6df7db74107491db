//! Full three-tier scenarios over real sockets
//!
//! Each test spawns a store, a router and a gateway on ephemeral ports and
//! drives them through `GatewayClient`.

use portgate::config::{Config, TierConfig};
use portgate::core::Endpoint;
use portgate::modes::GatewayClient;
use portgate::Portgate;
use reqwest::StatusCode;
use serde_json::json;
use std::net::SocketAddr;
use tokio::net::TcpListener;

async fn spawn_tier(tier: TierConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        tier,
        ..Config::default()
    };
    let portgate = Portgate::new(config).unwrap();
    tokio::spawn(async move {
        portgate.serve(listener).await.unwrap();
    });
    addr
}

fn endpoint(addr: SocketAddr) -> Endpoint {
    Endpoint::new(addr.ip().to_string(), addr.port())
}

/// Store -> router -> gateway chain; returns the gateway base URL
async fn start_stack() -> String {
    let store = spawn_tier(TierConfig::Store {}).await;
    let router = spawn_tier(TierConfig::Router {
        primary: endpoint(store),
        replicas: vec![endpoint(store)],
    })
    .await;
    let gateway = spawn_tier(TierConfig::Gateway {
        routers: vec![endpoint(router)],
    })
    .await;
    format!("http://{}", gateway)
}

#[tokio::test]
async fn test_login_lookup_port_logout() {
    let base = start_stack().await;
    let client = GatewayClient::new(base).unwrap();

    let (status, body) = client.get_operator("89999734509").await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.description.as_deref(), Some("user is not logged in!"));

    let (status, body) = client.login("ivan", "ivan").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_ok());

    let (status, body) = client.get_mnp_history("89999734509").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let history = body.data.unwrap().as_array().unwrap().len();
    assert!(history >= 1);

    let (status, body) = client.add_mnp("89999734509", "Yota").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_ok());

    // the port is now both the current operator and the latest port
    let (_, body) = client.get_operator("89999734509").await.unwrap();
    assert_eq!(body.data, Some(json!("Yota")));
    let (_, body) = client.get_latest_mnp("89999734509").await.unwrap();
    assert_eq!(body.data, Some(json!("Yota")));
    let (_, body) = client.get_mnp_history("89999734509").await.unwrap();
    assert_eq!(body.data.unwrap().as_array().unwrap().len(), history + 1);

    let (status, body) = client.logout().await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_ok());

    let (status, _) = client.get_operator("89999734509").await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rejections_through_the_stack() {
    let base = start_stack().await;
    let client = GatewayClient::new(base.clone()).unwrap();

    let (status, body) = client.login("ivan", "petr").await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.description.as_deref(), Some("invalid login or password!"));

    client.login("ivan", "ivan").await.unwrap();
    let (status, body) = client.login("ivan", "ivan").await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.description.as_deref(), Some("already logged in!"));

    // unknown tier segment is refused by the gateway itself
    let raw = reqwest::Client::builder().cookie_store(true).build().unwrap();
    raw.post(format!("{}/api/v1/login", base))
        .json(&json!({"login": "olga", "password": "olga"}))
        .send()
        .await
        .unwrap();
    let response = raw
        .post(format!("{}/api/v1/billing/charge", base))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"code": -1, "description": "could not transfer request!"}));

    // router rejects a body missing operator_name after the gateway forwards it
    let response = raw
        .post(format!("{}/api/v1/mnp/add_mnp", base))
        .json(&json!({"phone_number": "1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_independent_callers_get_independent_sessions() {
    let base = start_stack().await;
    let ivan = GatewayClient::new(base.clone()).unwrap();
    let petr = GatewayClient::new(base).unwrap();

    ivan.login("ivan", "ivan").await.unwrap();
    let (status, _) = petr.get_operator("1").await.unwrap();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = petr.login("petr", "petr").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ivan.get_operator("1").await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_dead_router_surfaces_as_bad_gateway() {
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let gateway = spawn_tier(TierConfig::Gateway {
        routers: vec![endpoint(closed)],
    })
    .await;
    let client = GatewayClient::new(format!("http://{}", gateway)).unwrap();

    let (status, _) = client.login("ivan", "ivan").await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (status, body) = client.get_operator("89999734509").await.unwrap();
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body.code, -1);
    assert!(body.description.unwrap().starts_with("downstream error:"));
}
