/// HTTP hops between tiers
use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use crate::core::Endpoint;
use crate::error::GatewayResult;
use crate::protocol::{StatementRequest, EXEC_PATH};

/// An inbound call being replayed against the next tier
#[derive(Debug, Clone)]
pub struct ForwardedCall {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Downstream status and JSON body, returned to the caller unchanged
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Transport used to reach the next tier.
///
/// Implementations must not retry: a failure is reported once and surfaces to
/// the caller of the hop.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Replay `call` against `endpoint`
    async fn forward(&self, endpoint: &Endpoint, call: ForwardedCall) -> GatewayResult<RelayResponse>;

    /// Send a statement to a store node
    async fn exec(&self, endpoint: &Endpoint, request: &StatementRequest) -> GatewayResult<RelayResponse>;
}

/// reqwest-backed transport; one client, pooled connections per endpoint
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn into_relay(response: reqwest::Response) -> GatewayResult<RelayResponse> {
        let status = response.status();
        let body = response.json::<Value>().await?;
        Ok(RelayResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn forward(&self, endpoint: &Endpoint, call: ForwardedCall) -> GatewayResult<RelayResponse> {
        let response = self
            .client
            .request(call.method, endpoint.url(&call.path))
            .headers(call.headers)
            .json(&call.body)
            .send()
            .await?;
        Self::into_relay(response).await
    }

    async fn exec(&self, endpoint: &Endpoint, request: &StatementRequest) -> GatewayResult<RelayResponse> {
        let response = self
            .client
            .post(endpoint.url(EXEC_PATH))
            .json(request)
            .send()
            .await?;
        Self::into_relay(response).await
    }
}
