/// Router tier: read/write splitting over store replicas
///
/// Four fixed operations, each translated 1:1 into a statement relayed to a
/// store node. Writes always go to the primary; reads rotate over the replicas
/// and the primary.
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{BackendPool, Endpoint};
use crate::error::GatewayResult;
use crate::protocol::transport::RelayResponse;
use crate::protocol::{
    parse_json, AddMnpRequest, PhoneNumberRequest, Statement, StatementRequest, Transport,
    ADD_MNP_PATH, GET_LATEST_MNP_PATH, GET_MNP_HISTORY_PATH, GET_OPERATOR_PATH,
};

/// Mid tier state shared by all handlers
pub struct MnpRouter {
    write_pool: BackendPool,
    read_pool: BackendPool,
    transport: Arc<dyn Transport>,
}

impl MnpRouter {
    /// Build the write pool from `primary` and the read pool from `replicas`
    /// followed by `primary`
    pub fn new(primary: Endpoint, replicas: Vec<Endpoint>, transport: Arc<dyn Transport>) -> GatewayResult<Self> {
        let write_pool = BackendPool::new("write", vec![primary.clone()])?;

        let mut readers = replicas;
        readers.push(primary);
        let read_pool = BackendPool::new("read", readers)?;

        Ok(Self {
            write_pool,
            read_pool,
            transport,
        })
    }

    pub fn write_pool(&self) -> &BackendPool {
        &self.write_pool
    }

    pub fn read_pool(&self) -> &BackendPool {
        &self.read_pool
    }

    /// Pool a statement is dispatched to
    pub fn pool_for(&self, statement: Statement) -> &BackendPool {
        if statement.is_read() {
            &self.read_pool
        } else {
            &self.write_pool
        }
    }

    /// axum application serving the four operations
    pub fn app(self: Arc<Self>) -> axum::Router {
        axum::Router::new()
            .route(GET_OPERATOR_PATH, post(get_operator_handler))
            .route(GET_LATEST_MNP_PATH, post(get_latest_mnp_handler))
            .route(GET_MNP_HISTORY_PATH, post(get_mnp_history_handler))
            .route(ADD_MNP_PATH, post(add_mnp_handler))
            .with_state(self)
    }

    /// Dispatch a read operation keyed by phone number
    pub async fn read(&self, statement: Statement, body: &[u8]) -> GatewayResult<RelayResponse> {
        info!(operation = statement.name(), "got request");
        let request: PhoneNumberRequest = parse_json(body)?;
        debug!(
            operation = statement.name(),
            session_key = ?request.session_key,
            phone_number = %request.phone_number,
            "request params"
        );

        let stmt = StatementRequest::new(statement, vec![Value::from(request.phone_number)])?
            .with_session_key(request.session_key);
        self.relay(statement, stmt).await
    }

    /// Record a number port on the primary
    pub async fn add_mnp(&self, body: &[u8]) -> GatewayResult<RelayResponse> {
        info!(operation = "add_mnp", "got request");
        let request: AddMnpRequest = parse_json(body)?;
        debug!(
            operation = "add_mnp",
            session_key = ?request.session_key,
            phone_number = %request.phone_number,
            operator_name = %request.operator_name,
            "request params"
        );

        let stmt = StatementRequest::new(
            Statement::AddMnp,
            vec![Value::from(request.phone_number), Value::from(request.operator_name)],
        )?
        .with_session_key(request.session_key);
        self.relay(Statement::AddMnp, stmt).await
    }

    async fn relay(&self, statement: Statement, request: StatementRequest) -> GatewayResult<RelayResponse> {
        let pool = self.pool_for(statement);
        let endpoint = pool.next();
        debug!(
            session_key = ?request.session_key,
            pool = pool.name(),
            endpoint = %endpoint,
            "sending request to database"
        );

        let response = self.transport.exec(endpoint, &request).await?;
        debug!(session_key = ?request.session_key, status = %response.status, "got response from database");
        Ok(response)
    }
}

fn respond(result: GatewayResult<RelayResponse>) -> Response {
    match result {
        Ok(response) => response.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn get_operator_handler(State(router): State<Arc<MnpRouter>>, body: Bytes) -> Response {
    respond(router.read(Statement::GetOperator, &body).await)
}

async fn get_latest_mnp_handler(State(router): State<Arc<MnpRouter>>, body: Bytes) -> Response {
    respond(router.read(Statement::GetLatestMnp, &body).await)
}

async fn get_mnp_history_handler(State(router): State<Arc<MnpRouter>>, body: Bytes) -> Response {
    respond(router.read(Statement::GetMnpHistory, &body).await)
}

async fn add_mnp_handler(State(router): State<Arc<MnpRouter>>, body: Bytes) -> Response {
    respond(router.add_mnp(&body).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::protocol::transport::mock::{closed_endpoint, Recorded, RecordingTransport, UnreachableTransport};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    fn router(replicas: u16) -> (Arc<MnpRouter>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let replicas = (0..replicas).map(|i| Endpoint::new("db-ro", 9001 + i)).collect();
        let router = MnpRouter::new(Endpoint::new("db-rw", 9000), replicas, transport.clone()).unwrap();
        (Arc::new(router), transport)
    }

    fn exec_targets(transport: &RecordingTransport) -> Vec<(String, StatementRequest)> {
        transport
            .recorded()
            .into_iter()
            .map(|call| match call {
                Recorded::Exec(endpoint, request) => (endpoint.to_string(), request),
                other => panic!("unexpected call: {:?}", other),
            })
            .collect()
    }

    #[test]
    fn test_pool_composition() {
        let (router, _) = router(2);
        assert_eq!(router.write_pool().endpoints(), &[Endpoint::new("db-rw", 9000)]);
        assert_eq!(
            router.read_pool().endpoints(),
            &[
                Endpoint::new("db-ro", 9001),
                Endpoint::new("db-ro", 9002),
                Endpoint::new("db-rw", 9000),
            ]
        );
    }

    #[tokio::test]
    async fn test_reads_rotate_over_replicas_and_primary() {
        let (router, transport) = router(2);
        for _ in 0..4 {
            router
                .read(Statement::GetOperator, br#"{"phone_number":"89999734509"}"#)
                .await
                .unwrap();
        }

        let targets: Vec<String> = exec_targets(&transport).into_iter().map(|(t, _)| t).collect();
        assert_eq!(targets, vec!["db-ro:9001", "db-ro:9002", "db-rw:9000", "db-ro:9001"]);
    }

    #[tokio::test]
    async fn test_writes_always_hit_primary() {
        let (router, transport) = router(3);
        for _ in 0..5 {
            router
                .add_mnp(br#"{"phone_number":"89999734509","operator_name":"Yota","session_key":4}"#)
                .await
                .unwrap();
        }

        for (target, request) in exec_targets(&transport) {
            assert_eq!(target, "db-rw:9000");
            assert_eq!(request.statement(), Some(Statement::AddMnp));
            assert_eq!(request.params, vec![json!("89999734509"), json!("Yota")]);
            assert_eq!(request.session_key, Some(4));
        }
    }

    #[tokio::test]
    async fn test_statement_per_operation() {
        let (router, transport) = router(0);
        let body = br#"{"phone_number":"1"}"#;
        router.read(Statement::GetOperator, body).await.unwrap();
        router.read(Statement::GetLatestMnp, body).await.unwrap();
        router.read(Statement::GetMnpHistory, body).await.unwrap();

        let statements: Vec<Statement> = exec_targets(&transport)
            .into_iter()
            .map(|(_, r)| r.statement().unwrap())
            .collect();
        assert_eq!(
            statements,
            vec![Statement::GetOperator, Statement::GetLatestMnp, Statement::GetMnpHistory]
        );
    }

    #[tokio::test]
    async fn test_missing_keys_rejected_without_relay() {
        let (router, transport) = router(1);
        let err = router.add_mnp(br#"{"phone_number":"1"}"#).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
        let err = router.read(Statement::GetOperator, b"{}").await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedRequest(_)));
        assert!(transport.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_http_route_returns_downstream_body() {
        let (router, _) = router(0);
        let request = Request::builder()
            .method("POST")
            .uri(GET_OPERATOR_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"phone_number":"89999734509"}"#))
            .unwrap();

        let response = router.clone().app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, json!({"code": 0, "data": "db-rw:9000"}));

        let request = Request::builder()
            .method("POST")
            .uri(ADD_MNP_PATH)
            .body(Body::from("not json"))
            .unwrap();
        let response = router.clone().app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_once() {
        let transport = Arc::new(UnreachableTransport::default());
        let router = MnpRouter::new(closed_endpoint().await, vec![], transport.clone()).unwrap();

        let err = router
            .read(Statement::GetOperator, br#"{"phone_number":"1"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Downstream(_)));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(transport.attempts(), 1);
    }
}
