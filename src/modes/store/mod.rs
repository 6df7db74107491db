/// Store tier: in-memory mock of the statement executor
///
/// Statements are identified by exact template text and classified as reads or
/// writes by their leading keyword. Nothing is parsed or executed; each phone
/// number maps to a list of operators, generated on first sight.
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{
    is_read_statement, parse_json, render_param, substitute, ApiResponse, Statement,
    StatementRequest, EXEC_PATH,
};

/// Operators a generated history is drawn from
pub const OPERATORS: [&str; 6] = ["Мегафон", "МТС", "Теле-2", "Yota", "Билайн", "Старлайн"];

const MAX_GENERATED_HISTORY: usize = 10;

/// Mock store node
#[derive(Default)]
pub struct MockStore {
    storage: RwLock<HashMap<String, Vec<String>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the history for a number, replacing any existing one
    pub async fn seed(&self, phone_number: &str, history: Vec<String>) {
        self.storage.write().await.insert(phone_number.to_string(), history);
    }

    pub async fn history(&self, phone_number: &str) -> Option<Vec<String>> {
        self.storage.read().await.get(phone_number).cloned()
    }

    /// axum application serving `/api/v1/exec`
    pub fn app(self: Arc<Self>) -> axum::Router {
        axum::Router::new()
            .route(EXEC_PATH, post(exec_handler))
            .with_state(self)
    }

    /// Execute one relayed statement
    pub async fn exec(&self, request: &StatementRequest) -> GatewayResult<ApiResponse> {
        info!(session_key = ?request.session_key, "got exec request");

        let prepared = substitute(&request.stmt, &request.params);
        debug!(session_key = ?request.session_key, statement = %prepared.trim(), "statement prepared");

        let statement = Statement::from_template(&request.stmt)
            .ok_or_else(|| GatewayError::malformed("unknown statement"))?;
        if request.params.len() != statement.arity() {
            return Err(GatewayError::malformed(format!(
                "statement {} takes {} params, got {}",
                statement.name(),
                statement.arity(),
                request.params.len()
            )));
        }

        let phone_number = render_param(&request.params[0]);

        if is_read_statement(&request.stmt) {
            let history = self.history_or_generate(&phone_number).await;
            let data = match statement {
                Statement::GetOperator => history.last().cloned().map(Value::from).unwrap_or(Value::Null),
                Statement::GetLatestMnp if history.len() > 1 => {
                    history.last().cloned().map(Value::from).unwrap_or(Value::Null)
                }
                Statement::GetLatestMnp => Value::Null,
                Statement::GetMnpHistory => Value::from(history),
                Statement::AddMnp => return Err(GatewayError::malformed("write classified as read")),
            };
            return Ok(ApiResponse::with_data(data));
        }

        match statement {
            Statement::AddMnp => {
                let operator = render_param(&request.params[1]);
                let mut storage = self.storage.write().await;
                storage
                    .entry(phone_number)
                    .or_insert_with(generate_history)
                    .push(operator);
                Ok(ApiResponse::ok())
            }
            _ => Err(GatewayError::malformed("read classified as write")),
        }
    }

    async fn history_or_generate(&self, phone_number: &str) -> Vec<String> {
        if let Some(history) = self.history(phone_number).await {
            return history;
        }
        let mut storage = self.storage.write().await;
        storage
            .entry(phone_number.to_string())
            .or_insert_with(generate_history)
            .clone()
    }
}

/// Random history of 1..=10 operators
fn generate_history() -> Vec<String> {
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(1..=MAX_GENERATED_HISTORY);
    (0..len)
        .filter_map(|_| OPERATORS.choose(&mut rng))
        .map(|op| op.to_string())
        .collect()
}

async fn exec_handler(State(store): State<Arc<MockStore>>, body: Bytes) -> Response {
    let result = match parse_json::<StatementRequest>(&body) {
        Ok(request) => store.exec(&request).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}
