/// Statement relay protocol and request/response schemas shared by all tiers
///
/// Two hops use this module:
/// - Gateway -> Router: an opaque forward of method, path and JSON body, with
///   the caller's `session_key` merged into the body.
/// - Router -> Store: a `StatementRequest` naming one of four fixed statement
///   templates plus its positional parameters.
pub mod transport;

pub use transport::{HttpTransport, Transport};

use axum::http::{header, HeaderMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, GatewayResult};

/// Versioned prefix every route lives under
pub const API_PREFIX: &str = "/api/v1";

pub const LOGIN_PATH: &str = "/api/v1/login";
pub const LOGOUT_PATH: &str = "/api/v1/logout";
pub const EXEC_PATH: &str = "/api/v1/exec";

/// First path segment that the gateway forwards to the router tier
pub const MNP_SEGMENT: &str = "mnp";

pub const GET_OPERATOR_PATH: &str = "/api/v1/mnp/get_operator";
pub const GET_LATEST_MNP_PATH: &str = "/api/v1/mnp/get_latest_mnp";
pub const GET_MNP_HISTORY_PATH: &str = "/api/v1/mnp/get_mnp_history";
pub const ADD_MNP_PATH: &str = "/api/v1/mnp/add_mnp";

/// Body field the gateway injects into forwarded calls
pub const SESSION_KEY_FIELD: &str = "session_key";

/// JSON envelope returned by every tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn ok() -> Self {
        Self {
            code: 0,
            description: None,
            data: None,
        }
    }

    /// Successful read; `data` is always serialized, even when null
    pub fn with_data(data: Value) -> Self {
        Self {
            code: 0,
            description: None,
            data: Some(data),
        }
    }

    pub fn error<S: Into<String>>(description: S) -> Self {
        Self {
            code: -1,
            description: Some(description.into()),
            data: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// `POST /api/v1/login` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

/// Body of the three read operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneNumberRequest {
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<u64>,
}

/// Body of `add_mnp`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMnpRequest {
    pub phone_number: String,
    pub operator_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<u64>,
}

/// The four statements the store understands, matched by exact text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Statement {
    GetOperator,
    GetLatestMnp,
    GetMnpHistory,
    AddMnp,
}

const GET_OPERATOR_STMT: &str = "
SELECT
    mnp.operator_name
FROM
    mnp_schema.mnp
WHERE
    (mnp.phone_number = $1)
ORDER BY
    mnp.ts DESC
LIMIT 1;
";

const GET_LATEST_MNP_STMT: &str = "
SELECT
    mnp.operator_name
FROM
    mnp_schema.mnp
WHERE
    ((mnp.phone_number = $1) AND ((SELECT COUNT(*) FROM mnp_schema.mnp WHERE (mnp.phone_number = $1) > 1)))
ORDER BY
    mnp.ts DESC
LIMIT 1;
";

const GET_MNP_HISTORY_STMT: &str = "
SELECT
    mnp.operator_name
FROM
    mnp_schema.mnp
WHERE
    (mnp.phone_number = $1)
ORDER BY
    mnp.ts DESC;
";

const ADD_MNP_STMT: &str = "
INSERT INTO
    mnp(phone_number, ts, operator_name)
VALUES
    ($1, NOW(), $2);
";

impl Statement {
    pub const ALL: [Statement; 4] = [
        Statement::GetOperator,
        Statement::GetLatestMnp,
        Statement::GetMnpHistory,
        Statement::AddMnp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Statement::GetOperator => "get_operator",
            Statement::GetLatestMnp => "get_latest_mnp",
            Statement::GetMnpHistory => "get_mnp_history",
            Statement::AddMnp => "add_mnp",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            Statement::GetOperator => GET_OPERATOR_STMT,
            Statement::GetLatestMnp => GET_LATEST_MNP_STMT,
            Statement::GetMnpHistory => GET_MNP_HISTORY_STMT,
            Statement::AddMnp => ADD_MNP_STMT,
        }
    }

    /// Identify a statement by exact template text
    pub fn from_template(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.template() == text)
    }

    /// Number of distinct positional placeholders the template declares
    pub fn arity(&self) -> usize {
        match self {
            Statement::AddMnp => 2,
            _ => 1,
        }
    }

    pub fn is_read(&self) -> bool {
        is_read_statement(self.template())
    }
}

/// Text-based read/write classification used by the store
pub fn is_read_statement(text: &str) -> bool {
    text.trim_start().starts_with("SELECT")
}

/// Render a positional parameter the way it is spliced into statement text
pub fn render_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Naive `$1..$n` substitution. This is string splicing for logging and
/// inspection only; nothing executes the result.
pub fn substitute(template: &str, params: &[Value]) -> String {
    let mut text = template.to_string();
    // highest index first so `$1` never clobbers the prefix of `$10`
    for (i, param) in params.iter().enumerate().rev() {
        text = text.replace(&format!("${}", i + 1), &render_param(param));
    }
    text
}

/// `POST /api/v1/exec` body, relayed from router to store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementRequest {
    pub stmt: String,
    pub params: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_key: Option<u64>,
}

impl StatementRequest {
    /// Build a request, checking params against the template's placeholders
    pub fn new(statement: Statement, params: Vec<Value>) -> GatewayResult<Self> {
        if params.len() != statement.arity() {
            return Err(GatewayError::malformed(format!(
                "statement {} takes {} params, got {}",
                statement.name(),
                statement.arity(),
                params.len()
            )));
        }

        Ok(Self {
            stmt: statement.template().to_string(),
            params,
            session_key: None,
        })
    }

    pub fn with_session_key(mut self, session_key: Option<u64>) -> Self {
        self.session_key = session_key;
        self
    }

    pub fn statement(&self) -> Option<Statement> {
        Statement::from_template(&self.stmt)
    }
}

/// Parse a JSON body into `T`, mapping any failure to `MalformedRequest`
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> GatewayResult<T> {
    serde_json::from_slice(body).map_err(|e| GatewayError::malformed(e.to_string()))
}

/// Merge `session_key` into a forwarded JSON body.
///
/// An empty body is treated as `{}`; anything other than a JSON object is
/// rejected.
pub fn inject_session_key(body: &[u8], session_key: u64) -> GatewayResult<Value> {
    let mut value: Value = if body.iter().all(|b| b.is_ascii_whitespace()) {
        Value::Object(Default::default())
    } else {
        parse_json(body)?
    };

    match value.as_object_mut() {
        Some(map) => {
            map.insert(SESSION_KEY_FIELD.to_string(), Value::from(session_key));
            Ok(value)
        }
        None => Err(GatewayError::malformed("forwarded body must be a JSON object")),
    }
}

/// Copy caller headers for relay, dropping the ones the rewrite invalidates
/// and the caller's cookie, which never leaves the gateway.
pub fn relay_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in [
        header::CONTENT_LENGTH,
        header::HOST,
        header::COOKIE,
        header::TRANSFER_ENCODING,
        header::CONNECTION,
    ] {
        out.remove(name);
    }
    out
}

/// Strip the API prefix; `/api/v1/mnp/get_operator` -> `mnp/get_operator`
pub fn strip_api_prefix(path: &str) -> &str {
    path.strip_prefix(API_PREFIX)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or(path)
}

/// First segment of a prefix-stripped path
pub fn first_segment(path: &str) -> &str {
    path.split('/').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_api_response_shapes() {
        assert_eq!(serde_json::to_value(ApiResponse::ok()).unwrap(), json!({"code": 0}));
        assert_eq!(
            serde_json::to_value(ApiResponse::error("user is not logged in!")).unwrap(),
            json!({"code": -1, "description": "user is not logged in!"})
        );
        assert_eq!(
            serde_json::to_value(ApiResponse::with_data(json!("Yota"))).unwrap(),
            json!({"code": 0, "data": "Yota"})
        );
    }

    #[test]
    fn test_statement_templates_are_distinct() {
        for stmt in Statement::ALL {
            assert_eq!(Statement::from_template(stmt.template()), Some(stmt));
        }
        assert_eq!(Statement::from_template("SELECT 1;"), None);
        // exact match only
        assert_eq!(Statement::from_template(Statement::GetOperator.template().trim()), None);
    }

    #[test]
    fn test_statement_classification() {
        assert!(Statement::GetOperator.is_read());
        assert!(Statement::GetLatestMnp.is_read());
        assert!(Statement::GetMnpHistory.is_read());
        assert!(!Statement::AddMnp.is_read());
    }

    #[test]
    fn test_statement_request_checks_arity() {
        let req = StatementRequest::new(Statement::AddMnp, vec![json!("89999734509"), json!("Yota")]).unwrap();
        assert_eq!(req.statement(), Some(Statement::AddMnp));
        assert_eq!(req.params, vec![json!("89999734509"), json!("Yota")]);

        assert!(StatementRequest::new(Statement::AddMnp, vec![json!("89999734509")]).is_err());
        assert!(StatementRequest::new(Statement::GetOperator, vec![]).is_err());
    }

    #[test]
    fn test_statement_request_wire_format() {
        let req = StatementRequest::new(Statement::GetOperator, vec![json!("89999734509")])
            .unwrap()
            .with_session_key(Some(7));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["params"], json!(["89999734509"]));
        assert_eq!(value["session_key"], json!(7));
        assert_eq!(value["stmt"].as_str(), Some(Statement::GetOperator.template()));

        let without_key = StatementRequest::new(Statement::GetOperator, vec![json!("1")]).unwrap();
        assert!(serde_json::to_value(&without_key).unwrap().get("session_key").is_none());
    }

    #[test]
    fn test_substitute() {
        let text = substitute(Statement::AddMnp.template(), &[json!("89999734509"), json!("Yota")]);
        assert!(text.contains("(89999734509, NOW(), Yota)"));

        let text = substitute(Statement::GetLatestMnp.template(), &[json!("123")]);
        assert!(!text.contains("$1"));
        assert_eq!(text.matches("123").count(), 2);
    }

    #[test]
    fn test_inject_session_key() {
        let body = br#"{"phone_number":"89999734509","operator_name":"Yota"}"#;
        let value = inject_session_key(body, 42).unwrap();
        assert_eq!(
            value,
            json!({"phone_number": "89999734509", "operator_name": "Yota", "session_key": 42})
        );

        assert_eq!(inject_session_key(b"", 1).unwrap(), json!({"session_key": 1}));
        assert!(inject_session_key(b"[1,2]", 1).is_err());
        assert!(inject_session_key(b"{not json", 1).is_err());
    }

    #[test]
    fn test_relay_headers_strip_stale_entries() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        headers.insert(header::COOKIE, HeaderValue::from_static("PORTGATE_SESSION=abc"));
        headers.insert(header::HOST, HeaderValue::from_static("gateway:8080"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let out = relay_headers(&headers);
        assert!(out.get(header::CONTENT_LENGTH).is_none());
        assert!(out.get(header::COOKIE).is_none());
        assert!(out.get(header::HOST).is_none());
        assert_eq!(out.get(header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(strip_api_prefix("/api/v1/mnp/get_operator"), "mnp/get_operator");
        assert_eq!(first_segment(strip_api_prefix("/api/v1/mnp/get_operator")), "mnp");
        assert_eq!(first_segment(strip_api_prefix("/api/v1/billing/x")), "billing");
        assert_eq!(first_segment(strip_api_prefix("/api/v1/")), "");
    }

    #[test]
    fn test_parse_json_missing_field() {
        let result: GatewayResult<AddMnpRequest> = parse_json(br#"{"phone_number":"1"}"#);
        assert!(matches!(result, Err(GatewayError::MalformedRequest(_))));

        let ok: PhoneNumberRequest = parse_json(br#"{"phone_number":"1","session_key":3}"#).unwrap();
        assert_eq!(ok.session_key, Some(3));
    }
}
