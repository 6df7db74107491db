/// Gateway tier: caller authentication and round-robin forwarding
///
/// Per-caller state machine: unauthenticated -> authenticated -> logged out.
/// Login and logout are answered locally; everything else under the API prefix
/// is forwarded to the router tier once the caller is authenticated.
pub mod cookie;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{BackendPool, Session, SessionStore};
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::transport::{ForwardedCall, RelayResponse};
use crate::protocol::{
    first_segment, inject_session_key, parse_json, relay_headers, strip_api_prefix, ApiResponse,
    LoginRequest, Transport, API_PREFIX, LOGIN_PATH, LOGOUT_PATH, MNP_SEGMENT,
};
use crate::utils::inject_latency;

pub use cookie::{CookieSealer, SESSION_COOKIE};

/// Session resolved for one inbound call
pub struct SessionContext {
    pub token: String,
    pub session: Session,
    /// Present when the token was minted for this call and must be handed back
    set_cookie: Option<HeaderValue>,
}

impl SessionContext {
    /// Render `result`, attaching the session cookie if one was minted
    fn finish<T: IntoResponse>(self, result: GatewayResult<T>) -> Response {
        let mut response = match result {
            Ok(ok) => ok.into_response(),
            Err(err) => err.into_response(),
        };
        if let Some(cookie) = self.set_cookie {
            response.headers_mut().insert(header::SET_COOKIE, cookie);
        }
        response
    }
}

/// Front tier state shared by all handlers
pub struct Gateway {
    sessions: SessionStore,
    routers: BackendPool,
    transport: Arc<dyn Transport>,
    cookies: CookieSealer,
    latency: Option<(u64, u64)>,
}

impl Gateway {
    pub fn new(routers: BackendPool, transport: Arc<dyn Transport>) -> Self {
        Self {
            sessions: SessionStore::new(),
            routers,
            transport,
            cookies: CookieSealer::new(),
            latency: None,
        }
    }

    /// Inject a random login delay in `[min, max]` milliseconds
    pub fn with_latency(mut self, bounds: Option<(u64, u64)>) -> Self {
        self.latency = bounds;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn routers(&self) -> &BackendPool {
        &self.routers
    }

    /// axum application serving the gateway routes
    pub fn app(self: Arc<Self>) -> axum::Router {
        axum::Router::new()
            .route(LOGIN_PATH, post(login_handler))
            .route(LOGOUT_PATH, post(logout_handler))
            .fallback(transfer_handler)
            .with_state(self)
    }

    /// Look up the caller's session, minting a token if the cookie is absent or forged
    pub async fn resolve_session(&self, headers: &HeaderMap) -> SessionContext {
        let (token, set_cookie) = match self.cookies.token_from_headers(headers) {
            Some(token) => (token, None),
            None => {
                let token = self.cookies.issue();
                let cookie = self.cookies.set_cookie(&token);
                (token, cookie)
            }
        };
        let session = self.sessions.get_or_create(&token).await;

        SessionContext {
            token,
            session,
            set_cookie,
        }
    }

    pub async fn login(&self, ctx: &SessionContext, body: &[u8]) -> GatewayResult<Json<ApiResponse>> {
        info!(session_key = ?ctx.session.session_key(), "got login request");

        if let Some(auth) = &ctx.session.auth {
            return Err(GatewayError::AuthConflict {
                login: auth.login.clone(),
            });
        }

        let request: LoginRequest = parse_json(body)?;
        debug!(login = %request.login, "login request params");

        inject_latency(self.latency).await;

        let session_key = self
            .sessions
            .login(&ctx.token, &request.login, &request.password)
            .await?;

        info!(session_key, "user '{}' successfully logged in", request.login);
        Ok(Json(ApiResponse::ok()))
    }

    pub async fn logout(&self, ctx: &SessionContext) -> GatewayResult<Json<ApiResponse>> {
        info!(session_key = ?ctx.session.session_key(), "got logout request");

        let cleared = self.sessions.logout(&ctx.token).await?;

        info!(
            session_key = cleared.session_key,
            "user '{}' successfully logged out", cleared.login
        );
        Ok(Json(ApiResponse::ok()))
    }

    /// Forward an authenticated call to the next router replica
    pub async fn transfer(
        &self,
        ctx: &SessionContext,
        method: Method,
        uri: &Uri,
        headers: &HeaderMap,
        body: &[u8],
    ) -> GatewayResult<RelayResponse> {
        let full_path = uri.path();
        if !full_path.starts_with(API_PREFIX) {
            return Err(GatewayError::NotFound {
                path: full_path.to_string(),
            });
        }

        let path = strip_api_prefix(full_path);
        debug!(%method, path, "request needs transfer");

        let session_key = ctx.session.session_key().ok_or(GatewayError::AuthRequired)?;

        match first_segment(path) {
            MNP_SEGMENT => {}
            _ => return Err(GatewayError::unroutable(path)),
        }

        let call = ForwardedCall {
            method,
            path: full_path.to_string(),
            headers: relay_headers(headers),
            body: inject_session_key(body, session_key)?,
        };

        let endpoint = self.routers.next();
        debug!(
            session_key,
            endpoint = %endpoint,
            method = %call.method,
            path = full_path,
            "transferring request to router"
        );

        let response = self.transport.forward(endpoint, call).await?;
        debug!(session_key, status = %response.status, "transferred request successfully");
        Ok(response)
    }
}

async fn login_handler(State(gateway): State<Arc<Gateway>>, headers: HeaderMap, body: Bytes) -> Response {
    let ctx = gateway.resolve_session(&headers).await;
    let result = gateway.login(&ctx, &body).await;
    ctx.finish(result)
}

async fn logout_handler(State(gateway): State<Arc<Gateway>>, headers: HeaderMap) -> Response {
    let ctx = gateway.resolve_session(&headers).await;
    let result = gateway.logout(&ctx).await;
    ctx.finish(result)
}

async fn transfer_handler(
    State(gateway): State<Arc<Gateway>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = gateway.resolve_session(&headers).await;
    let result = gateway.transfer(&ctx, method, &uri, &headers, &body).await;
    ctx.finish(result)
}
