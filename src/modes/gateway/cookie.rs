/// Tamper-evident session cookie
use axum::http::{header, HeaderMap, HeaderValue};
use sha2::{Digest, Sha256};

use crate::utils::generate_token;

/// Cookie carrying the caller's session token
pub const SESSION_COOKIE: &str = "PORTGATE_SESSION";

/// Seals session tokens as `<token>.<mac>` with a per-process secret.
///
/// The token is opaque and random; the MAC stops callers from minting tokens of
/// their own. A restart rotates the secret, which invalidates every cookie.
#[derive(Clone)]
pub struct CookieSealer {
    secret: [u8; 32],
}

impl CookieSealer {
    pub fn new() -> Self {
        Self::with_secret(rand::random())
    }

    pub fn with_secret(secret: [u8; 32]) -> Self {
        Self { secret }
    }

    /// Mint a fresh token
    pub fn issue(&self) -> String {
        generate_token()
    }

    fn mac(&self, token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret);
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn seal(&self, token: &str) -> String {
        format!("{}.{}", token, self.mac(token))
    }

    /// Recover the token from a sealed value, if the MAC checks out
    pub fn open(&self, value: &str) -> Option<String> {
        let (token, mac) = value.rsplit_once('.')?;
        if token.is_empty() || !constant_time_eq(mac, &self.mac(token)) {
            return None;
        }
        Some(token.to_string())
    }

    /// Find and open the session cookie among the request's `Cookie` headers
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE)
            .find_map(|(_, value)| self.open(value))
    }

    /// `Set-Cookie` value for `token`
    pub fn set_cookie(&self, token: &str) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE,
            self.seal(token)
        ))
        .ok()
    }
}

/// Compare without short-circuiting on the first differing byte
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (byte_a, byte_b) in a.bytes().zip(b.bytes()) {
        result |= byte_a ^ byte_b;
    }

    result == 0
}

impl Default for CookieSealer {
    fn default() -> Self {
        Self::new()
    }
}
