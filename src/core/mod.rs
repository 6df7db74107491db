/// Core abstractions shared by the gateway and router tiers
pub mod backend;
pub mod session;

pub use backend::BackendPool;
pub use session::{Session, SessionAuth, SessionError, SessionStore};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A downstream endpoint (router replica or store node)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new<S: Into<String>>(host: S, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL used when relaying HTTP calls to this endpoint
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Full URL for `path`, which must start with '/'
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
