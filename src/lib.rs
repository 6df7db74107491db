pub mod config;
pub mod error;
/// Portgate - two-tier mobile number portability gateway
///
/// One binary plays one of three tiers, chosen by configuration:
/// 1. Gateway: authenticates callers and forwards their calls round robin to routers
/// 2. Router: translates calls into statements with read/write splitting over stores
/// 3. Store: in-memory mock executing the fixed statement set
pub mod core;
pub mod modes;
pub mod protocol;
pub mod utils;

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{Config, TierConfig};
use crate::core::BackendPool;
use crate::error::GatewayResult;
use crate::modes::{Gateway, MnpRouter, MockStore};
use crate::protocol::{HttpTransport, Transport};

/// One portgate process
#[derive(Debug, Clone)]
pub struct Portgate {
    config: Config,
}

impl Portgate {
    /// Create a new process from a validated configuration
    pub fn new(config: Config) -> GatewayResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Tier name for logging
    pub fn mode_name(&self) -> &'static str {
        self.config.tier.mode_name()
    }

    /// Build the axum application for the configured tier
    pub fn build_app(&self) -> GatewayResult<axum::Router> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new());
        self.build_app_with(transport)
    }

    /// Build the application over a caller-supplied transport
    pub fn build_app_with(&self, transport: Arc<dyn Transport>) -> GatewayResult<axum::Router> {
        let app = match &self.config.tier {
            TierConfig::Gateway { routers } => {
                let pool = BackendPool::new("routers", routers.clone())?;
                let gateway = Gateway::new(pool, transport)
                    .with_latency(self.config.server.latency_bounds());
                Arc::new(gateway).app()
            }
            TierConfig::Router { primary, replicas } => {
                let router = MnpRouter::new(primary.clone(), replicas.clone(), transport)?;
                Arc::new(router).app()
            }
            TierConfig::Store {} => Arc::new(MockStore::new()).app(),
        };
        Ok(app)
    }

    /// Bind the configured address and serve until the process exits
    pub async fn run(&self) -> GatewayResult<()> {
        let listener = TcpListener::bind(self.config.server.bind_addr()).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> GatewayResult<()> {
        let app = self.build_app()?;
        info!(
            mode = self.mode_name(),
            addr = %listener.local_addr()?,
            "portgate listening"
        );
        axum::serve(listener, app).await?;
        Ok(())
    }
}
