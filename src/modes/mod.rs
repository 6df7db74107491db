/// The three server tiers plus the caller-side client
///
/// Each tier owns its state behind an `Arc` and exposes an `app()` returning
/// the axum router that serves it.
pub mod caller;
pub mod gateway;
pub mod router;
pub mod store;

pub use caller::{GatewayClient, InteractiveShell, LoadGenerator};
pub use gateway::Gateway;
pub use router::MnpRouter;
pub use store::MockStore;
