//! HTTP surface for filevault.
//!
//! Exposes handshake code issuance, the progress WebSocket and a health check.

pub mod error;
pub mod progress;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;

use std::sync::Arc;

use crate::asset::AssetService;
use crate::progress::{HandshakeBroker, ProgressBus};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Progress bus shared with the asset service.
    pub bus: Arc<ProgressBus>,
    /// Handshake code broker.
    pub broker: HandshakeBroker,
    /// Asset service; its database backs the health check.
    pub assets: AssetService,
}

impl AppState {
    /// Build state around an asset service, sharing its progress bus.
    pub fn new(assets: AssetService, broker: HandshakeBroker) -> Self {
        Self {
            bus: Arc::clone(assets.bus()),
            broker,
            assets,
        }
    }
}
