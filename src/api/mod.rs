pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::ml::DiagnosisService;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DiagnosisService>,
    pub started_at: Instant,
    pub cors_permissive: bool,
}

impl AppState {
    pub fn new(service: Arc<DiagnosisService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
            cors_permissive: true,
        }
    }

    /// Toggle the permissive CORS layer
    pub fn with_cors(mut self, permissive: bool) -> Self {
        self.cors_permissive = permissive;
        self
    }
}
