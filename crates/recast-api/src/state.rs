//! Application state shared across handlers.

use std::sync::Arc;

use recast_db::RunStore;
use recast_engine::{ContentPipeline, ProgressHub, ProgressTokenIssuer};

#[derive(Clone)]
pub struct AppState {
    pub runs: Arc<dyn RunStore>,
    pub pipeline: Arc<ContentPipeline>,
    pub progress: Arc<ProgressHub>,
    pub tokens: Arc<ProgressTokenIssuer>,
    /// Shared secret for write endpoints; `None` leaves them open (dev).
    pub service_api_key: Option<String>,
}
