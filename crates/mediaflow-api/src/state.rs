//! Shared application state.

use mediaflow_core::Config;
use mediaflow_services::MediaEngine;
use std::sync::Arc;

pub struct AppState {
    pub engine: Arc<MediaEngine>,
    pub config: Config,
}

impl AppState {
    pub fn new(engine: Arc<MediaEngine>, config: Config) -> Self {
        Self { engine, config }
    }
}
