pub mod config;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::services::backend::{HttpQuizBackend, QuizBackend};
use crate::services::quiz_session::SessionOptions;
use crate::services::session_registry::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: Arc<dyn QuizBackend>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self> {
        let backend = HttpQuizBackend::new(config.backend_url.clone(), config.backend_timeout())?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    pub fn with_backend(config: &Config, backend: Arc<dyn QuizBackend>) -> Self {
        Self {
            config: Arc::new(config.clone()),
            backend,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            tick: self.config.timer_tick(),
            header_offset_px: self.config.header_offset_px,
        }
    }
}
