use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    config::{AppConfig, GeneratorKind},
    generator::{OllamaBackend, ResponseGenerator, StubGenerator},
};

/// Owns the active generator. Built once at startup and handed to the router;
/// `POST /models/reload` swaps the backend variant in place without restarting
/// the process.
pub struct GeneratorRegistry {
    config: Arc<AppConfig>,
    kind: GeneratorKind,
    active: RwLock<Arc<dyn ResponseGenerator>>,
}

impl GeneratorRegistry {
    pub fn initialize(config: Arc<AppConfig>) -> Self {
        let active = Self::build(&config);
        Self {
            kind: config.generator,
            config,
            active: RwLock::new(active),
        }
    }

    fn build(config: &AppConfig) -> Arc<dyn ResponseGenerator> {
        match config.generator {
            GeneratorKind::Stubbed => Arc::new(StubGenerator::new(config.stream_delay)),
            GeneratorKind::Ollama => Arc::new(OllamaBackend::new(config)),
        }
    }

    pub fn kind(&self) -> GeneratorKind {
        self.kind
    }

    pub fn active(&self) -> Arc<dyn ResponseGenerator> {
        self.active.read().clone()
    }

    pub async fn model_loaded(&self) -> bool {
        self.active().ready().await
    }

    /// Rebuild the backend generator. The stub has no external state to
    /// refresh, so reloading it is a no-op.
    pub fn reload(&self) -> &'static str {
        match self.kind {
            GeneratorKind::Ollama => {
                let fresh = Self::build(&self.config);
                *self.active.write() = fresh;
                tracing::info!("ollama backend reloaded");
                "reloaded"
            }
            GeneratorKind::Stubbed => "no_reload_needed",
        }
    }
}
