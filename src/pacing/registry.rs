//! Route to engine registry

use super::engine::PacingEngine;
use super::route::RouteKey;
use super::types::PacingConfig;
use crate::trace::Tracer;
use dashmap::DashMap;
use tracing::debug;

/// Owns one [`PacingEngine`] per normalized route
///
/// Engines are created on first use with the registry's configuration and
/// are never replaced or removed, so every caller of a route shares the same
/// engine for the registry's lifetime.
#[derive(Debug)]
pub struct PacingRegistry {
    config: PacingConfig,
    tracer: Tracer,
    engines: DashMap<RouteKey, PacingEngine>,
}

impl PacingRegistry {
    /// Create an empty registry
    pub fn new(config: PacingConfig) -> Self {
        Self::with_tracer(config, Tracer::disabled())
    }

    /// Create an empty registry whose engines report to `tracer`
    pub fn with_tracer(config: PacingConfig, tracer: Tracer) -> Self {
        Self {
            config,
            tracer,
            engines: DashMap::new(),
        }
    }

    /// Engine for the route of `path`, created if absent
    ///
    /// Must be called from within a tokio runtime.
    pub fn for_route(&self, path: &str) -> PacingEngine {
        let key = RouteKey::new(path);
        if let Some(engine) = self.engines.get(&key) {
            return engine.value().clone();
        }

        self.engines
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(route = %key, "creating pacing engine");
                PacingEngine::new(key.clone(), self.config.clone(), self.tracer.clone())
            })
            .value()
            .clone()
    }

    /// Shared engine configuration
    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Routes with an engine
    pub fn routes(&self) -> Vec<RouteKey> {
        let mut routes: Vec<RouteKey> = self.engines.iter().map(|e| e.key().clone()).collect();
        routes.sort();
        routes
    }

    /// Number of engines
    pub fn len(&self) -> usize {
        self.engines.len()
    }

    /// Whether no engine exists yet
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl Default for PacingRegistry {
    fn default() -> Self {
        Self::new(PacingConfig::default())
    }
}
