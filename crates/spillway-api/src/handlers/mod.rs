//! HTTP handlers: streamed pages and session counters.

pub mod page;
pub mod status;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;

use spillway_core::config::RenderConfig;
use spillway_core::Node;

/// Builds the description rendered for one request.
pub type AppFactory = Arc<dyn Fn(&PageQuery) -> Node + Send + Sync>;

/// Query parameters handed to the application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    /// Multiplier for simulated network delays.
    pub scale_network_speed: Option<f64>,
}

#[derive(Clone)]
pub struct ApiState {
    pub app: AppFactory,
    pub render: RenderConfig,
    pub counters: SessionCounters,
}

impl ApiState {
    pub fn new(app: AppFactory, render: RenderConfig) -> Self {
        Self {
            app,
            render,
            counters: SessionCounters::default(),
        }
    }
}

/// Lifetime counters for render sessions started by this server.
#[derive(Clone, Default)]
pub struct SessionCounters {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    started: AtomicU64,
    finished: AtomicU64,
    failed: AtomicU64,
}

impl SessionCounters {
    pub fn started(&self) {
        self.inner.started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finished(&self) {
        self.inner.finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.inner.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// (started, finished, failed)
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.inner.started.load(Ordering::Relaxed),
            self.inner.finished.load(Ordering::Relaxed),
            self.inner.failed.load(Ordering::Relaxed),
        )
    }
}

// Re-export handler functions for use in router setup.
pub use page::handle_page;
pub use status::handle_status;
