//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use draw_duel_core::{DrawingStore, DuelService, WordProvider};

use crate::config::Config;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    /// The persistence port; the auth layer talks to it directly for users
    /// and sessions.
    pub store: Arc<dyn DrawingStore>,
    /// All game operations go through the engine, never the raw store.
    pub duels: DuelService,
    pub words: Arc<dyn WordProvider>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DrawingStore>,
        words: Arc<dyn WordProvider>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            duels: DuelService::new(store.clone()),
            store,
            words,
            config,
        }
    }
}
