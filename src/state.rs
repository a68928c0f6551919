use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;
use crate::engine::config::AdaptiveConfig;
use crate::store::{
    Clock, FeedbackSink, QuestionBank, SystemClock, TestStore, memory::MemoryStore, pg::PgStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TestStore>,
    pub bank: Arc<dyn QuestionBank>,
    pub feedback: Arc<dyn FeedbackSink>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    pub adaptive: Arc<AdaptiveConfig>,
}

impl AppState {
    /// Production wiring: every collaborator backed by Postgres.
    pub fn postgres(pool: PgPool, config: Config) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            store: store.clone(),
            bank: store.clone(),
            feedback: store,
            clock: Arc::new(SystemClock),
            config,
            adaptive: Arc::new(AdaptiveConfig::default()),
        }
    }

    /// In-process wiring for tests and local runs without a database.
    /// Also hands back the concrete store for seeding and assertions.
    pub fn in_memory(config: Config) -> (Self, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (
            Self {
                store: store.clone(),
                bank: store.clone(),
                feedback: store.clone(),
                clock: Arc::new(SystemClock),
                config,
                adaptive: Arc::new(AdaptiveConfig::default()),
            },
            store,
        )
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
