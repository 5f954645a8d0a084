use std::sync::Arc;

use sched_core::PersistenceApi;
use sessions::InMemSessions;
use store_http::HttpStore;
use store_mem::MemStore;
use tracing::{info, warn};

use crate::config::Config;

pub type Backend = dyn PersistenceApi;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<InMemSessions<Backend>>,
}

impl AppState {
    pub fn new(api: Arc<Backend>, cfg: &Config) -> Self {
        Self {
            sessions: Arc::new(InMemSessions::new(api, cfg.cache_ttl)),
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let api: Arc<Backend> = match &cfg.backend_url {
            Some(url) => {
                info!(%url, timeout = ?cfg.backend_timeout, "using HTTP backend");
                Arc::new(HttpStore::new(url, cfg.backend_timeout)?)
            }
            None => {
                warn!("no backend configured, serving the in-memory demo store");
                Arc::new(MemStore::demo())
            }
        };
        Ok(Self::new(api, cfg))
    }
}
