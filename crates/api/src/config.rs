use std::time::Duration;

use anyhow::Context;

/// Service settings, read once at startup from `SCHEDGRID__*` variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    /// Base URL of the scheduling backend. Without one the service runs
    /// against the in-memory store.
    pub backend_url: Option<String>,
    pub backend_timeout: Duration,
    pub cache_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            backend_url: None,
            backend_timeout: Duration::from_secs(10),
            cache_ttl: sched_core::cache::DEFAULT_TTL,
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key}={raw:?} is not valid")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let d = Self::default();
        let backend_url = lookup("SCHEDGRID__BACKEND__URL").filter(|u| !u.trim().is_empty());
        Ok(Self {
            port: parsed(&lookup, "SCHEDGRID__SERVER__PORT", d.port)?,
            backend_url,
            backend_timeout: Duration::from_secs(parsed(
                &lookup,
                "SCHEDGRID__BACKEND__TIMEOUT_SECS",
                d.backend_timeout.as_secs(),
            )?),
            cache_ttl: Duration::from_secs(parsed(&lookup, "SCHEDGRID__CACHE__TTL_SECS", d.cache_ttl.as_secs())?),
        })
    }
}
