//! Application Configuration
//!
//! Loaded from environment variables (optionally via `.env`) with defaults
//! for local development.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub port: u16,
    pub environment: String,
    /// Capacity of the bounded outbound event queue; oldest events are
    /// dropped on overflow.
    pub event_queue_capacity: usize,
    /// Apply the deterministic seed fixture at startup.
    pub seed_on_startup: bool,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("port", 8080_i64)?
            .set_default("environment", "development")?
            .set_default("event_queue_capacity", 1024_i64)?
            .set_default("seed_on_startup", true)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_defaults() {
        // values may be overridden by ambient environment variables; the
        // load itself and the defaulted capacity bound must always hold
        let config = AppConfig::load().unwrap();
        assert!(config.event_queue_capacity >= 1);
        assert!(!config.environment.is_empty());
    }
}
