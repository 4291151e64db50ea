use std::sync::Arc;

use dashmap::DashMap;

use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;
use crate::reaper;

/// Manages per-tenant engines. Each tenant gets its own Engine + notify hub
/// + session sweeper. Tenant = database name from the pgwire connection.
/// State is purely in-memory: a tenant lives exactly as long as the process.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
}

impl TenantManager {
    pub fn new() -> Self {
        Self {
            engines: DashMap::new(),
        }
    }

    /// Get or lazily create an engine for the given tenant.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if tenant.trim().is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(notify));

        // Spawn the session sweeper for this tenant
        let sweeper_engine = engine.clone();
        tokio::spawn(async move {
            reaper::run_sweeper(sweeper_engine).await;
        });

        self.engines.insert(tenant.to_string(), engine.clone());
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }
}

impl Default for TenantManager {
    fn default() -> Self {
        Self::new()
    }
}
