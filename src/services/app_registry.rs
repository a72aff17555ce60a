use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use uuid::Uuid;

/// Token scoping every PREFIX-tier rule this process installs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AppId {
    pub id: Uuid,
    pub name: String,
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Hands out application identities
pub trait AppRegistry: Send + Sync {
    /// Same name, same identity, for the life of the registry
    fn register_application(&self, name: &str) -> AppId;
}

/// Process-local registry
#[derive(Debug, Default)]
pub struct LocalAppRegistry {
    apps: Mutex<HashMap<String, AppId>>,
}

impl LocalAppRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AppRegistry for LocalAppRegistry {
    fn register_application(&self, name: &str) -> AppId {
        let mut apps = self.apps.lock().unwrap_or_else(PoisonError::into_inner);
        apps.entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!("Registered application {}", name);
                AppId { id: Uuid::new_v4(), name: name.to_string() }
            })
            .clone()
    }
}
