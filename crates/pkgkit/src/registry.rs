//! Name-keyed registry of package managers.

use crate::backends::{BrewManager, CargoManager, GoManager, NpmManager};
use crate::error::{Error, Result};
use crate::manager::PackageManager;
use std::collections::BTreeMap;

/// Managers selectable by name at runtime.
#[derive(Default)]
pub struct Registry {
    managers: BTreeMap<&'static str, Box<dyn PackageManager>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BrewManager::new()));
        registry.register(Box::new(NpmManager::new()));
        registry.register(Box::new(CargoManager::new()));
        registry.register(Box::new(GoManager::new()));
        registry
    }

    /// Add a manager, replacing any previous one with the same name.
    pub fn register(&mut self, manager: Box<dyn PackageManager>) {
        self.managers.insert(manager.name(), manager);
    }

    /// Look a manager up by name.
    pub fn get(&self, name: &str) -> Option<&dyn PackageManager> {
        self.managers.get(name).map(AsRef::as_ref)
    }

    /// Like [`get`](Self::get), but unknown names are an error.
    pub fn require(&self, name: &str) -> Result<&dyn PackageManager> {
        self.get(name)
            .ok_or_else(|| Error::UnknownManager(name.to_string()))
    }

    /// Whether a manager is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.managers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.managers.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered_sorted() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.names(), vec!["brew", "cargo", "go", "npm"]);
        assert!(registry.contains("npm"));
        assert_eq!(registry.get("go").map(|m| m.name()), Some("go"));
    }

    #[test]
    fn test_unknown_manager() {
        let registry = Registry::new();
        let err = registry.require("pip").err().unwrap();
        assert_eq!(err.to_string(), "unknown package manager 'pip'");
    }
}
