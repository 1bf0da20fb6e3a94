//! In-memory package manager for engine tests

use declarative::Deadline;
use pkgkit::{Error, PackageIdentity, PackageInfo, PackageManager, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct State {
    installed: BTreeMap<String, String>,
    upgrades: BTreeMap<String, String>,
    failing: BTreeSet<String>,
    unknown: BTreeSet<String>,
    /// Packages the manager could install: name -> latest version
    catalog: BTreeMap<String, String>,
    calls: Vec<String>,
}

/// Clones share state, so a test can keep a handle after registering one
#[derive(Clone)]
pub struct FakeManager {
    name: &'static str,
    available: bool,
    upgradable: bool,
    list_error: Option<String>,
    install_delay: Option<Duration>,
    version_error: bool,
    state: Arc<Mutex<State>>,
}

impl FakeManager {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            available: true,
            upgradable: true,
            list_error: None,
            install_delay: None,
            version_error: false,
            state: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_installed(self, name: &str, version: &str) -> Self {
        self.state().installed.insert(name.into(), version.into());
        self
    }

    /// After `upgrade`, `name` reports `version`
    pub fn with_upgrade(self, name: &str, version: &str) -> Self {
        self.state().upgrades.insert(name.into(), version.into());
        self
    }

    pub fn failing(self, reference: &str) -> Self {
        self.state().failing.insert(reference.into());
        self
    }

    /// Operations on `reference` fail as if the registry had never heard of it
    pub fn unknown(self, reference: &str) -> Self {
        self.state().unknown.insert(reference.into());
        self
    }

    pub fn with_catalog(self, name: &str, version: &str) -> Self {
        self.state().catalog.insert(name.into(), version.into());
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn without_upgrade(mut self) -> Self {
        self.upgradable = false;
        self
    }

    pub fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.into());
        self
    }

    pub fn with_install_delay(mut self, delay: Duration) -> Self {
        self.install_delay = Some(delay);
        self
    }

    /// Installs work but reading a version fails
    pub fn with_version_error(mut self) -> Self {
        self.version_error = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn is_installed_now(&self, name: &str) -> bool {
        self.state().installed.contains_key(name)
    }

    fn fail_if_configured(&self, op: &str, reference: &str) -> Result<()> {
        if self.state().unknown.contains(reference) {
            return Err(Error::NotFound {
                name: reference.into(),
            });
        }
        if self.state().failing.contains(reference) {
            return Err(Error::CommandFailed {
                message: format!("{} {op} failed for {reference}", self.name),
                stderr: "boom".into(),
            });
        }
        Ok(())
    }
}

impl PackageManager for FakeManager {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self, _: &Deadline) -> Result<bool> {
        Ok(self.available)
    }

    fn list_installed(&self, _: &Deadline) -> Result<Vec<String>> {
        if let Some(message) = &self.list_error {
            return Err(Error::CommandFailed {
                message: format!("{} list failed", self.name),
                stderr: message.clone(),
            });
        }
        Ok(self.state().installed.keys().cloned().collect())
    }

    fn install(&self, reference: &str, _: &Deadline) -> Result<()> {
        self.state().calls.push(format!("install {reference}"));
        if let Some(delay) = self.install_delay {
            thread::sleep(delay);
        }
        self.fail_if_configured("install", reference)?;
        let name = self.identify(reference).name;
        self.state().installed.insert(name, "1.0.0".into());
        Ok(())
    }

    fn uninstall(&self, name: &str, _: &Deadline) -> Result<()> {
        self.state().calls.push(format!("uninstall {name}"));
        self.fail_if_configured("uninstall", name)?;
        self.state().installed.remove(name);
        Ok(())
    }

    fn installed_version(&self, name: &str, _: &Deadline) -> Result<Option<String>> {
        if self.version_error {
            return Err(Error::CommandFailed {
                message: format!("{} version lookup failed for {name}", self.name),
                stderr: "boom".into(),
            });
        }
        Ok(self.state().installed.get(name).cloned())
    }

    fn search(&self, query: &str, _: &Deadline) -> Result<Vec<String>> {
        self.state().calls.push(format!("search {query}"));
        self.fail_if_configured("search", query)?;
        let state = self.state();
        Ok(state
            .catalog
            .keys()
            .chain(state.installed.keys())
            .filter(|name| name.contains(query))
            .cloned()
            .collect())
    }

    fn info(&self, name: &str, _: &Deadline) -> Result<PackageInfo> {
        let state = self.state();
        let installed = state.installed.get(name);
        let Some(version) = state.catalog.get(name).or(installed) else {
            return Err(Error::NotFound { name: name.into() });
        };
        Ok(PackageInfo {
            name: name.into(),
            version: Some(version.clone()),
            description: Some(format!("{name} from {}", self.name)),
            homepage: None,
            installed: installed.is_some(),
        })
    }

    fn supports_upgrade(&self) -> bool {
        self.upgradable
    }

    fn upgrade(&self, references: &[&str], _: &Deadline) -> Result<()> {
        self.state().calls.push(format!("upgrade {}", references.join(" ")));
        for reference in references {
            self.fail_if_configured("upgrade", reference)?;
        }
        let mut state = self.state();
        for reference in references {
            let name = reference.rsplit('/').next().unwrap_or(reference).to_string();
            if let Some(version) = state.upgrades.get(&name).cloned() {
                state.installed.insert(name, version);
            }
        }
        Ok(())
    }

    /// Module-path references install a binary named after the last element
    fn identify(&self, reference: &str) -> PackageIdentity {
        match reference.rsplit_once('/') {
            Some((_, name)) => {
                let mut identity = PackageIdentity::plain(name);
                identity
                    .metadata
                    .insert("source_path".into(), reference.into());
                identity
            }
            None => PackageIdentity::plain(reference),
        }
    }
}
