//! Lock file model and persistence
//!
//! The lock is read and rewritten as a whole. Writes go to a sibling
//! temp file that is renamed over the original, so readers see either
//! the old or the new lock, never a mix. There is no cross-process
//! locking: one writer at a time.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use declarative::{Item, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The only lock version this build reads or writes
pub const LOCK_VERSION: u32 = 2;

/// File name of the lock inside the plonk directory
pub const LOCK_FILE_NAME: &str = "plonk.lock";

/// Resource type used for package entries
pub const PACKAGE_TYPE: &str = "package";

// ============================================================================
// Lock model
// ============================================================================

/// One desired resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub kind: String,
    /// `manager:name`, for display and lookup convenience
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub installed_at: DateTime<Utc>,
}

impl ResourceEntry {
    pub fn is_package(&self) -> bool {
        self.kind == PACKAGE_TYPE
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Manager name, falling back to the id prefix
    pub fn manager(&self) -> &str {
        self.meta("manager")
            .unwrap_or_else(|| self.id.split_once(':').map_or("", |(m, _)| m))
    }

    /// Package name, falling back to the id suffix
    pub fn name(&self) -> &str {
        self.meta("name")
            .unwrap_or_else(|| self.id.split_once(':').map_or(self.id.as_str(), |(_, n)| n))
    }

    pub fn version(&self) -> Option<&str> {
        self.meta("version")
    }

    pub fn source_path(&self) -> Option<&str> {
        self.meta("source_path")
    }

    pub fn full_name(&self) -> Option<&str> {
        self.meta("full_name")
    }

    /// What to hand to the manager to install or upgrade this package
    pub fn install_target(&self) -> &str {
        self.source_path()
            .or_else(|| self.full_name())
            .unwrap_or_else(|| self.name())
    }

    /// Desired-state item for reconciliation
    pub fn to_item(&self) -> Item {
        let mut item = Item::package(self.manager(), self.name());
        item.metadata = self.metadata.clone();
        item
    }

    fn matches(&self, manager: &str, name: &str) -> bool {
        self.is_package() && self.manager() == manager && self.name() == name
    }
}

/// Versioned record of desired packages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub version: u32,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

impl Default for Lock {
    fn default() -> Self {
        Self {
            version: LOCK_VERSION,
            resources: Vec::new(),
        }
    }
}

impl Lock {
    pub fn packages(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.resources.iter().filter(|r| r.is_package())
    }

    /// Manager names with at least one package
    pub fn managers(&self) -> BTreeSet<&str> {
        self.packages().map(ResourceEntry::manager).collect()
    }

    pub fn desired_items(&self) -> Vec<Item> {
        self.packages().map(ResourceEntry::to_item).collect()
    }
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

// ============================================================================
// Read / write
// ============================================================================

/// Parse lock content. The version is checked before the full shape so
/// an old-format file reports a version mismatch, not a parse error.
pub fn parse(content: &str, path: &Path) -> Result<Lock> {
    if content.trim().is_empty() {
        return Ok(Lock::default());
    }

    let probe: VersionProbe = serde_yaml::from_str(content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if probe.version != LOCK_VERSION {
        return Err(Error::UnsupportedVersion {
            path: path.to_path_buf(),
            found: probe.version,
            expected: LOCK_VERSION,
        });
    }

    serde_yaml::from_str(content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read the lock at `path`; a missing file is an empty lock
pub fn read(path: &Path) -> Result<Lock> {
    match fs::read_to_string(path) {
        Ok(content) => parse(&content, path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("no lock file at {}, starting empty", path.display());
            Ok(Lock::default())
        }
        Err(e) => Err(Error::io("read", path, e)),
    }
}

/// Replace the lock at `path` in one rename
pub fn write(path: &Path, lock: &Lock) -> Result<()> {
    let content = serde_yaml::to_string(lock)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io("create directory", parent, e))?;
    }

    let tmp = temp_path(path);
    if let Err(e) = write_synced(&tmp, content.as_bytes()) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io("write", &tmp, e));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644))
            .map_err(|e| Error::io("set permissions on", &tmp, e))?;
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(Error::io("replace", path, e));
    }

    log::debug!("wrote {} resources to {}", lock.resources.len(), path.display());
    Ok(())
}

/// The data is on disk before the caller renames over the old lock
fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| LOCK_FILE_NAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Store
// ============================================================================

/// In-memory lock bound to its file
#[derive(Debug, Clone)]
pub struct LockStore {
    path: PathBuf,
    lock: Lock,
}

impl LockStore {
    /// Load the lock at `path` (empty if the file does not exist)
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock = read(&path)?;
        Ok(Self { path, lock })
    }

    /// The lock file inside a plonk directory
    pub fn in_dir(dir: &Path) -> Result<Self> {
        Self::open(dir.join(LOCK_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    pub fn save(&self) -> Result<()> {
        write(&self.path, &self.lock)
    }

    /// Insert or replace the `manager:name` entry and stamp `installed_at`.
    ///
    /// Existing metadata is kept unless `metadata` overrides it; the
    /// `manager`, `name` and `version` keys always reflect the arguments.
    pub fn add_package(&mut self, manager: &str, name: &str, version: &str, metadata: Metadata) {
        let position = self
            .lock
            .resources
            .iter()
            .position(|r| r.matches(manager, name));

        let mut merged = position
            .map(|i| self.lock.resources[i].metadata.clone())
            .unwrap_or_default();
        merged.extend(metadata);
        merged.insert("manager".into(), manager.into());
        merged.insert("name".into(), name.into());
        merged.insert("version".into(), version.into());

        let entry = ResourceEntry {
            kind: PACKAGE_TYPE.into(),
            id: format!("{manager}:{name}"),
            metadata: merged,
            installed_at: Utc::now(),
        };

        match position {
            Some(i) => self.lock.resources[i] = entry,
            None => self.lock.resources.push(entry),
        }
    }

    /// Remove the entry; returns whether one existed
    pub fn remove_package(&mut self, manager: &str, name: &str) -> bool {
        let before = self.lock.resources.len();
        self.lock.resources.retain(|r| !r.matches(manager, name));
        before != self.lock.resources.len()
    }

    /// Packages of one manager, in lock order
    pub fn get_packages(&self, manager: &str) -> Vec<&ResourceEntry> {
        self.lock
            .packages()
            .filter(|r| r.manager() == manager)
            .collect()
    }

    pub fn find_package(&self, manager: &str, name: &str) -> Option<&ResourceEntry> {
        self.lock.resources.iter().find(|r| r.matches(manager, name))
    }

    pub fn has_package(&self, manager: &str, name: &str) -> bool {
        self.find_package(manager, name).is_some()
    }
}
