//! Dotfile desired and actual state
//!
//! The plonk directory *is* the desired state: every regular file under
//! it (minus reserved and ignored entries) is a dotfile. A source
//! `zshrc` deploys to `~/.zshrc`, `config/nvim/init.lua` to
//! `~/.config/nvim/init.lua`.

pub mod filter;

use anyhow::{Context, Result, bail};
use declarative::{Deadline, Item};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
pub use filter::IgnoreFilter;

/// Where dotfiles come from and what the home directory holds
pub trait DotfileProvider {
    /// Desired dotfiles, one item per file
    fn configured_items(&self) -> Result<Vec<Item>>;

    /// Dotfiles present in the home directory
    fn actual_items(&self, deadline: &Deadline) -> Result<Vec<Item>>;

    /// Whether a deployed dotfile's content differs from its source
    fn is_drifted(&self, item: &Item) -> Result<bool>;

    /// Copy the source into place
    fn deploy(&self, item: &Item) -> Result<()>;
}

/// Source name -> home-relative target (`zshrc` -> `.zshrc`)
pub fn source_to_target(name: &str) -> String {
    format!(".{name}")
}

/// Home-relative target -> source name (`.zshrc` -> `zshrc`)
pub fn target_to_source(rel: &str) -> Result<String> {
    let rel = rel.trim_start_matches("./");
    match rel.strip_prefix('.') {
        Some(name) if !name.is_empty() && !name.starts_with(['.', '/']) => Ok(name.to_string()),
        _ => bail!("'{rel}' is not a dotfile (expected a path starting with '.')"),
    }
}

/// Dotfiles stored as plain files in the plonk directory
pub struct FsDotfiles {
    source_dir: PathBuf,
    home_dir: PathBuf,
    filter: IgnoreFilter,
    expand_directories: Vec<String>,
}

impl FsDotfiles {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        home_dir: impl Into<PathBuf>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            source_dir: source_dir.into(),
            home_dir: home_dir.into(),
            filter: IgnoreFilter::new(&config.ignore_patterns)
                .context("Invalid ignore_patterns in plonk.yaml")?,
            expand_directories: config.expand_directories.clone(),
        })
    }

    /// Ignored either by its source name or by its deployed name
    fn ignored(&self, name: &str) -> bool {
        self.filter.should_skip(Path::new(name))
            || self.filter.should_skip(Path::new(&source_to_target(name)))
    }

    fn item_for(&self, name: &str) -> Item {
        let source = self.source_dir.join(name);
        let destination = self.home_dir.join(source_to_target(name));
        Item::dotfile(name, &destination)
            .with_metadata("source", source.to_string_lossy())
            .with_metadata("destination", destination.to_string_lossy())
    }

    fn source_of(&self, item: &Item) -> PathBuf {
        item.meta("source")
            .map_or_else(|| self.source_dir.join(&item.name), PathBuf::from)
    }

    fn destination_of(&self, item: &Item) -> PathBuf {
        item.path
            .clone()
            .unwrap_or_else(|| self.home_dir.join(source_to_target(&item.name)))
    }

    /// Source name for a user-supplied path: `~/.zshrc`, `/home/u/.zshrc`,
    /// `.zshrc` or `zshrc`
    ///
    /// The name must stay inside the plonk directory: `..`, root and
    /// prefix components are rejected.
    pub fn resolve_name(&self, input: &str) -> Result<String> {
        let expanded = crate::paths::expand_path(input);
        let name = if expanded.is_absolute() {
            let rel = expanded.strip_prefix(&self.home_dir).with_context(|| {
                format!("{} is not inside {}", expanded.display(), self.home_dir.display())
            })?;
            target_to_source(&rel.to_string_lossy())?
        } else if input.starts_with('.') {
            target_to_source(input)?
        } else {
            input.trim_end_matches('/').to_string()
        };
        check_contained(&name)?;
        Ok(name)
    }

    /// Source path for a resolved name, refusing anything outside `source_dir`
    fn contained_source(&self, name: &str) -> Result<PathBuf> {
        let source = self.source_dir.join(name);
        if !source.starts_with(&self.source_dir) {
            bail!("'{name}' resolves outside {}", self.source_dir.display());
        }
        Ok(source)
    }

    /// Start managing a file (or every file under a directory) in `$HOME`
    /// by copying it into the plonk directory
    pub fn adopt(&self, input: &str) -> Result<Vec<Item>> {
        let name = self.resolve_name(input)?;
        self.contained_source(&name)?;
        let target = self.home_dir.join(source_to_target(&name));
        if self.ignored(&name) {
            bail!("{} matches ignore_patterns", target.display());
        }
        let meta = fs::metadata(&target)
            .with_context(|| format!("Could not read {}", target.display()))?;

        let mut names = Vec::new();
        if meta.is_dir() {
            for entry in WalkDir::new(&target).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Could not scan {}", target.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry.path().strip_prefix(&self.home_dir)?;
                let child = target_to_source(&rel.to_string_lossy())?;
                if !self.ignored(&child) {
                    names.push(child);
                }
            }
        } else {
            names.push(name);
        }

        let mut items = Vec::with_capacity(names.len());
        for name in names {
            let item = self.item_for(&name);
            let source = self.source_of(&item);
            copy_atomic(&self.destination_of(&item), &source)?;
            log::info!("Copied {} into {}", item.name, source.display());
            items.push(item);
        }
        Ok(items)
    }

    /// Stop managing a dotfile; the deployed copy in `$HOME` is left alone
    pub fn forget(&self, input: &str) -> Result<PathBuf> {
        let name = self.resolve_name(input)?;
        let source = self.contained_source(&name)?;
        let meta = fs::metadata(&source)
            .with_context(|| format!("'{name}' is not managed by plonk"))?;
        let removed = if meta.is_dir() {
            fs::remove_dir_all(&source)
        } else {
            fs::remove_file(&source)
        };
        removed.with_context(|| format!("Could not remove {}", source.display()))?;
        Ok(source)
    }

    /// Source and deployed content, for diffing
    pub fn contents(&self, item: &Item) -> Result<(String, String)> {
        let source = self.source_of(item);
        let destination = self.destination_of(item);
        let read = |p: &Path| {
            fs::read(p)
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .with_context(|| format!("Could not read {}", p.display()))
        };
        Ok((read(&source)?, read(&destination)?))
    }

    /// Home-relative entries to consider as untracked candidates
    fn candidate_entries(&self, deadline: &Deadline) -> Result<Vec<String>> {
        let mut rels = Vec::new();

        for entry in read_dir_sorted(&self.home_dir)? {
            let rel = entry.to_string_lossy().into_owned();
            if rel.starts_with('.') && !self.expand_directories.contains(&rel) {
                rels.push(rel);
            }
        }

        for dir in &self.expand_directories {
            deadline.check()?;
            for entry in read_dir_sorted(&self.home_dir.join(dir))? {
                rels.push(format!("{dir}/{}", entry.to_string_lossy()));
            }
        }
        Ok(rels)
    }
}

impl DotfileProvider for FsDotfiles {
    fn configured_items(&self) -> Result<Vec<Item>> {
        if !self.source_dir.exists() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        let walker = WalkDir::new(&self.source_dir)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path()
                    .strip_prefix(&self.source_dir)
                    .map_or(true, |rel| !self.ignored(&rel.to_string_lossy()))
            });

        for entry in walker {
            let entry = entry
                .with_context(|| format!("Could not scan {}", self.source_dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&self.source_dir)?;
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            items.push(self.item_for(&name));
        }

        log::debug!("{} configured dotfiles in {}", items.len(), self.source_dir.display());
        Ok(items)
    }

    fn actual_items(&self, deadline: &Deadline) -> Result<Vec<Item>> {
        let configured = self.configured_items()?;
        let names: BTreeSet<&str> = configured.iter().map(|i| i.name.as_str()).collect();
        let mut items = Vec::new();

        for item in &configured {
            deadline.check()?;
            let destination = self.destination_of(item);
            if fs::symlink_metadata(&destination).is_ok() {
                items.push(
                    Item::dotfile(&item.name, &destination)
                        .with_metadata("destination", destination.to_string_lossy()),
                );
            }
        }

        for rel in self.candidate_entries(deadline)? {
            let Ok(name) = target_to_source(&rel) else {
                continue;
            };
            let covers_configured = names.contains(name.as_str())
                || names.iter().any(|n| n.starts_with(&format!("{name}/")));
            if covers_configured || self.filter.should_skip(Path::new(&rel)) {
                continue;
            }
            let destination = self.home_dir.join(&rel);
            items.push(
                Item::dotfile(&name, &destination)
                    .with_metadata("destination", destination.to_string_lossy()),
            );
        }

        Ok(items)
    }

    fn is_drifted(&self, item: &Item) -> Result<bool> {
        let destination = self.destination_of(item);
        let dest_meta = match fs::metadata(&destination) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                return Err(e).with_context(|| format!("Could not read {}", destination.display()));
            }
        };
        if !dest_meta.is_file() {
            return Ok(true);
        }
        Ok(hash_file(&self.source_of(item))? != hash_file(&destination)?)
    }

    fn deploy(&self, item: &Item) -> Result<()> {
        let source = self.source_of(item);
        let destination = self.destination_of(item);
        copy_atomic(&source, &destination)?;
        log::debug!("Deployed {} -> {}", source.display(), destination.display());
        Ok(())
    }
}

/// A dotfile name is a relative path made only of normal components
fn check_contained(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("empty dotfile name");
    }
    let escapes = Path::new(name).components().any(|c| {
        matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_))
    });
    if escapes {
        bail!("'{name}' must be a path inside the plonk directory");
    }
    Ok(())
}

fn read_dir_sorted(dir: &Path) -> Result<Vec<std::ffi::OsString>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Could not read {}", dir.display())),
    };
    let mut names = Vec::new();
    for entry in entries {
        names.push(entry.with_context(|| format!("Could not read {}", dir.display()))?.file_name());
    }
    names.sort();
    Ok(names)
}

fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let bytes = fs::read(path).with_context(|| format!("Could not read {}", path.display()))?;
    Ok(blake3::hash(&bytes))
}

/// Copy `from` over `to` through a synced sibling temp file and a rename
fn copy_atomic(from: &Path, to: &Path) -> Result<()> {
    let parent = to
        .parent()
        .with_context(|| format!("{} has no parent directory", to.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Could not create {}", parent.display()))?;

    let file_name = to
        .file_name()
        .with_context(|| format!("{} has no file name", to.display()))?;
    let tmp = parent.join(format!(".{}.plonk-tmp", file_name.to_string_lossy()));

    let copied = fs::copy(from, &tmp).and_then(|_| fs::File::open(&tmp)?.sync_all());
    if let Err(e) = copied {
        let _ = fs::remove_file(&tmp);
        return Err(e)
            .with_context(|| format!("Could not copy {} to {}", from.display(), tmp.display()));
    }
    if let Err(e) = fs::rename(&tmp, to) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Could not replace {}", to.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        source: PathBuf,
        home: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let source = tmp.path().join("plonk");
            let home = tmp.path().join("home");
            fs::create_dir_all(&source).unwrap();
            fs::create_dir_all(&home).unwrap();
            Self {
                _tmp: tmp,
                source,
                home,
            }
        }

        fn source_file(&self, rel: &str, content: &str) {
            let path = self.source.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn home_file(&self, rel: &str, content: &str) {
            let path = self.home.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn provider(&self) -> FsDotfiles {
            FsDotfiles::new(&self.source, &self.home, &Config::default()).unwrap()
        }
    }

    fn names(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn test_naming_round_trip() {
        assert_eq!(source_to_target("zshrc"), ".zshrc");
        assert_eq!(source_to_target("config/nvim/init.lua"), ".config/nvim/init.lua");
        assert_eq!(target_to_source(".zshrc").unwrap(), "zshrc");
        assert_eq!(target_to_source(".config/nvim/init.lua").unwrap(), "config/nvim/init.lua");
        assert!(target_to_source("bin/script").is_err());
        assert!(target_to_source(".").is_err());
        assert!(target_to_source("..").is_err());
    }

    #[test]
    fn test_configured_items_skip_reserved_and_ignored() {
        let fx = Fixture::new();
        fx.source_file("zshrc", "export A=1");
        fx.source_file("config/nvim/init.lua", "-- nvim");
        fx.source_file("plonk.yaml", "default_manager: brew");
        fx.source_file("plonk.lock", "version: 2");
        fx.source_file(".git/HEAD", "ref: main");
        fx.source_file("vimrc.swp", "junk");

        let items = fx.provider().configured_items().unwrap();

        assert_eq!(names(&items), vec!["config/nvim/init.lua", "zshrc"]);
        let zshrc = &items[1];
        assert_eq!(zshrc.path.as_deref(), Some(fx.home.join(".zshrc").as_path()));
        assert_eq!(zshrc.meta("source"), Some(fx.source.join("zshrc").to_str().unwrap()));
    }

    #[test]
    fn test_missing_source_dir_is_empty() {
        let tmp = TempDir::new().unwrap();
        let provider =
            FsDotfiles::new(tmp.path().join("none"), tmp.path(), &Config::default()).unwrap();
        assert!(provider.configured_items().unwrap().is_empty());
    }

    #[test]
    fn test_actual_items_include_deployed_and_untracked() {
        let fx = Fixture::new();
        fx.source_file("zshrc", "export A=1");
        fx.source_file("config/nvim/init.lua", "-- nvim");
        fx.home_file(".zshrc", "export A=1");
        fx.home_file(".bashrc", "bash");
        fx.home_file(".ssh/config", "Host *");
        fx.home_file(".config/nvim/other.lua", "x");
        fx.home_file(".config/git/config", "[user]");
        fx.home_file("Documents/notes.txt", "not a dotfile");

        let items = fx.provider().actual_items(&Deadline::none()).unwrap();

        // .ssh is ignored, config/nvim is an ancestor of a configured file
        assert_eq!(names(&items), vec!["zshrc", "bashrc", "config/git"]);
    }

    #[test]
    fn test_deploy_and_drift() {
        let fx = Fixture::new();
        fx.source_file("config/app/settings.toml", "a = 1");
        let provider = fx.provider();
        let item = provider.configured_items().unwrap().remove(0);

        assert!(!provider.is_drifted(&item).unwrap());
        provider.deploy(&item).unwrap();

        let deployed = fx.home.join(".config/app/settings.toml");
        assert_eq!(fs::read_to_string(&deployed).unwrap(), "a = 1");
        assert!(!fx.home.join(".config/app/.settings.toml.plonk-tmp").exists());
        assert!(!provider.is_drifted(&item).unwrap());

        fs::write(&deployed, "a = 2").unwrap();
        assert!(provider.is_drifted(&item).unwrap());

        let (source, live) = provider.contents(&item).unwrap();
        assert_eq!((source.as_str(), live.as_str()), ("a = 1", "a = 2"));
    }

    #[test]
    fn test_copy_atomic_replaces_and_cleans_up() {
        let fx = Fixture::new();
        fx.source_file("gitconfig", "short");
        fx.home_file(".gitconfig", "a much longer deployed copy");
        let to = fx.home.join(".gitconfig");

        copy_atomic(&fx.source.join("gitconfig"), &to).unwrap();
        assert_eq!(fs::read_to_string(&to).unwrap(), "short");

        let missing = fx.source.join("missing");
        assert!(copy_atomic(&missing, &fx.home.join(".missing")).is_err());
        assert!(!fx.home.join(".missing").exists());
        assert!(!fx.home.join("..missing.plonk-tmp").exists());
    }

    #[test]
    fn test_adopt_file_and_directory() {
        let fx = Fixture::new();
        fx.home_file(".gitconfig", "[user]\n");
        fx.home_file(".config/fish/config.fish", "set -x A 1");
        fx.home_file(".config/fish/functions/f.fish", "function f; end");
        fx.home_file(".config/fish/.DS_Store", "junk");
        let provider = fx.provider();

        let added = provider
            .adopt(fx.home.join(".gitconfig").to_str().unwrap())
            .unwrap();
        assert_eq!(names(&added), vec!["gitconfig"]);
        assert_eq!(fs::read_to_string(fx.source.join("gitconfig")).unwrap(), "[user]\n");

        let added = provider.adopt(".config/fish").unwrap();
        assert_eq!(
            names(&added),
            vec!["config/fish/config.fish", "config/fish/functions/f.fish"]
        );
    }

    #[test]
    fn test_adopt_rejects_ignored() {
        let fx = Fixture::new();
        fx.home_file(".ssh/id_ed25519", "secret");
        let err = fx.provider().adopt(".ssh").unwrap_err();
        assert!(err.to_string().contains("ignore_patterns"));
        assert!(!fx.source.join("ssh").exists());
    }

    #[test]
    fn test_forget_leaves_home_alone() {
        let fx = Fixture::new();
        fx.source_file("zshrc", "x");
        fx.home_file(".zshrc", "x");
        let provider = fx.provider();

        let removed = provider.forget(".zshrc").unwrap();
        assert_eq!(removed, fx.source.join("zshrc"));
        assert!(!removed.exists());
        assert!(fx.home.join(".zshrc").exists());

        assert!(provider.forget("zshrc").is_err());
    }

    #[test]
    fn test_names_cannot_leave_plonk_dir() {
        let fx = Fixture::new();
        fx.source_file("config/nvim/init.lua", "-- nvim");
        let victim = fx.source.parent().unwrap().join("victim");
        fs::create_dir_all(&victim).unwrap();
        fs::write(victim.join("keep"), "data").unwrap();
        let provider = fx.provider();

        let err = provider.forget("config/../../victim").unwrap_err();
        assert!(err.to_string().contains("inside the plonk directory"), "{err}");
        assert!(victim.join("keep").exists());
        assert!(provider.forget("/etc/passwd").is_err());
        assert!(provider.forget(".config/../../victim").is_err());

        fx.home_file(".bashrc", "x");
        assert!(provider.adopt("../victim").is_err());
        assert!(provider.adopt(".config/../../victim").is_err());
        assert!(!fx.source.join("victim").exists());
        assert_eq!(fs::read_dir(&victim).unwrap().count(), 1);

        assert_eq!(provider.resolve_name("config/nvim/").unwrap(), "config/nvim");
    }
}
