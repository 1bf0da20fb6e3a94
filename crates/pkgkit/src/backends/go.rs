//! `go install` backend.
//!
//! Go packages are installed from a module path but show up as a binary
//! in `GOBIN`. The binary name is the listed name; the module path is
//! recorded as `source_path` and used for installs and upgrades.

use crate::error::{Error, Result};
use crate::manager::{PackageIdentity, PackageInfo, PackageManager};
use crate::runner;
use declarative::Deadline;
use std::fs;
use std::path::{Path, PathBuf};

/// Backend for binaries built with `go install`.
pub struct GoManager {
    go_path: Option<PathBuf>,
}

impl Default for GoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GoManager {
    /// Create a backend, locating `go` on `PATH`.
    pub fn new() -> Self {
        Self {
            go_path: runner::which("go"),
        }
    }

    fn go(&self) -> Result<&Path> {
        self.go_path
            .as_deref()
            .ok_or_else(|| Error::CommandNotFound {
                program: "go".into(),
            })
    }

    /// `GOBIN`, else the first `GOPATH` entry's `bin`, else `~/go/bin`
    fn bin_dir(&self, deadline: &Deadline) -> Result<PathBuf> {
        let gobin = runner::run_checked("go", self.go()?, &["env", "GOBIN"], None, deadline)?;
        if !gobin.trim().is_empty() {
            return Ok(PathBuf::from(gobin.trim()));
        }

        let gopath = runner::run_checked("go", self.go()?, &["env", "GOPATH"], None, deadline)?;
        if let Some(first) = std::env::split_paths(gopath.trim()).next()
            && !first.as_os_str().is_empty()
        {
            return Ok(first.join("bin"));
        }

        dirs::home_dir()
            .map(|home| home.join("go").join("bin"))
            .ok_or_else(|| Error::Parse {
                manager: "go",
                message: "cannot determine GOBIN".into(),
            })
    }

    fn install_module(&self, reference: &str, deadline: &Deadline) -> Result<()> {
        let versioned = with_version(reference);
        runner::run_checked("go", self.go()?, &["install", &versioned], Some(reference), deadline)
            .map(drop)
    }
}

impl PackageManager for GoManager {
    fn name(&self) -> &'static str {
        "go"
    }

    fn is_available(&self, _deadline: &Deadline) -> Result<bool> {
        Ok(self.go_path.is_some())
    }

    fn list_installed(&self, deadline: &Deadline) -> Result<Vec<String>> {
        let bin = self.bin_dir(deadline)?;
        list_binaries(&bin)
    }

    fn install(&self, reference: &str, deadline: &Deadline) -> Result<()> {
        self.install_module(reference, deadline)
    }

    fn uninstall(&self, name: &str, deadline: &Deadline) -> Result<()> {
        let binary = self.bin_dir(deadline)?.join(binary_name(name));
        match fs::remove_file(&binary) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn installed_version(&self, name: &str, deadline: &Deadline) -> Result<Option<String>> {
        let binary = self.bin_dir(deadline)?.join(binary_name(name));
        if !binary.exists() {
            return Ok(None);
        }
        let binary = binary.to_string_lossy().into_owned();
        let output = runner::run(self.go()?, &["version", "-m", &binary], deadline)?;
        if !output.success {
            return Ok(None);
        }
        Ok(parse_module_version(&output.stdout))
    }

    fn info(&self, name: &str, deadline: &Deadline) -> Result<PackageInfo> {
        let version = self.installed_version(name, deadline)?;
        Ok(PackageInfo {
            name: binary_name(name),
            installed: version.is_some(),
            version,
            description: None,
            homepage: strip_version(name)
                .contains('/')
                .then(|| format!("https://pkg.go.dev/{}", strip_version(name))),
        })
    }

    fn supports_upgrade(&self) -> bool {
        true
    }

    fn upgrade(&self, references: &[&str], deadline: &Deadline) -> Result<()> {
        for reference in references {
            self.install_module(reference, deadline)?;
        }
        Ok(())
    }

    fn identify(&self, reference: &str) -> PackageIdentity {
        identify_go(reference)
    }
}

fn strip_version(reference: &str) -> &str {
    reference.split_once('@').map_or(reference, |(path, _)| path)
}

/// `module` -> `module@latest`; explicit versions are kept
fn with_version(reference: &str) -> String {
    if reference.contains('@') {
        reference.to_string()
    } else {
        format!("{reference}@latest")
    }
}

/// Binary produced by `go install <module path>`.
///
/// The last path element, skipping a major-version suffix (`/v2`).
pub fn binary_name(reference: &str) -> String {
    let path = strip_version(reference).trim_end_matches('/');
    let mut parts = path.rsplit('/');
    let last = parts.next().unwrap_or(path);
    if is_major_version(last)
        && let Some(previous) = parts.next()
    {
        return previous.to_string();
    }
    last.to_string()
}

fn is_major_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

fn identify_go(reference: &str) -> PackageIdentity {
    let source = strip_version(reference);
    let mut identity = PackageIdentity::plain(&binary_name(source));
    if source != identity.name {
        identity
            .metadata
            .insert("source_path".into(), source.to_string());
    }
    identity
}

fn list_binaries(bin: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(bin) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if runner::is_executable(&entry.path()) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Version from the `mod` line of `go version -m`:
///
/// ```text
/// /home/u/go/bin/hey: go1.22.1
///         path    github.com/rakyll/hey
///         mod     github.com/rakyll/hey   v0.1.4  h1:...
/// ```
fn parse_module_version(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        (fields.next() == Some("mod"))
            .then(|| fields.nth(1))
            .flatten()
            .map(String::from)
    })
}
