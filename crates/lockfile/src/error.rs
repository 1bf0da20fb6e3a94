//! Error types for the lock store and reference resolution

use std::path::PathBuf;
use thiserror::Error;

/// Errors reading or writing the lock file
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid lock YAML. The user can fix it by hand.
    #[error("failed to parse lock file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No migration is attempted between lock versions.
    #[error(
        "unsupported lock file version {found} in {} (expected version {expected}); remove the file and reinstall your packages",
        path.display()
    )]
    UnsupportedVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("failed to serialize lock: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Errors turning a user-typed reference into package targets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// `manager:` with nothing after the colon
    #[error("invalid syntax '{token}': use '{manager}' to target the whole manager")]
    TrailingColon { token: String, manager: String },

    #[error("package '{name}' is not managed by plonk via '{manager}'")]
    NotManagedVia { name: String, manager: String },

    #[error("package '{name}' is not managed by plonk")]
    NotManaged { name: String },
}

/// Result type for lock operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_error_names_both_versions() {
        let err = Error::UnsupportedVersion {
            path: PathBuf::from("/tmp/plonk.lock"),
            found: 1,
            expected: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("version 1"));
        assert!(msg.contains("expected version 2"));
        assert!(msg.contains("remove the file"));
    }

    #[test]
    fn test_trailing_colon_message() {
        let err = ResolveError::TrailingColon {
            token: "brew:".into(),
            manager: "brew".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid syntax 'brew:': use 'brew' to target the whole manager"
        );
    }
}
