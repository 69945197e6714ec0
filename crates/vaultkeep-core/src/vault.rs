//! On-disk layout of a vault.
//!
//! ```text
//! <root>/sessions/<id>/<YYYY>/<MM>/<DD>/<session-id>/
//! <root>/sessions/<id>/.archives/memories-archive-<YYYY-MM>.json
//! <root>/backups/<name>-<timestamp>.tar.gz
//! ```

use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

pub const SESSIONS_DIR: &str = "sessions";
pub const ARCHIVES_DIR: &str = ".archives";
pub const BACKUPS_DIR: &str = "backups";

/// Identifier and root directory of one vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultPaths {
    id: String,
    root: PathBuf,
}

impl VaultPaths {
    /// Validate `id` and bind it to `root`. No filesystem access happens here.
    pub fn new(id: impl Into<String>, root: impl AsRef<Path>) -> VaultResult<Self> {
        let id = id.into();
        let invalid = id.trim().is_empty()
            || id == "."
            || id.contains("..")
            || id.contains('/')
            || id.contains('\\');
        if invalid {
            return Err(VaultError::InvalidVaultId { id });
        }
        Ok(Self {
            id,
            root: root.as_ref().to_path_buf(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.root.join(SESSIONS_DIR).join(&self.id)
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.sessions_dir().join(ARCHIVES_DIR)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let v = VaultPaths::new("notes", "/data/vault").unwrap();
        assert_eq!(v.sessions_dir(), PathBuf::from("/data/vault/sessions/notes"));
        assert_eq!(
            v.archives_dir(),
            PathBuf::from("/data/vault/sessions/notes/.archives")
        );
        assert_eq!(v.backups_dir(), PathBuf::from("/data/vault/backups"));
    }

    #[test]
    fn test_rejects_traversal_ids() {
        for bad in ["", "  ", ".", "..", "../etc", "a/b", "a\\b"] {
            assert!(
                matches!(
                    VaultPaths::new(bad, "/data"),
                    Err(VaultError::InvalidVaultId { .. })
                ),
                "accepted {bad:?}"
            );
        }
    }
}
