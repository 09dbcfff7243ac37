//! Vault registry: named root directories, validated once at construction.
//!
//! An explicit registry object built at the composition root and passed
//! through — no process-wide state. Roots are safety-checked and overlap-
//! checked up front so every later per-call lookup is cheap.

use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};
use crate::paths;

pub struct VaultRegistry {
    vaults: Vec<(String, PathBuf)>,
}

impl VaultRegistry {
    /// Build a registry from `(name, root)` pairs. Every root must pass
    /// the safety checks (no system dirs, no home root, no hidden dirs,
    /// no network mounts) and no two roots may overlap.
    pub async fn new(entries: Vec<(String, PathBuf)>) -> Result<Self> {
        let mut vaults = Vec::with_capacity(entries.len());
        for (name, root) in entries {
            let normalized = paths::ensure_safe_root(&root.to_string_lossy()).await?;
            vaults.push((name, PathBuf::from(normalized)));
        }

        let roots: Vec<PathBuf> = vaults.iter().map(|(_, r)| r.clone()).collect();
        paths::check_no_overlap(&roots)?;

        log::info!("[VAULT] Registered {} vault(s)", vaults.len());
        Ok(VaultRegistry { vaults })
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.vaults
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, root)| root.as_path())
    }

    /// Lookup that treats an unknown vault as an error.
    pub fn resolve(&self, name: &str) -> Result<&Path> {
        self.get(name).ok_or_else(|| {
            VaultError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("unknown vault: {name}"),
            ))
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vaults.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }
}
