//! Path normalization and vault containment guard.
//!
//! Every path coming in from a tool handler goes through here before any
//! filesystem call. Containment resolves symlinks and fails closed: if a
//! path cannot be resolved, it is rejected rather than assumed safe.

use crate::error::{Result, VaultError};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The only hidden directory allowed inside a vault (holds vault config
/// and the saved-search document).
pub const VAULT_CONFIG_DIR: &str = ".obsidian";

/// Budget for the best-effort network mount probe. A probe that exceeds
/// this is treated as "unsupported location", never as "local disk".
const NETWORK_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Filesystem types considered network-backed when probing mount tables.
const NETWORK_FS_TYPES: &[&str] = &[
    "nfs", "nfs4", "cifs", "smbfs", "smb3", "sshfs", "fuse.sshfs", "9p", "afs", "davfs",
];

/// Directory prefixes that are never valid vault locations.
const SYSTEM_DIR_PREFIXES: &[&str] = &[
    "/etc", "/sys", "/proc", "/dev", "/boot", "/bin", "/sbin",
    "c:/windows", "c:/program files", "c:/program files (x86)",
];

/// Characters that are illegal in filename components on Windows.
/// Rejected on every platform so a vault stays portable across machines.
const ILLEGAL_NAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

fn invalid_path(msg: impl Into<String>) -> VaultError {
    VaultError::Io(io::Error::new(io::ErrorKind::InvalidInput, msg.into()))
}

/// Normalize a raw path string: unify separators to `/`, collapse `.` and
/// duplicate separators, resolve `..` against earlier segments where
/// possible, and recognise Windows drive (`C:\`) and UNC (`\\server\share`)
/// prefixes. Rejects empty input and illegal filename characters.
///
/// `..` segments that cannot be resolved (leading ones) are kept; the
/// containment checks reject them.
pub fn normalize(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid_path("empty path"));
    }
    if trimmed.contains('\0') {
        return Err(invalid_path("path contains NUL byte"));
    }

    let unified = trimmed.replace('\\', "/");

    // Peel off the root prefix so segment processing never touches it.
    let (prefix, rest) = split_prefix(&unified);

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if matches!(segments.last(), Some(&s) if s != "..") {
                    segments.pop();
                } else if prefix.is_empty() {
                    segments.push("..");
                }
                // A ".." at the root of an absolute path stays at the root.
            }
            name => {
                if name.chars().any(|c| ILLEGAL_NAME_CHARS.contains(&c) || c.is_control()) {
                    return Err(invalid_path(format!(
                        "illegal character in path component: {name:?}"
                    )));
                }
                segments.push(name);
            }
        }
    }

    let joined = segments.join("/");
    let normalized = if prefix.is_empty() {
        if joined.is_empty() {
            ".".to_string()
        } else {
            joined
        }
    } else {
        format!("{prefix}{joined}")
    };
    Ok(normalized)
}

/// Split a separator-unified path into (root prefix, remainder).
/// Recognises `//server/` UNC roots, `C:/` drive roots, and plain `/`.
fn split_prefix(path: &str) -> (String, &str) {
    if let Some(rest) = path.strip_prefix("//") {
        // UNC: keep `//server/share/` together as the root.
        let mut parts = rest.splitn(3, '/');
        let server = parts.next().unwrap_or("");
        let share = parts.next().unwrap_or("");
        let tail = parts.next().unwrap_or("");
        return (format!("//{server}/{share}/"), tail);
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        let drive = (bytes[0] as char).to_ascii_uppercase();
        let rest = path[2..].trim_start_matches('/');
        return (format!("{drive}:/"), rest);
    }
    if let Some(rest) = path.strip_prefix('/') {
        return ("/".to_string(), rest);
    }
    (String::new(), path)
}

/// True when the normalized path still carries a parent-directory segment.
pub fn has_traversal(normalized: &str) -> bool {
    normalized == ".." || normalized.starts_with("../") || normalized.contains("/../")
        || normalized.ends_with("/..")
}

/// Join a vault-relative path onto a vault root, rejecting absolute input
/// and anything that would escape the root after normalization.
pub fn guarded_join(vault_root: &Path, relative: &str) -> Result<PathBuf> {
    let normalized = normalize(relative)?;
    if has_traversal(&normalized) {
        return Err(VaultError::PathOutsideVault {
            path: relative.to_string(),
        });
    }
    let (prefix, _) = split_prefix(&normalized);
    if !prefix.is_empty() {
        return Err(VaultError::PathOutsideVault {
            path: relative.to_string(),
        });
    }
    Ok(vault_root.join(normalized))
}

/// Resolve symlinks and require `target` to live strictly inside
/// `vault_root` (the root itself is rejected).
///
/// When the target does not exist yet, its deepest existing ancestor is
/// resolved instead and the missing tail re-appended, so a create into a
/// symlinked-away directory is still caught. Fails closed: a root that
/// cannot be resolved is an error, never a pass.
pub async fn validate_containment(vault_root: &Path, target: &Path) -> Result<PathBuf> {
    let root = tokio::fs::canonicalize(vault_root).await?;

    let resolved = resolve_existing_prefix(target).await?;
    // The root itself is not a valid target; only paths strictly below it.
    if resolved != root && resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(VaultError::PathOutsideVault {
            path: target.display().to_string(),
        })
    }
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the
/// non-existing tail.
async fn resolve_existing_prefix(path: &Path) -> Result<PathBuf> {
    match tokio::fs::canonicalize(path).await {
        Ok(resolved) => Ok(resolved),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let mut missing: Vec<std::ffi::OsString> = Vec::new();
            let mut cursor = path.to_path_buf();
            loop {
                if let Some(name) = cursor.file_name() {
                    missing.push(name.to_os_string());
                } else {
                    // Ran out of components without finding anything on disk.
                    return Err(VaultError::PathOutsideVault {
                        path: path.display().to_string(),
                    });
                }
                cursor = match cursor.parent() {
                    Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                    _ => {
                        return Err(VaultError::PathOutsideVault {
                            path: path.display().to_string(),
                        });
                    }
                };
                match tokio::fs::canonicalize(&cursor).await {
                    Ok(mut resolved) => {
                        for name in missing.iter().rev() {
                            resolved.push(name);
                        }
                        return Ok(resolved);
                    }
                    Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Validate a candidate vault root location. Rejects system directories,
/// the user's home directory itself, hidden directories other than the
/// vault config dir, traversal remnants, and network-backed locations.
pub async fn ensure_safe_root(raw: &str) -> Result<String> {
    let normalized = normalize(raw)?;
    if has_traversal(&normalized) {
        return Err(VaultError::PathOutsideVault {
            path: raw.to_string(),
        });
    }

    let lower = normalized.to_lowercase();
    for prefix in SYSTEM_DIR_PREFIXES {
        if lower == *prefix || lower.starts_with(&format!("{prefix}/")) {
            return Err(VaultError::PathOutsideVault {
                path: raw.to_string(),
            });
        }
    }

    if let Some(home) = dirs_next::home_dir() {
        if let Ok(home_norm) = normalize(&home.to_string_lossy()) {
            if normalized == home_norm {
                return Err(VaultError::PathOutsideVault {
                    path: raw.to_string(),
                });
            }
        }
    }

    let (_, rest) = split_prefix(&normalized);
    for component in rest.split('/') {
        if component.starts_with('.') && component != VAULT_CONFIG_DIR {
            return Err(VaultError::PathOutsideVault {
                path: raw.to_string(),
            });
        }
    }

    ensure_local(&normalized).await?;
    Ok(normalized)
}

/// Best-effort network mount detection. UNC paths are always network;
/// on Unix the mount table is probed under a timeout. Timeout or an
/// unreadable mount table is treated as unsupported, not as local.
async fn ensure_local(normalized: &str) -> Result<()> {
    if normalized.starts_with("//") {
        return Err(invalid_path(format!(
            "network location is not supported as a vault: {normalized}"
        )));
    }

    #[cfg(unix)]
    {
        let probe = tokio::time::timeout(
            NETWORK_PROBE_TIMEOUT,
            tokio::fs::read_to_string("/proc/mounts"),
        )
        .await;
        match probe {
            Ok(Ok(mounts)) => {
                for line in mounts.lines() {
                    let mut fields = line.split_whitespace();
                    let _device = fields.next();
                    let mount_point = fields.next().unwrap_or("");
                    let fs_type = fields.next().unwrap_or("");
                    if NETWORK_FS_TYPES.contains(&fs_type)
                        && (normalized == mount_point
                            || normalized.starts_with(&format!("{mount_point}/")))
                    {
                        return Err(invalid_path(format!(
                            "network mount ({fs_type}) is not supported as a vault: {normalized}"
                        )));
                    }
                }
                Ok(())
            }
            _ => {
                log::warn!("[PATHS] Mount table probe failed or timed out; rejecting {normalized}");
                Err(invalid_path(format!(
                    "could not determine whether path is a network mount: {normalized}"
                )))
            }
        }
    }

    #[cfg(not(unix))]
    {
        Ok(())
    }
}

/// Reject duplicate vault roots and any pair where one root is an
/// ancestor of the other.
pub fn check_no_overlap(roots: &[PathBuf]) -> Result<()> {
    let normalized: Vec<String> = roots
        .iter()
        .map(|r| normalize(&r.to_string_lossy()))
        .collect::<Result<_>>()?;

    for (i, a) in normalized.iter().enumerate() {
        for b in normalized.iter().skip(i + 1) {
            if a == b {
                return Err(invalid_path(format!("duplicate vault root: {a}")));
            }
            let (outer, inner) = if a.len() < b.len() { (a, b) } else { (b, a) };
            if inner.starts_with(&format!("{}/", outer.trim_end_matches('/'))) {
                return Err(invalid_path(format!(
                    "vault roots overlap: {outer} contains {inner}"
                )));
            }
        }
    }
    Ok(())
}
