//! File persistence helpers.
//!
//! Handles loading and saving state to disk with owner-only permissions.
//! Writes go to a sibling temp file that is renamed over the target, so a
//! reader never sees a half-written file.

use serde::{Serialize, de::DeserializeOwned};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::StoreError;

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory.
///
/// - macOS: `~/Library/Application Support/TallyBar`
/// - Linux: `~/.config/tallybar`
/// - Windows: `%APPDATA%\tallybar`
pub fn default_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::home_dir()
            .map(|h| h.join("Library").join("Application Support").join("TallyBar"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    #[cfg(not(target_os = "macos"))]
    {
        dirs::config_dir()
            .map(|c| c.join("tallybar"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Returns the default settings file path.
pub fn default_settings_path() -> PathBuf {
    default_config_dir().join("settings.json")
}

// ============================================================================
// Security: File Permissions
// ============================================================================

/// Sets restrictive file permissions (0o600) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0600", "Set restrictive permissions");
    Ok(())
}

/// Sets restrictive directory permissions (0o700) on Unix systems.
#[cfg(unix)]
async fn set_restrictive_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = tokio::fs::metadata(path).await?;
    let mut perms = metadata.permissions();
    perms.set_mode(0o700);
    tokio::fs::set_permissions(path, perms).await?;

    debug!(path = %path.display(), mode = "0700", "Set restrictive directory permissions");
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// No-op for non-Unix systems.
#[cfg(not(unix))]
async fn set_restrictive_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Creates the parent directory if missing, owner-only.
///
/// Existing directories are left alone; they may belong to another tool.
async fn create_secure_parent_dir(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !tokio::fs::try_exists(parent).await? {
            debug!(path = %parent.display(), "Creating secure directory");
            tokio::fs::create_dir_all(parent).await?;
            set_restrictive_dir_permissions(parent).await?;
        }
    }
    Ok(())
}

/// Returns the sibling temp path used for atomic writes.
fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("data"), OsString::from);
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes text to a file atomically with owner-only permissions.
///
/// The temp file is restricted before the rename, so the content is never
/// visible with wider permissions.
///
/// # Errors
///
/// Returns an error if any file operation fails. The temp file is removed
/// on a failed rename.
pub async fn write_secure(path: &Path, content: &str) -> Result<(), StoreError> {
    create_secure_parent_dir(path).await?;

    let temp_path = temp_path_for(path);
    tokio::fs::write(&temp_path, content).await?;
    set_restrictive_permissions(&temp_path).await?;

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = content.len(), "File written securely");
    Ok(())
}

/// Saves data to a JSON file with secure permissions.
///
/// # Errors
///
/// Returns an error if serialization or any file operation fails.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");
    let json = serde_json::to_string_pretty(data)?;
    write_secure(path, &json).await
}

/// Loads data from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    debug!(path = %path.display(), "Loading JSON file");

    let content = tokio::fs::read_to_string(path).await?;
    let data = serde_json::from_str(&content)?;

    debug!(path = %path.display(), "JSON file loaded");
    Ok(data)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_path() {
        let path = default_settings_path();
        assert!(path.ends_with("settings.json"));
    }

    #[test]
    fn test_temp_path_keeps_dotfile_name() {
        let temp = temp_path_for(Path::new("/home/u/.claude/.credentials.json"));
        assert_eq!(temp, PathBuf::from("/home/u/.claude/.credentials.json.tmp"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_secure_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().unwrap();
        let test_file = temp_dir.path().join("nested").join("secret.json");

        write_secure(&test_file, "{}").await.unwrap();

        let mode = tokio::fs::metadata(&test_file)
            .await
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600, "File should have 0600 permissions");

        let dir_mode = tokio::fs::metadata(test_file.parent().unwrap())
            .await
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700, "Created directory should have 0700 permissions");
    }

    #[tokio::test]
    async fn test_write_secure_replaces_and_cleans_temp() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("data.json");

        write_secure(&path, "first").await.unwrap();
        write_secure(&path, "second").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "second");
        assert!(!temp_path_for(&path).exists());
    }
}
