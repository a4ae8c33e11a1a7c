use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::{APP_DIR_NAME, BUNDLED_CASCADE_DIR};

#[derive(Error, Debug)]
pub enum AssetResolveError {
    #[error("asset {name} not found (searched: {})", display_paths(.searched))]
    NotFound { name: String, searched: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve a cascade file by name, checking local locations only.
///
/// Resolution order:
/// 1. Explicit directory (from config or CLI)
/// 2. User data directory (platform-specific)
/// 3. Bundled `cascades/` directory relative to the working directory
pub fn resolve(name: &str, explicit_dir: Option<&Path>) -> Result<PathBuf, AssetResolveError> {
    let mut candidates = Vec::new();
    if let Some(dir) = explicit_dir {
        candidates.push(dir.to_path_buf());
    }
    if let Some(dir) = user_cascade_dir() {
        candidates.push(dir);
    }
    candidates.push(PathBuf::from(BUNDLED_CASCADE_DIR));
    resolve_in(name, &candidates)
}

/// Returns the first `dir/name` that exists, in the given order.
pub fn resolve_in(name: &str, dirs: &[PathBuf]) -> Result<PathBuf, AssetResolveError> {
    let searched: Vec<PathBuf> = dirs.iter().map(|d| d.join(name)).collect();
    match searched.iter().find(|p| p.is_file()) {
        Some(found) => {
            log::debug!("Resolved {name} to {}", found.display());
            Ok(found.clone())
        }
        None => Err(AssetResolveError::NotFound {
            name: name.to_string(),
            searched,
        }),
    }
}

/// Platform-specific user cascade directory.
///
/// - macOS: `~/Library/Application Support/FanCam/cascades/`
/// - Linux: `$XDG_DATA_HOME/FanCam/cascades/` or `~/.local/share/FanCam/cascades/`
/// - Windows: `%APPDATA%/FanCam/cascades/`
pub fn user_cascade_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR_NAME).join("cascades"))
}
