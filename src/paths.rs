//! Project path resolution for rtf
//!
//! rtf works on a project directory holding `.rtfstate`, `Vagrantfile`,
//! `platforms/` and the optional `rtf.toml`.
//!
//! # Environment Variables
//!
//! - `RTF_ROOT` - Override the project directory (default: current directory)
//! - `RTF_CONFIG` - Override the settings file (default: `<root>/rtf.toml`)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for project directory override
pub const ENV_ROOT: &str = "RTF_ROOT";

/// Environment variable for settings file override
pub const ENV_CONFIG: &str = "RTF_CONFIG";

/// Settings file name inside the project directory
pub const CONFIG_FILE: &str = "rtf.toml";

/// Get the project directory
///
/// Priority:
/// 1. `RTF_ROOT` env var
/// 2. Current directory
pub fn project_root() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_ROOT) {
        let path = expand(&dir);
        log::debug!("Using project root from {}: {}", ENV_ROOT, path.display());
        return Ok(path);
    }

    let cwd = std::env::current_dir().context("Could not determine current directory")?;
    log::debug!("Using current directory as project root: {}", cwd.display());
    Ok(cwd)
}

/// Get the settings file path
///
/// Priority:
/// 1. `RTF_CONFIG` env var
/// 2. `<root>/rtf.toml`
pub fn config_file(root: &Path) -> PathBuf {
    if let Ok(file) = std::env::var(ENV_CONFIG) {
        let path = expand(&file);
        log::debug!("Using settings file from {}: {}", ENV_CONFIG, path.display());
        return path;
    }
    root.join(CONFIG_FILE)
}

/// Resolve a configured path against the project directory.
///
/// `~` and environment variables are expanded; absolute results are kept.
pub fn resolve(root: &Path, path: &str) -> PathBuf {
    let expanded = expand(path);
    if expanded.is_absolute() {
        expanded
    } else {
        root.join(expanded)
    }
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
