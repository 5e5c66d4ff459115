//! Browser profile discovery and staging
//!
//! The automated browser must see the operator's existing login cookies
//! without touching their real profile. [`resolve_default_profile`] finds the
//! default profile under a profiles root and [`StagedProfile::stage`] copies a
//! small allow-list of cookie and preference files into a fresh temporary
//! directory. The temporary directory is removed when the [`StagedProfile`]
//! is dropped, whichever way the run ends.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::{AutoAuthError, Result};

/// On-disk layout of a browser's profile directory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileLayout {
    /// `Profiles/<random>.default-release` with `cookies.sqlite`
    Firefox,
    /// `User Data/Default` with `Cookies`
    #[default]
    Chromium,
}

impl ProfileLayout {
    /// Profile name suffixes, most preferred first
    pub fn preferred_suffixes(&self) -> &'static [&'static str] {
        match self {
            ProfileLayout::Firefox => &[".default-release", ".default"],
            ProfileLayout::Chromium => &["Default"],
        }
    }

    /// Files copied from the profile directory when present, relative to it
    pub fn essential_files(&self) -> &'static [&'static str] {
        match self {
            ProfileLayout::Firefox => &[
                "cookies.sqlite",
                "cookies.sqlite-wal",
                "cookies.sqlite-shm",
                "prefs.js",
            ],
            ProfileLayout::Chromium => &[
                "Network/Cookies",
                "Network/Cookies-journal",
                "Cookies",
                "Cookies-journal",
                "Preferences",
            ],
        }
    }

    /// Files copied from the profiles root itself when present
    pub fn root_files(&self) -> &'static [&'static str] {
        match self {
            ProfileLayout::Firefox => &[],
            ProfileLayout::Chromium => &["Local State"],
        }
    }

    /// Subdirectory of the staged root receiving the profile files
    pub fn staged_subdir(&self) -> Option<&'static str> {
        match self {
            ProfileLayout::Firefox => None,
            ProfileLayout::Chromium => Some("Default"),
        }
    }

    /// File a fallback directory must contain to count as a profile
    fn marker_file(&self) -> Option<&'static str> {
        match self {
            ProfileLayout::Firefox => None,
            ProfileLayout::Chromium => Some("Preferences"),
        }
    }

    /// Platform default directory holding this browser's profiles
    pub fn default_profiles_root(&self) -> Option<PathBuf> {
        match self {
            ProfileLayout::Firefox => {
                if cfg!(target_os = "macos") {
                    dirs::data_dir().map(|d| d.join("Firefox").join("Profiles"))
                } else if cfg!(windows) {
                    dirs::data_dir().map(|d| d.join("Mozilla").join("Firefox").join("Profiles"))
                } else {
                    dirs::home_dir().map(|h| h.join(".mozilla").join("firefox"))
                }
            }
            ProfileLayout::Chromium => {
                if cfg!(target_os = "macos") {
                    dirs::data_dir().map(|d| d.join("Google").join("Chrome"))
                } else if cfg!(windows) {
                    dirs::data_local_dir()
                        .map(|d| d.join("Google").join("Chrome").join("User Data"))
                } else {
                    dirs::config_dir().map(|d| d.join("google-chrome"))
                }
            }
        }
    }
}

impl std::fmt::Display for ProfileLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileLayout::Firefox => write!(f, "firefox"),
            ProfileLayout::Chromium => write!(f, "chromium"),
        }
    }
}

/// Find the default profile directory under `root`
///
/// Resolution order:
/// 1. a directory ending with each preferred suffix, in suffix priority order
/// 2. the first non-hidden directory (by name) that looks like a profile
pub fn resolve_default_profile(root: &Path, layout: ProfileLayout) -> Result<PathBuf> {
    let not_found = |reason: String| AutoAuthError::ProfileNotFound {
        root: root.to_path_buf(),
        reason,
    };

    let entries = std::fs::read_dir(root).map_err(|e| not_found(format!("cannot list: {}", e)))?;

    let mut dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            Some((name, entry.path()))
        })
        .collect();
    dirs.sort_by(|a, b| a.0.cmp(&b.0));

    for suffix in layout.preferred_suffixes() {
        if let Some((name, path)) = dirs.iter().find(|(name, _)| name.ends_with(suffix)) {
            debug!("Resolved profile {} by suffix {}", name, suffix);
            return Ok(path.clone());
        }
    }

    dirs.into_iter()
        .filter(|(name, _)| !name.starts_with('.'))
        .find(|(_, path)| match layout.marker_file() {
            Some(marker) => path.join(marker).exists(),
            None => true,
        })
        .map(|(_, path)| path)
        .ok_or_else(|| not_found("no profile directory".to_string()))
}

/// Ephemeral copy of a profile's cookie and preference files
#[derive(Debug)]
pub struct StagedProfile {
    dir: TempDir,
    layout: ProfileLayout,
    copied: Vec<PathBuf>,
}

impl StagedProfile {
    /// Copy the layout's allow-listed files from `source` into a new temp dir
    ///
    /// Files that do not exist are skipped.
    pub fn stage(source: &Path, layout: ProfileLayout) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("autoauth_profile_")
            .tempdir()?;

        let profile_dir = match layout.staged_subdir() {
            Some(sub) => {
                let p = dir.path().join(sub);
                std::fs::create_dir_all(&p)?;
                p
            }
            None => dir.path().to_path_buf(),
        };

        let mut copied = Vec::new();
        for name in layout.essential_files() {
            copy_if_exists(&source.join(name), &profile_dir.join(name), &mut copied)?;
        }
        if let Some(root) = source.parent() {
            for name in layout.root_files() {
                copy_if_exists(&root.join(name), &dir.path().join(name), &mut copied)?;
            }
        }

        info!(
            "Staged {} profile files from {} into {}",
            copied.len(),
            source.display(),
            dir.path().display()
        );

        Ok(Self {
            dir,
            layout,
            copied,
        })
    }

    /// Root to hand to the browser as its profile / user data directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn layout(&self) -> ProfileLayout {
        self.layout
    }

    /// Destination paths of the files that were copied
    pub fn copied_files(&self) -> &[PathBuf] {
        &self.copied
    }

    /// Remove the staged directory now, reporting failures
    pub fn cleanup(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close()?;
        debug!("Removed staged profile {}", path.display());
        Ok(())
    }
}

fn copy_if_exists(src: &Path, dst: &Path, copied: &mut Vec<PathBuf>) -> Result<()> {
    if !src.exists() {
        debug!("Skipping missing profile file {}", src.display());
        return Ok(());
    }
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(src, dst)?;
    copied.push(dst.to_path_buf());
    Ok(())
}
