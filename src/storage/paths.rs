//! Where showroom keeps its config file and worker database.

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};

const APP: &str = "showroom";

/// Platform directories for config and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    /// Platform-native locations, or XDG-style paths under the home
    /// directory when the platform gives none.
    #[must_use]
    pub fn new() -> Self {
        ProjectDirs::from("com", APP, APP).map_or_else(Self::home_fallback, |dirs| {
            Self::at(dirs.config_dir(), dirs.data_dir())
        })
    }

    /// Explicit locations.
    #[must_use]
    pub fn at(config_dir: &Path, data_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            data_dir: data_dir.to_path_buf(),
        }
    }

    fn home_fallback() -> Self {
        let home = BaseDirs::new().map_or_else(|| PathBuf::from("."), |b| b.home_dir().to_path_buf());
        Self::at(&home.join(".config").join(APP), &home.join(".local/share").join(APP))
    }

    /// `config.toml` in the config directory.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Cache stores, pending queue and worker metadata.
    #[must_use]
    pub fn worker_db_file(&self) -> PathBuf {
        self.data_dir.join("worker-cache.sqlite")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_their_directories() {
        let paths = AppPaths::at(Path::new("/etc/showroom"), Path::new("/var/lib/showroom"));
        assert_eq!(paths.config_file(), Path::new("/etc/showroom/config.toml"));
        assert_eq!(paths.worker_db_file(), Path::new("/var/lib/showroom/worker-cache.sqlite"));
    }
}
