// File: ./src/context.rs
/*! Application context abstraction for filesystem paths.

The `AppContext` trait encapsulates how eventfold finds its config and cache
directories. Two implementations are provided:

- `StandardContext`: uses `directories::ProjectDirs`, or an override root
  passed with `--root`.
- `TestContext`: a unique temporary directory, removed on drop.

Nothing here reads environment variables or global state. Callers pass a
`&dyn AppContext` to any code that touches the filesystem.
*/

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const CONFIG_FILENAME: &str = "config.toml";
pub const SOURCES_FILENAME: &str = "sources.toml";
pub const LAST_RUN_FILENAME: &str = "last_run.json";

/// Defines the file system context for the application.
///
/// The trait is object-safe so callers can hold `Arc<dyn AppContext>`.
pub trait AppContext: Send + Sync + std::fmt::Debug {
    fn get_config_dir(&self) -> Result<PathBuf>;
    fn get_cache_dir(&self) -> Result<PathBuf>;

    fn get_config_file_path(&self) -> Result<PathBuf> {
        Ok(self.get_config_dir()?.join(CONFIG_FILENAME))
    }

    fn get_sources_file_path(&self) -> Result<PathBuf> {
        Ok(self.get_config_dir()?.join(SOURCES_FILENAME))
    }

    fn get_last_run_path(&self) -> Option<PathBuf> {
        self.get_cache_dir().ok().map(|p| p.join(LAST_RUN_FILENAME))
    }
}

// --- Production Implementation ---

#[derive(Clone, Debug)]
pub struct StandardContext {
    override_root: Option<PathBuf>,
}

impl StandardContext {
    /// When `override_root` is `Some(path)`, directories are created under
    /// that root as `config` and `cache`.
    pub fn new(override_root: Option<PathBuf>) -> Self {
        Self { override_root }
    }

    fn ensure_exists(path: PathBuf) -> Result<PathBuf> {
        if !path.exists() {
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(path)
    }

    fn get_proj_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("org", "eventfold", "eventfold")
    }
}

impl AppContext for StandardContext {
    fn get_config_dir(&self) -> Result<PathBuf> {
        if let Some(root) = &self.override_root {
            return Self::ensure_exists(root.join("config"));
        }
        let proj = Self::get_proj_dirs().ok_or_else(|| anyhow::anyhow!("No home directory"))?;
        Self::ensure_exists(proj.config_dir().to_path_buf())
    }

    fn get_cache_dir(&self) -> Result<PathBuf> {
        if let Some(root) = &self.override_root {
            return Self::ensure_exists(root.join("cache"));
        }
        let proj = Self::get_proj_dirs().ok_or_else(|| anyhow::anyhow!("No home directory"))?;
        Self::ensure_exists(proj.cache_dir().to_path_buf())
    }
}

// --- Test Implementation ---

#[derive(Clone, Debug)]
pub struct TestContext {
    pub root: PathBuf,
}

impl TestContext {
    /// Creates a new TestContext backed by a unique temporary directory.
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let root = std::env::temp_dir().join(format!("eventfold_test_{}", uuid));
        std::fs::create_dir_all(&root).expect("failed to create TestContext temp dir");
        Self { root }
    }

    /// Writes `contents` into the config directory under `filename`.
    pub fn write_config_file(&self, filename: &str, contents: &str) -> Result<PathBuf> {
        let path = self.get_config_dir()?.join(filename);
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write test file {:?}", path))?;
        Ok(path)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AppContext for TestContext {
    fn get_config_dir(&self) -> Result<PathBuf> {
        let p = self.root.join("config");
        std::fs::create_dir_all(&p)?;
        Ok(p)
    }

    fn get_cache_dir(&self) -> Result<PathBuf> {
        let p = self.root.join("cache");
        std::fs::create_dir_all(&p)?;
        Ok(p)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
