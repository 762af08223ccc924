//! Cache root resolution
//!
//! Every dataset lives under one root directory:
//! ```text
//! {root}/
//! ├── RACE/
//! │   ├── RACE.tar.gz
//! │   └── ...           # unpacked archive contents
//! └── ALLEN_AI_DROP/
//! ```
//!
//! Preference order for `{root}`:
//! 1. `$DATAMINE_CACHE_DIR` (when set and non-empty)
//! 2. a configured default directory, if any
//! 3. `~/.datamine_cache_dir`

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::collection::Collection;
use crate::error::{DatasetError, Result};

/// Environment variable overriding the cache root.
pub const CACHE_DIR_ENV_VAR: &str = "DATAMINE_CACHE_DIR";

/// Directory created under the user's home when nothing else is configured.
pub const DEFAULT_DIR_NAME: &str = ".datamine_cache_dir";

/// Process exit status used when the cache root is occupied by a file.
pub const EXIT_CACHE_ROOT_NOT_DIRECTORY: i32 = 3;

/// Resolves (and lazily creates) the cache root.
///
/// Clones share the creation lock; separately constructed resolvers don't,
/// unless one is handed the other's lock via [`CacheRootResolver::with_lock`].
#[derive(Debug, Clone)]
pub struct CacheRootResolver {
    env_var: String,
    default_dir: Option<PathBuf>,
    home: Option<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl Default for CacheRootResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheRootResolver {
    pub fn new() -> Self {
        let home = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf());
        Self {
            env_var: CACHE_DIR_ENV_VAR.to_string(),
            default_dir: None,
            home,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read the override from a different environment variable.
    pub fn with_env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        self
    }

    /// Use `home` instead of the detected home directory.
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Fallback used when the environment variable is unset or empty.
    pub fn with_default_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_dir = Some(dir.into());
        self
    }

    /// Share a creation lock with other resolvers.
    pub fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = lock;
        self
    }

    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// The root as configured, before normalization.
    fn configured_root(&self) -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(&self.env_var).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(dir) = &self.default_dir {
            return Ok(dir.clone());
        }
        self.home
            .as_ref()
            .map(|h| h.join(DEFAULT_DIR_NAME))
            .ok_or(DatasetError::HomeDirUnavailable)
    }

    /// Resolve the cache root, creating it (mode 0755) if missing.
    ///
    /// Fails with [`DatasetError::CacheRootNotDirectory`] if the path is
    /// taken by something that isn't a directory.
    pub fn resolve(&self) -> Result<PathBuf> {
        let root = normalize(&self.configured_root()?, self.home.as_deref())?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => return Ok(root),
            Ok(_) => return Err(DatasetError::CacheRootNotDirectory(root)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(DatasetError::io(&root, e)),
        }

        log::debug!("creating cache root {}", root.display());
        create_dir_all_0755(&root).map_err(|e| DatasetError::io(&root, e))?;
        Ok(root)
    }

    /// Like [`resolve`](Self::resolve), but a cache root occupied by a file
    /// terminates the process with [`EXIT_CACHE_ROOT_NOT_DIRECTORY`].
    pub fn resolve_or_exit(&self) -> Result<PathBuf> {
        match self.resolve() {
            Err(e @ DatasetError::CacheRootNotDirectory(_)) => {
                log::error!("{e}");
                std::process::exit(EXIT_CACHE_ROOT_NOT_DIRECTORY);
            }
            other => other,
        }
    }

    /// `{root}/{id}`; the root is created, the dataset directory is not.
    pub fn dataset_dir(&self, id: Collection) -> Result<PathBuf> {
        Ok(self.resolve()?.join(id.name()))
    }
}

/// Create `path` and its parents; an existing directory is fine.
fn create_dir_all_0755(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new().recursive(true).mode(0o755).create(path)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path)
    }
}

/// Expand `~`, make absolute, and resolve symlinks.
///
/// Symlinks are resolved on the longest prefix that exists; the missing tail
/// is appended as-is so a root that doesn't exist yet still normalizes.
fn normalize(path: &Path, home: Option<&Path>) -> Result<PathBuf> {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => home
            .ok_or(DatasetError::HomeDirUnavailable)?
            .join(rest),
        Err(_) => path.to_path_buf(),
    };

    let absolute = std::path::absolute(&expanded).map_err(|e| DatasetError::io(&expanded, e))?;
    let absolute = lexical_clean(&absolute);

    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    loop {
        match fs::canonicalize(existing) {
            Ok(canonical) => {
                let mut out = canonical;
                out.extend(tail.iter().rev());
                return Ok(out);
            }
            Err(_) => match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    tail.push(name.to_os_string());
                    existing = parent;
                }
                _ => return Ok(absolute),
            },
        }
    }
}

/// Drop `.` and fold `..` without touching the filesystem.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
