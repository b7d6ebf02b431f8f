use std::borrow::Cow;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

/// Environment variable overriding the default asset directory.
pub const ASSETS_ENV_VAR: &str = "VERDICT_ASSETS";

/// Read-only access to the packaged assets a model is made of.
///
/// Names are relative and `/`-separated, e.g. `"sentiment/model.onnx"`.
pub trait AssetSource: Send + Sync {
    /// Reads an asset completely into memory.
    fn open(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Human-readable description of where assets come from, for logs.
    fn describe(&self) -> String;
}

/// Assets laid out under a directory on disk.
#[derive(Debug, Clone)]
pub struct AssetDir {
    root: PathBuf,
}

impl AssetDir {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Creates an `AssetDir` at the default location
    pub fn default_location() -> Self {
        Self::new(Self::get_default_assets_dir())
    }

    /// Returns the default assets directory path
    pub fn get_default_assets_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(ASSETS_ENV_VAR) {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("verdict").join("assets");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("verdict").join("assets");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("verdict").join("assets")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps an asset name to a path below the root, refusing anything that escapes it.
    fn resolve(&self, name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid asset name '{}'", name),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl AssetSource for AssetDir {
    fn open(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.resolve(name)?;
        log::debug!("Reading asset {:?}", path);
        fs::read(&path)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

/// Assets held in memory, e.g. compiled in with `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    entries: HashMap<String, Cow<'static, [u8]>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an asset and returns the set for chaining
    pub fn with_asset(mut self, name: impl Into<String>, bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Cow<'static, [u8]>>) {
        self.entries.insert(name.into(), bytes.into());
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetSource for MemoryAssets {
    fn open(&self, name: &str) -> io::Result<Vec<u8>> {
        self.entries
            .get(name)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("Asset '{}' not found", name)))
    }

    fn describe(&self) -> String {
        format!("in-memory bundle ({} assets)", self.entries.len())
    }
}

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
