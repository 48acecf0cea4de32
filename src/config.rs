//! Key-value configuration stores.
//!
//! Every namespace lives in its own JSON object. The cookie store keeps its
//! entries in the [`SESSION_NAMESPACE`] namespace.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use derive_builder::Builder;
use directories::ProjectDirs;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const SESSION_NAMESPACE: &str = "session";

/// Overrides the platform configuration directory when set.
pub const CONFIG_DIR_ENV: &str = "ACC_CONFIG_DIR";

pub const DEFAULT_BASE_URL: &str = "https://atcoder.jp/";
pub const DEFAULT_USER_AGENT: &str = concat!("atcoder-cli/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`crate::AtCoder`].
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct ClientConfig {
    /// Site root, e.g. `https://atcoder.jp/`.
    #[builder(default = "DEFAULT_BASE_URL.to_string()")]
    pub base_url: String,
    #[builder(default = "DEFAULT_USER_AGENT.to_string()")]
    pub user_agent: String,
    /// Per-request timeout. None waits as long as the server does.
    #[builder(default, setter(into, strip_option))]
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
        }
    }
}

/// Namespaced key-value persistence.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Writes `value` under `key`, replacing whatever was stored there.
    fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Removes `key`. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Platform configuration directory, e.g. `~/.config/atcoder-cli` on Linux.
pub fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let dirs = ProjectDirs::from("", "", "atcoder-cli").ok_or(Error::NoConfigDir)?;
    Ok(dirs.config_dir().to_path_buf())
}

/// A namespace persisted as `<dir>/<namespace>.json`.
///
/// The file is read on every access and rewritten in full on every change,
/// so two stores pointing at the same file always agree after a write. A
/// file that does not hold a JSON object reads as empty, so the next write
/// replaces it.
#[derive(Debug, Clone)]
pub struct JsonFileConfigStore {
    path: PathBuf,
}

impl JsonFileConfigStore {
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{namespace}.json")),
        }
    }

    /// Opens `namespace` inside [`default_config_dir`].
    pub fn open_default(namespace: &str) -> Result<Self> {
        Ok(Self::new(default_config_dir()?, namespace))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Map<String, Value>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(Error::config(&self.path, e)),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => {
                log::warn!(
                    "{} does not hold a JSON object ({}), treating it as empty",
                    self.path.display(),
                    json_kind(&other)
                );
                Ok(Map::new())
            }
            Err(e) => {
                log::warn!(
                    "{} is not valid JSON ({e}), treating it as empty",
                    self.path.display()
                );
                Ok(Map::new())
            }
        }
    }

    fn write(&self, map: Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::config(parent, e))?;
        }
        let content = serde_json::to_string_pretty(&Value::Object(map))?;
        fs::write(&self.path, content).map_err(|e| Error::config(&self.path, e))?;
        log::debug!("wrote {}", self.path.display());
        Ok(())
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.read()?;
        map.insert(key.to_string(), value);
        self.write(map)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut map = self.read()?;
        if map.remove(key).is_some() {
            self.write(map)?;
        }
        Ok(())
    }
}

/// In-process store. Counts writes so callers can check how often state
/// would have reached the disk.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: Mutex<Map<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set`/`delete` calls since construction.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
