//! Cookie state of a browsing session.
//!
//! Cookies are kept as the raw `name=value` pairs that go into a `Cookie`
//! request header. Attributes such as `Path` or `Max-Age` are dropped when a
//! `Set-Cookie` value is converted, and the whole list is always replaced,
//! never merged by name.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::ConfigStore;
use crate::error::Result;

const COOKIES_KEY: &str = "cookies";
const SET_COOKIE_PREFIX: &str = "set-cookie:";

/// In-memory cookie list bound to a persistent [`ConfigStore`].
///
/// Memory and disk only meet through [`CookieStore::load_config_file`] and
/// [`CookieStore::save_config_file`]. Cloning copies the entries; the clone
/// shares the backing store but nothing is written until it is saved.
#[derive(Clone)]
pub struct CookieStore {
    cookies: Vec<String>,
    config: Arc<dyn ConfigStore>,
}

impl CookieStore {
    /// An empty store. Nothing is read from `config` yet.
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self {
            cookies: Vec::new(),
            config,
        }
    }

    /// Creates a store and fills it from `config`.
    pub fn load(config: Arc<dyn ConfigStore>) -> Result<Self> {
        let mut store = Self::new(config);
        store.load_config_file()?;
        Ok(store)
    }

    pub fn get(&self) -> &[String] {
        &self.cookies
    }

    /// Replaces every entry. Does not persist.
    pub fn set(&mut self, cookies: Vec<String>) {
        self.cookies = cookies;
    }

    pub fn empty(&mut self) {
        self.cookies.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Value for a `Cookie` request header, e.g. `a=1; b=2`.
    pub fn header_value(&self) -> String {
        self.cookies.join("; ")
    }

    /// Overwrites the in-memory entries with the persisted ones. A first
    /// run without saved cookies leaves the store empty.
    pub fn load_config_file(&mut self) -> Result<()> {
        self.cookies = match self.config.get(COOKIES_KEY)? {
            None => Vec::new(),
            Some(value) => match serde_json::from_value::<Vec<String>>(value) {
                Ok(cookies) => cookies,
                Err(e) => {
                    log::warn!("ignoring unreadable saved cookies: {e}");
                    Vec::new()
                }
            },
        };
        log::debug!("loaded {} cookie(s)", self.cookies.len());
        Ok(())
    }

    /// Writes the in-memory entries, replacing the persisted ones.
    pub fn save_config_file(&self) -> Result<()> {
        let value = Value::from(self.cookies.clone());
        self.config.set(COOKIES_KEY, value)?;
        log::debug!("saved {} cookie(s)", self.cookies.len());
        Ok(())
    }
}

impl fmt::Debug for CookieStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // values are credentials
        f.debug_struct("CookieStore")
            .field("count", &self.cookies.len())
            .finish_non_exhaustive()
    }
}

/// Reduces `Set-Cookie` header values to their `name=value` pairs.
///
/// A leading `Set-Cookie:` header name is stripped regardless of case, and
/// everything from the first `;` on is dropped.
pub fn set_cookies_to_entries<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|value| {
            let value = value.as_ref().trim();
            let value = match value.get(..SET_COOKIE_PREFIX.len()) {
                Some(head) if head.eq_ignore_ascii_case(SET_COOKIE_PREFIX) => {
                    value[SET_COOKIE_PREFIX.len()..].trim_start()
                }
                _ => value,
            };
            let pair = value.split(';').next().unwrap_or_default().trim();
            (!pair.is_empty()).then(|| pair.to_string())
        })
        .collect()
}
