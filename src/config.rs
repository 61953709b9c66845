//! Service configuration.
//!
//! Read from a TOML file (`YATUBE_CONFIG`, default `yatube.toml`), then
//! overridden from the environment. A missing file is not an error: every
//! key has a default.
//!
//! ```toml
//! bind = "0.0.0.0:8000"
//! database = "yatube.sqlite3"
//! page_size = 10
//! index_cache_secs = 20
//! index_cache_entries = 64
//!
//! [[groups]]
//! title = "Cats"
//! slug = "cats"
//! description = "Everything about cats"
//! ```

use std::env;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::Error;
use crate::paginator::DEFAULT_PAGE_SIZE;

pub const CONFIG_ENV: &str = "YATUBE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "yatube.toml";

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind: String,
    /// SQLite file path, or `:memory:`.
    pub database: String,
    /// Posts per listing page.
    pub page_size: usize,
    /// How long the rendered index page is served from cache.
    pub index_cache_secs: u64,
    /// Most index pages (distinct request targets) kept in the cache.
    pub index_cache_entries: usize,
    pub session_ttl_secs: u64,
    /// Groups created at startup when their slug does not exist yet.
    pub groups: Vec<GroupSeed>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct GroupSeed {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_owned(),
            database: "yatube.sqlite3".to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            index_cache_secs: 20,
            index_cache_entries: 64,
            session_ttl_secs: 14 * 24 * 60 * 60,
            groups: Vec::new(),
        }
    }
}

impl Config {
    /// Loads the file named by `YATUBE_CONFIG` and applies env overrides.
    pub fn load() -> Result<Self, Error> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        let mut config = Self::from_file(Path::new(&path))?;
        config.apply_env(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parses `path`, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|source| Error::Config {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// `YATUBE_BIND` and `YATUBE_DATABASE` win over the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = var("YATUBE_BIND") {
            info!(%bind, "YATUBE_BIND set, overriding bind address");
            self.bind = bind;
        }
        if let Some(database) = var("YATUBE_DATABASE") {
            info!(%database, "YATUBE_DATABASE set, overriding database path");
            self.database = database;
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig("page_size must be at least 1".to_owned()));
        }
        let bad_slug = |slug: &str| {
            slug.is_empty() || !slug.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        if let Some(g) = self.groups.iter().find(|g| bad_slug(&g.slug)) {
            return Err(Error::InvalidConfig(format!(
                "group `{}` needs a slug of ASCII letters, digits, `-` or `_`",
                g.title
            )));
        }
        Ok(())
    }
}
