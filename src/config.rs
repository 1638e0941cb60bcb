//! Configuration for `loadr serve`, read from `loadr.toml`.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! interface = "127.0.0.1"     # Network interface (127.0.0.1 = localhost only)
//! port = 8080
//!
//! [templates]
//! dir = "templates"           # Root of the template filesystem
//! base = ["layout.html"]      # Base templates every page extends
//! partials = ["partials/*.html"]
//! pages = "pages/*.html"      # One route per matched file
//!
//! [live_reload]
//! enable = true
//! endpoint = "/live-server"
//! watch = ["templates"]       # Defaults to the template dir
//! debounce_ms = 100
//! ignore_extensions = ["rs"]
//! keep_alive_secs = 15
//! intercept_interrupt = true
//!
//! [site]                      # Free-form, rendered as `Base`
//! title = "My site"
//! ```
//!
//! A missing file yields the defaults. Relative paths resolve against the
//! directory holding the config file.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::livereload::{DEFAULT_ENDPOINT, LiveReloadOptions};

/// Default config file name.
pub const CONFIG_FILE: &str = "loadr.toml";

/// Upper bound of `[live_reload] debounce_ms`.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing `loadr.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory relative paths resolve against (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    pub serve: ServeSection,
    pub templates: TemplatesSection,
    pub live_reload: LiveReloadSection,

    /// Base data handed to every page.
    pub site: toml::Table,
}

/// `[serve]`: HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeSection {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,
    pub port: u16,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
        }
    }
}

/// `[templates]`: where templates live and how pages are found.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesSection {
    pub dir: PathBuf,
    pub base: Vec<String>,
    pub partials: Vec<String>,
    /// Glob of page templates, relative to `dir`.
    pub pages: String,
}

impl Default for TemplatesSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("templates"),
            base: vec!["layout.html".to_string()],
            partials: Vec::new(),
            pages: "pages/*.html".to_string(),
        }
    }
}

/// `[live_reload]`: reload browsers when templates change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveReloadSection {
    pub enable: bool,
    pub endpoint: String,
    /// Watched roots; empty means the template dir.
    pub watch: Vec<PathBuf>,
    pub debounce_ms: u64,
    pub ignore_extensions: Vec<String>,
    pub keep_alive_secs: u64,
    pub intercept_interrupt: bool,
}

impl Default for LiveReloadSection {
    fn default() -> Self {
        let options = LiveReloadOptions::default();
        Self {
            enable: false,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            watch: Vec::new(),
            debounce_ms: options.debounce.as_millis() as u64,
            ignore_extensions: options.ignore_extensions,
            keep_alive_secs: options.keep_alive.as_secs(),
            intercept_interrupt: options.intercept_interrupt,
        }
    }
}

impl Config {
    /// Load `path`, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
            Self::parse(&content)?
        } else {
            crate::debug!("config"; "{} not found, using defaults", path.display());
            Self::default()
        };
        config.root = root;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.live_reload.endpoint.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "live_reload.endpoint must start with '/', got `{}`",
                self.live_reload.endpoint
            )));
        }
        if !(1..=MAX_DEBOUNCE_MS).contains(&self.live_reload.debounce_ms) {
            return Err(ConfigError::Validation(format!(
                "live_reload.debounce_ms must be between 1 and {MAX_DEBOUNCE_MS}, got {}",
                self.live_reload.debounce_ms
            )));
        }
        if self.live_reload.keep_alive_secs == 0 {
            return Err(ConfigError::Validation(
                "live_reload.keep_alive_secs must be greater than 0".into(),
            ));
        }
        if self.templates.pages.trim().is_empty() {
            return Err(ConfigError::Validation("templates.pages must not be empty".into()));
        }
        Ok(())
    }

    /// Resolve a config-relative path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn template_dir(&self) -> PathBuf {
        self.resolve(&self.templates.dir)
    }

    pub fn live_reload_options(&self) -> LiveReloadOptions {
        let section = &self.live_reload;
        let watch = if section.watch.is_empty() {
            vec![self.template_dir()]
        } else {
            section.watch.iter().map(|p| self.resolve(p)).collect()
        };

        LiveReloadOptions::default()
            .endpoint(section.endpoint.clone())
            .watch(watch)
            .debounce(Duration::from_millis(section.debounce_ms))
            .ignore_extensions(section.ignore_extensions.clone())
            .keep_alive(Duration::from_secs(section.keep_alive_secs))
            .intercept_interrupt(section.intercept_interrupt)
    }
}

// ============================================================================
// global handle
// ============================================================================

static CONFIG: LazyLock<ArcSwap<Config>> = LazyLock::new(|| ArcSwap::from_pointee(Config::default()));

/// Current configuration.
#[inline]
pub fn cfg() -> Arc<Config> {
    CONFIG.load_full()
}

/// Install `config` as the current configuration.
pub fn init_config(config: Config) -> Arc<Config> {
    let config = Arc::new(config);
    CONFIG.store(Arc::clone(&config));
    config
}
