//! loadr - typed templates validated at startup, with optional live reload.
//!
//! # Module Structure
//!
//! ```text
//! context     # TemplateContext: base data, patterns, funcs, filesystem
//! template    # Template / SubTemplate units, load + render paths
//! registry    # Weak registry of units, load_all, live-reload flag
//! engine      # tera-backed parse / execute
//! fs          # VirtualFs, DirFs, MemoryFs, glob expansion
//! livereload  # Watcher, broadcaster, SSE endpoint, script injection
//! config      # loadr.toml for the `loadr serve` binary
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use loadr::{BaseConfig, DirFs, Template, TemplateContext, registry};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Site {
//!     #[serde(rename = "Title")]
//!     title: String,
//! }
//!
//! let ctx = TemplateContext::new(
//!     BaseConfig::new(DirFs::new("templates")),
//!     Site { title: "Home".into() },
//!     ["layout.html"],
//! );
//! let page: Template<Site> = Template::new(&ctx, ());
//!
//! // Once, after every template is declared
//! registry::load_all()?;
//!
//! let mut out = Vec::new();
//! page.render(&mut out, &());
//! # Ok::<(), loadr::TemplateError>(())
//! ```

pub mod config;
pub mod context;
pub mod embed;
pub mod engine;
pub mod error;
pub mod fs;
pub mod livereload;
pub mod logger;
pub mod registry;
pub mod template;

pub use context::{BaseConfig, BaseCell, OnLoad, TemplateContext};
pub use engine::FuncMap;
pub use error::{ConfigError, LoadError, TemplateError, WatchError};
pub use fs::{DirFs, MemoryFs, VirtualFs};
pub use registry::{Loadable, UnitId};
pub use template::{NoData, ProtocolViolation, SubTemplate, Template};
