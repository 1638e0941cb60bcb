//! Page discovery: one route and one template per page file.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use loadr::config::Config;
use loadr::fs::{self, DirFs};
use loadr::{BaseConfig, Template, TemplateContext};
use rustc_hash::FxHashMap;
use serde::Serialize;

/// Base data of every page: the `[site]` table.
pub type SiteData = toml::Table;

/// Per-request data, rendered as `Data`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestData {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Method")]
    pub method: String,
    #[serde(rename = "Query")]
    pub query: BTreeMap<String, String>,
}

impl RequestData {
    pub fn from_url(method: &str, url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (k.to_string(), v.to_string())
            })
            .collect();
        Self {
            path: path.to_string(),
            method: method.to_string(),
            query,
        }
    }

    /// Data used to validate pages at startup.
    pub fn sample() -> Self {
        Self::from_url("GET", "/")
    }
}

pub type Page = Template<SiteData, RequestData>;

/// Routes to page templates.
pub struct Pages {
    routes: FxHashMap<String, Page>,
    context: TemplateContext<SiteData>,
}

impl Pages {
    /// Register a template for every file matched by `[templates] pages`.
    pub fn discover(config: &Config) -> Result<Self> {
        let dir = config.template_dir();
        let dir_fs = DirFs::new(&dir);
        let page_files = fs::glob(&dir_fs, &config.templates.pages)
            .with_context(|| format!("no pages found in {}", dir.display()))?;

        let context = TemplateContext::new(
            BaseConfig::new(dir_fs),
            config.site.clone(),
            config.templates.base.iter().cloned(),
        )
        .with_templates(config.templates.partials.iter().cloned());

        let mut routes = FxHashMap::default();
        for file in page_files {
            let page = Template::with_pattern(
                &context.with_templates([file.clone()]),
                fs::base_name(&file),
                RequestData::sample(),
            );
            loadr::debug!("serve"; "{} -> {}", route_for(&file), file);
            routes.insert(route_for(&file), page);
        }

        Ok(Self { routes, context })
    }

    /// Page for a request path.
    pub fn get(&self, path: &str) -> Option<&Page> {
        let path = path.trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path };
        self.routes
            .get(path)
            .or_else(|| self.routes.get(path.trim_end_matches(".html")))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn routes(&self) -> Vec<&str> {
        let mut routes: Vec<_> = self.routes.keys().map(String::as_str).collect();
        routes.sort_unstable();
        routes
    }

    /// Replace the `[site]` data seen by every page.
    pub fn set_site(&self, site: SiteData) {
        self.context.set_base_data(site);
    }
}

/// `pages/index.html` -> `/`, `pages/about.html` -> `/about`.
fn route_for(file: &str) -> String {
    let name = fs::base_name(file);
    let stem = name.split('.').next().unwrap_or(name);
    if stem == "index" {
        "/".to_string()
    } else {
        format!("/{stem}")
    }
}
