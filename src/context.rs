//! Shared rendering configuration for a family of templates.
//!
//! A [`TemplateContext`] carries the base data, the base and extra template
//! patterns, function extensions, the virtual filesystem and an optional
//! on-load hook. Deriving a context (`copy`, `with_templates`) copies the
//! pattern lists but keeps pointing at the same [`BaseCell`], so
//! `set_base_data` on any member of the family is seen by every template built
//! from it, without re-registering anything.
//!
//! Nothing in here performs I/O.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::engine::FuncMap;
use crate::fs::VirtualFs;

/// Hook run at the start of every template load.
pub type OnLoad = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

// ============================================================================
// BaseConfig
// ============================================================================

/// Where template sources are read from.
#[derive(Clone)]
pub struct BaseConfig {
    pub fs: Arc<dyn VirtualFs>,
}

impl BaseConfig {
    pub fn new(fs: impl VirtualFs + 'static) -> Self {
        Self { fs: Arc::new(fs) }
    }
}

impl fmt::Debug for BaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseConfig").finish_non_exhaustive()
    }
}

// ============================================================================
// BaseCell
// ============================================================================

/// Shared, replaceable base data.
///
/// Reads are lock-free. Updates replace the value inside the same cell, so
/// every holder observes them. Writes follow a single-writer convention:
/// concurrent `set` calls do not fail, but which value wins is unspecified.
pub struct BaseCell<T>(Arc<ArcSwap<T>>);

impl<T> BaseCell<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(ArcSwap::from_pointee(value)))
    }

    /// Current value.
    pub fn get(&self) -> Arc<T> {
        self.0.load_full()
    }

    /// Replace the value in place.
    pub fn set(&self, value: T) {
        self.0.store(Arc::new(value));
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for BaseCell<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for BaseCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BaseCell").field(&self.get()).finish()
    }
}

// ============================================================================
// ContextCore
// ============================================================================

/// The data-type independent part of a context, snapshotted by each template.
#[derive(Clone, Default)]
pub(crate) struct ContextCore {
    pub(crate) base_patterns: Vec<String>,
    pub(crate) extra_patterns: Vec<String>,
    pub(crate) funcs: FuncMap,
    pub(crate) config: Option<BaseConfig>,
    pub(crate) on_load: Option<OnLoad>,
}

impl ContextCore {
    /// Base patterns followed by extra patterns.
    pub(crate) fn patterns(&self) -> Vec<String> {
        self.base_patterns
            .iter()
            .chain(&self.extra_patterns)
            .cloned()
            .collect()
    }
}

// ============================================================================
// TemplateContext
// ============================================================================

/// Shared configuration for templates rendered with base data of type `T`.
pub struct TemplateContext<T> {
    pub(crate) core: ContextCore,
    pub(crate) base_data: BaseCell<T>,
}

impl<T> TemplateContext<T> {
    /// Create a context reading from `config`, with base data and base patterns.
    pub fn new<I, S>(config: BaseConfig, base_data: T, base_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ctx = Self::unconfigured(base_data);
        ctx.core.config = Some(config);
        ctx.set_base_templates(base_patterns);
        ctx
    }

    /// Create a context without filesystem or patterns.
    ///
    /// Templates built from it fail to load until [`set_config`](Self::set_config)
    /// is called.
    pub fn unconfigured(base_data: T) -> Self {
        Self {
            core: ContextCore::default(),
            base_data: BaseCell::new(base_data),
        }
    }

    /// Replace the base template patterns.
    pub fn set_base_templates<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.core.base_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Derive a context with `patterns` appended to the extra patterns.
    pub fn with_templates<I, S>(&self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut derived = self.copy();
        derived
            .core
            .extra_patterns
            .extend(patterns.into_iter().map(Into::into));
        derived
    }

    /// Derive an independent context sharing this context's base-data cell.
    pub fn copy(&self) -> Self {
        Self {
            core: self.core.clone(),
            base_data: self.base_data.clone(),
        }
    }

    /// Derive an independent context with its own base data.
    pub fn copy_with_base_data<V>(&self, base_data: V) -> TemplateContext<V> {
        TemplateContext {
            core: self.core.clone(),
            base_data: BaseCell::new(base_data),
        }
    }

    /// Replace the base data seen by every template of this context family.
    pub fn set_base_data(&self, value: T) {
        self.base_data.set(value);
    }

    pub fn base_data(&self) -> Arc<T> {
        self.base_data.get()
    }

    pub fn set_funcs(&mut self, funcs: FuncMap) -> &mut Self {
        self.core.funcs = funcs;
        self
    }

    /// Chaining form of [`set_funcs`](Self::set_funcs).
    pub fn funcs(mut self, funcs: FuncMap) -> Self {
        self.core.funcs = funcs;
        self
    }

    pub fn set_config(&mut self, config: BaseConfig) -> &mut Self {
        self.core.config = Some(config);
        self
    }

    pub fn set_on_load<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.core.on_load = Some(Arc::new(hook));
        self
    }

    pub fn base_patterns(&self) -> &[String] {
        &self.core.base_patterns
    }

    pub fn extra_patterns(&self) -> &[String] {
        &self.core.extra_patterns
    }
}

impl<T> fmt::Debug for TemplateContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateContext")
            .field("base_patterns", &self.core.base_patterns)
            .field("extra_patterns", &self.core.extra_patterns)
            .field("funcs", &self.core.funcs)
            .field("configured", &self.core.config.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    fn context() -> TemplateContext<u32> {
        TemplateContext::new(BaseConfig::new(MemoryFs::new()), 1, ["p1.html"])
    }

    #[test]
    fn test_copy_is_independent() {
        let base = context();
        let mut copy = base.copy();
        copy.set_base_templates(["p2.html"]);

        assert_eq!(base.base_patterns(), ["p1.html"]);
        assert_eq!(copy.base_patterns(), ["p2.html"]);
    }

    #[test]
    fn test_copy_shares_base_data() {
        let base = context();
        let copy = base.copy();
        copy.set_base_data(7);

        assert_eq!(*base.base_data(), 7);
        assert!(base.base_data.ptr_eq(&copy.base_data));
    }

    #[test]
    fn test_copy_with_base_data_detaches() {
        let base = context();
        let other = base.copy_with_base_data("title");
        base.set_base_data(9);

        assert_eq!(*other.base_data(), "title");
        assert_eq!(other.base_patterns(), ["p1.html"]);
    }

    #[test]
    fn test_with_templates_appends() {
        let base = context();
        let a = base.with_templates(["a.html"]);
        let ab = a.with_templates(["b.html"]);

        assert!(base.extra_patterns().is_empty());
        assert_eq!(a.extra_patterns(), ["a.html"]);
        assert_eq!(ab.core.patterns(), ["p1.html", "a.html", "b.html"]);

        ab.set_base_data(3);
        assert_eq!(*base.base_data(), 3);
    }

    #[test]
    fn test_unconfigured_has_no_config() {
        let ctx = TemplateContext::unconfigured(());
        assert!(ctx.core.config.is_none());
        assert!(ctx.core.patterns().is_empty());
    }
}
