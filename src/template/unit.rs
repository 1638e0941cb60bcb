//! Template units and their load / render paths.

use std::fmt;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::Serialize;

use super::sink::GuardedSink;
use crate::context::{BaseCell, ContextCore, TemplateContext};
use crate::engine::{Engine, EngineError};
use crate::error::{LoadError, PREFIX_HINT, TemplateError};
use crate::fs;
use crate::livereload;
use crate::registry::{self, Loadable, UnitId};

/// Data shape handed to base-wrapped templates.
#[derive(Serialize)]
struct Wrapped<'a, T, U> {
    #[serde(rename = "Base")]
    base: &'a T,
    #[serde(rename = "Data")]
    data: &'a U,
}

// ============================================================================
// Unit
// ============================================================================

/// State shared by both template variants.
struct Unit<T, U> {
    core: ContextCore,
    base_data: BaseCell<T>,
    /// Explicit lookup pattern; base-wrapped units may leave it empty.
    pattern: Option<String>,
    sample: U,
    wrapped: bool,
    engine: RwLock<Option<Arc<Engine>>>,
}

impl<T, U> Unit<T, U>
where
    T: Serialize + Send + Sync + 'static,
    U: Serialize + Send + Sync + 'static,
{
    fn new(ctx: &TemplateContext<T>, pattern: Option<String>, sample: U, wrapped: bool) -> Self {
        Self {
            core: ctx.core.clone(),
            base_data: ctx.base_data.clone(),
            pattern,
            sample,
            wrapped,
            engine: RwLock::new(None),
        }
    }

    /// Name the engine executes: the explicit pattern, else the file name of
    /// the first base pattern.
    fn lookup(&self) -> Option<&str> {
        self.pattern.as_deref().or_else(|| {
            self.core
                .base_patterns
                .first()
                .map(|p| fs::base_name(p))
        })
    }

    fn error(&self, source: LoadError) -> TemplateError {
        TemplateError {
            base_patterns: self.core.base_patterns.clone(),
            extra_patterns: self.core.extra_patterns.clone(),
            pattern: self.lookup().unwrap_or_default().to_string(),
            source,
        }
    }

    /// Parse every pattern and trial-render `data` into a discard sink.
    fn validate(&self, data: &U) -> Result<Arc<Engine>, TemplateError> {
        if let Some(hook) = &self.core.on_load {
            hook().map_err(|e| self.error(LoadError::Hook(e)))?;
        }

        let config = self
            .core
            .config
            .as_ref()
            .ok_or_else(|| self.error(LoadError::ConfigMissing))?;

        let patterns = self.core.patterns();
        if patterns.is_empty() {
            return Err(self.error(LoadError::NoPatternsProvided));
        }
        if self.wrapped && self.core.base_patterns.is_empty() {
            return Err(self.error(LoadError::NoBasePatternProvided));
        }

        let engine = Engine::parse(config.fs.as_ref(), &patterns, &self.core.funcs)
            .map_err(|e| self.error(self.classify(e)))?;
        self.execute(&engine, data, io::sink())
            .map_err(|e| self.error(self.classify(e)))?;

        Ok(Arc::new(engine))
    }

    fn classify(&self, err: EngineError) -> LoadError {
        match err {
            EngineError::Parse(message) => LoadError::Parse(message),
            EngineError::Execute(message) => LoadError::Execute {
                message,
                hint: self.wrapped.then_some(PREFIX_HINT),
            },
        }
    }

    fn execute<W: Write>(&self, engine: &Engine, data: &U, sink: W) -> Result<(), EngineError> {
        let name = self.lookup().unwrap_or_default();
        if self.wrapped {
            let base = self.base_data.get();
            engine.execute(
                name,
                &Wrapped {
                    base: base.as_ref(),
                    data,
                },
                sink,
            )
        } else {
            engine.execute(name, data, sink)
        }
    }

    fn load(&self) -> Result<(), TemplateError> {
        let engine = self.validate(&self.sample)?;
        *self.engine.write() = Some(engine);
        Ok(())
    }

    fn render<W: Write>(&self, sink: W, data: &U) {
        let mut sink = GuardedSink::new(sink);
        if registry::is_live_reload() {
            self.render_live(&mut sink, data);
        } else {
            self.render_cached(&mut sink, data);
        }
    }

    fn render_cached<W: Write>(&self, sink: &mut GuardedSink<W>, data: &U) {
        let engine = self.engine.read().clone();
        let Some(engine) = engine else {
            fail(self.error(LoadError::NotLoaded));
        };
        if let Err(e) = self.execute(&engine, data, &mut *sink) {
            let source = match sink.violation() {
                Some(violation) => LoadError::Protocol(violation),
                None => self.classify(e),
            };
            fail(self.error(source));
        }
    }

    /// Re-validate with the request data, then render with the reload script.
    fn render_live<W: Write>(&self, sink: &mut GuardedSink<W>, data: &U) {
        let script = registry::injected_script();

        let rendered = self.validate(data).and_then(|engine| {
            *self.engine.write() = Some(Arc::clone(&engine));
            let mut buf = Vec::new();
            self.execute(&engine, data, &mut buf)
                .map_err(|e| self.error(self.classify(e)))?;
            Ok(buf)
        });

        let body = match rendered {
            Ok(buf) => livereload::inject_script(&buf, &script),
            Err(err) => {
                livereload::notify(&err);
                script.to_vec()
            }
        };

        if sink.write_all(&body).is_err()
            && let Some(violation) = sink.violation()
        {
            fail(self.error(LoadError::Protocol(violation)));
        }
    }
}

impl<T, U> Loadable for Unit<T, U>
where
    T: Serialize + Send + Sync + 'static,
    U: Serialize + Send + Sync + 'static,
{
    fn load(&self) -> Result<(), TemplateError> {
        Unit::load(self)
    }
}

/// Abort the render: a loaded template must never fail at request time.
fn fail(err: TemplateError) -> ! {
    crate::log!("error"; "{}", err);
    std::panic::panic_any(err)
}

fn register<T, U>(unit: &Arc<Unit<T, U>>) -> UnitId
where
    T: Serialize + Send + Sync + 'static,
    U: Serialize + Send + Sync + 'static,
{
    let weak: Weak<dyn Loadable> = Arc::downgrade(unit) as Weak<dyn Loadable>;
    registry::add(weak)
}

// ============================================================================
// Template
// ============================================================================

/// A template rendered with `{Base, Data}`: the context's base data next to
/// the per-call data of type `U`.
pub struct Template<T, U = super::NoData> {
    unit: Arc<Unit<T, U>>,
    id: UnitId,
}

impl<T, U> Template<T, U>
where
    T: Serialize + Send + Sync + 'static,
    U: Serialize + Send + Sync + 'static,
{
    /// Register a template executing the first base pattern's file.
    ///
    /// `sample` is the data used to validate the template on load.
    pub fn new(ctx: &TemplateContext<T>, sample: U) -> Self {
        Self::build(ctx, None, sample)
    }

    /// Register a template executing the template named `pattern`.
    pub fn with_pattern(ctx: &TemplateContext<T>, pattern: impl Into<String>, sample: U) -> Self {
        Self::build(ctx, Some(pattern.into()), sample)
    }

    fn build(ctx: &TemplateContext<T>, pattern: Option<String>, sample: U) -> Self {
        let unit = Arc::new(Unit::new(ctx, pattern, sample, true));
        let id = register(&unit);
        Self { unit, id }
    }

    /// Parse and validate against the sample data.
    pub fn load(&self) -> Result<(), TemplateError> {
        self.unit.load()
    }

    /// Render into `sink`.
    ///
    /// # Panics
    ///
    /// Panics with the [`TemplateError`] as payload if the template was never
    /// loaded, fails to execute, or the sink reports a protocol violation.
    /// Transport errors are discarded.
    pub fn render<W: Write>(&self, sink: W, data: &U) {
        self.unit.render(sink, data);
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn is_loaded(&self) -> bool {
        self.unit.engine.read().is_some()
    }
}

impl<T, U> Clone for Template<T, U> {
    fn clone(&self) -> Self {
        Self {
            unit: Arc::clone(&self.unit),
            id: self.id,
        }
    }
}

impl<T, U> fmt::Debug for Template<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("id", &self.id)
            .field("pattern", &self.unit.pattern)
            .field("base_patterns", &self.unit.core.base_patterns)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SubTemplate
// ============================================================================

/// A template rendered with its data alone, without the base wrapper.
pub struct SubTemplate<T, U = super::NoData> {
    unit: Arc<Unit<T, U>>,
    id: UnitId,
    _base: PhantomData<fn() -> T>,
}

impl<T, U> SubTemplate<T, U>
where
    T: Serialize + Send + Sync + 'static,
    U: Serialize + Send + Sync + 'static,
{
    /// Register a template executing the template named `pattern`.
    pub fn new(ctx: &TemplateContext<T>, pattern: impl Into<String>, sample: U) -> Self {
        let unit = Arc::new(Unit::new(ctx, Some(pattern.into()), sample, false));
        let id = register(&unit);
        Self {
            unit,
            id,
            _base: PhantomData,
        }
    }

    pub fn load(&self) -> Result<(), TemplateError> {
        self.unit.load()
    }

    /// Render into `sink`. Panics like [`Template::render`].
    pub fn render<W: Write>(&self, sink: W, data: &U) {
        self.unit.render(sink, data);
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn is_loaded(&self) -> bool {
        self.unit.engine.read().is_some()
    }
}

impl<T, U> Clone for SubTemplate<T, U> {
    fn clone(&self) -> Self {
        Self {
            unit: Arc::clone(&self.unit),
            id: self.id,
            _base: PhantomData,
        }
    }
}

impl<T, U> fmt::Debug for SubTemplate<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubTemplate")
            .field("id", &self.id)
            .field("pattern", &self.unit.pattern)
            .finish_non_exhaustive()
    }
}
