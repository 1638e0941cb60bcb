//! Template engine capability backed by `tera`.
//!
//! The rest of the crate only relies on two operations:
//! - [`Engine::parse`]: read every file matched by the patterns into one namespace
//! - [`Engine::execute`]: render a named template against serializable data into a sink
//!
//! Templates are registered under the file-name component of their path, so
//! `layouts/base.html` is addressed (and extended) as `base.html`.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tera::{Context, Filter, Function, Tera, Value};
use thiserror::Error;

use crate::fs::{self, VirtualFs};

/// Context key that holds data which does not serialize to a map.
pub const SCALAR_KEY: &str = "Data";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Execute(String),
}

// ============================================================================
// FuncMap
// ============================================================================

/// Filters and functions made available to every template of a context.
#[derive(Clone, Default)]
pub struct FuncMap {
    filters: FxHashMap<String, Arc<dyn Filter>>,
    functions: FxHashMap<String, Arc<dyn Function>>,
}

impl FuncMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, used as `{{ value | name }}`.
    pub fn filter(mut self, name: impl Into<String>, filter: impl Filter + 'static) -> Self {
        self.filters.insert(name.into(), Arc::new(filter));
        self
    }

    /// Add a function, used as `{{ name(arg=value) }}`.
    pub fn function(mut self, name: impl Into<String>, function: impl Function + 'static) -> Self {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.functions.is_empty()
    }

    fn register(&self, tera: &mut Tera) {
        for (name, filter) in &self.filters {
            tera.register_filter(name, SharedFilter(Arc::clone(filter)));
        }
        for (name, function) in &self.functions {
            tera.register_function(name, SharedFunction(Arc::clone(function)));
        }
    }
}

impl fmt::Debug for FuncMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut filters: Vec<_> = self.filters.keys().collect();
        let mut functions: Vec<_> = self.functions.keys().collect();
        filters.sort();
        functions.sort();
        f.debug_struct("FuncMap")
            .field("filters", &filters)
            .field("functions", &functions)
            .finish()
    }
}

struct SharedFilter(Arc<dyn Filter>);

impl Filter for SharedFilter {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.0.filter(value, args)
    }

    fn is_safe(&self) -> bool {
        self.0.is_safe()
    }
}

struct SharedFunction(Arc<dyn Function>);

impl Function for SharedFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.0.call(args)
    }

    fn is_safe(&self) -> bool {
        self.0.is_safe()
    }
}

// ============================================================================
// Engine
// ============================================================================

/// A parsed template namespace.
pub struct Engine {
    tera: Tera,
}

impl Engine {
    /// Parse every file matched by `patterns` into one namespace.
    pub fn parse(
        fs: &dyn VirtualFs,
        patterns: &[String],
        funcs: &FuncMap,
    ) -> Result<Self, EngineError> {
        let mut sources = Vec::new();
        for pattern in patterns {
            let paths = fs::glob(fs, pattern).map_err(|e| EngineError::Parse(e.to_string()))?;
            for path in paths {
                let bytes = fs
                    .read(&path)
                    .map_err(|e| EngineError::Parse(format!("open {path}: {e}")))?;
                let content = String::from_utf8(bytes)
                    .map_err(|_| EngineError::Parse(format!("{path}: not valid UTF-8")))?;
                sources.push((fs::base_name(&path).to_string(), content));
            }
        }

        let mut tera = Tera::default();
        funcs.register(&mut tera);
        tera.add_raw_templates(sources)
            .map_err(|e| EngineError::Parse(error_chain(&e)))?;

        Ok(Self { tera })
    }

    /// Render template `name` with `data` into `sink`.
    ///
    /// Data serializing to a map becomes the template context; anything else
    /// is bound to [`SCALAR_KEY`].
    pub fn execute<D, W>(&self, name: &str, data: &D, sink: W) -> Result<(), EngineError>
    where
        D: Serialize + ?Sized,
        W: Write,
    {
        let context = to_context(data)?;
        self.tera
            .render_to(name, &context, sink)
            .map_err(|e| EngineError::Execute(error_chain(&e)))
    }

    /// Names of all parsed templates, sorted.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tera.get_template_names().collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("templates", &self.template_names())
            .finish()
    }
}

fn to_context<D: Serialize + ?Sized>(data: &D) -> Result<Context, EngineError> {
    let value = serde_json::to_value(data).map_err(|e| EngineError::Execute(e.to_string()))?;
    match value {
        Value::Object(_) => {
            Context::from_value(value).map_err(|e| EngineError::Execute(error_chain(&e)))
        }
        scalar => {
            let mut context = Context::new();
            context.insert(SCALAR_KEY, &scalar);
            Ok(context)
        }
    }
}

/// Flatten an error and its sources into one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        message.push_str(": ");
        message.push_str(&e.to_string());
        source = e.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;
    use serde::Serialize;

    fn to_upper(value: &Value, _: &HashMap<String, Value>) -> tera::Result<Value> {
        let s = tera::try_get_value!("to_upper", "value", String, value);
        Ok(Value::String(s.to_uppercase()))
    }

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn render<D: Serialize>(engine: &Engine, name: &str, data: &D) -> String {
        let mut out = Vec::new();
        engine.execute(name, data, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_registers_base_names() {
        let fs = MemoryFs::new()
            .with_file("folder/index.html", "{% include \"nav.html\" %}")
            .with_file("parts/nav.html", "nav");
        let engine = Engine::parse(&fs, &patterns(&["folder/index.html", "parts/*.html"]), &FuncMap::new())
            .unwrap();
        assert_eq!(engine.template_names(), vec!["index.html", "nav.html"]);
        assert_eq!(render(&engine, "index.html", &()), "nav");
    }

    #[test]
    fn test_parse_missing_file() {
        let fs = MemoryFs::new();
        let err = Engine::parse(&fs, &patterns(&["missing.html"]), &FuncMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
        assert!(err.to_string().contains("missing.html"));
    }

    #[test]
    fn test_parse_syntax_error() {
        let fs = MemoryFs::new().with_file("bad.html", "{% if %}");
        let err = Engine::parse(&fs, &patterns(&["bad.html"]), &FuncMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }

    #[test]
    fn test_execute_scalar_data() {
        let fs = MemoryFs::new().with_file("n.html", "{{ Data }}");
        let engine = Engine::parse(&fs, &patterns(&["n.html"]), &FuncMap::new()).unwrap();
        assert_eq!(render(&engine, "n.html", &42), "42");
    }

    #[test]
    fn test_execute_unknown_template() {
        let fs = MemoryFs::new().with_file("a.html", "a");
        let engine = Engine::parse(&fs, &patterns(&["a.html"]), &FuncMap::new()).unwrap();
        let err = engine.execute("b.html", &(), Vec::new()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_execute_missing_variable() {
        let fs = MemoryFs::new().with_file("a.html", "{{ Title }}");
        let engine = Engine::parse(&fs, &patterns(&["a.html"]), &FuncMap::new()).unwrap();
        let err = engine.execute("a.html", &serde_json::json!({}), Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::Execute(_)));
        assert!(err.to_string().contains("Title"));
    }

    #[test]
    fn test_func_map_filter() {
        let fs = MemoryFs::new().with_file("u.txt", "{{ Name | to_upper }}");
        let funcs = FuncMap::new().filter("to_upper", to_upper);
        let engine = Engine::parse(&fs, &patterns(&["u.txt"]), &funcs).unwrap();
        assert_eq!(render(&engine, "u.txt", &serde_json::json!({"Name": "test"})), "TEST");
        assert!(format!("{funcs:?}").contains("to_upper"));
    }
}
