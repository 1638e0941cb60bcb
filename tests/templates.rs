//! Startup validation through the global registry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use loadr::error::PREFIX_HINT;
use loadr::{
    BaseConfig, DirFs, FuncMap, LoadError, MemoryFs, SubTemplate, Template, TemplateContext,
    registry,
};
use serde::Serialize;
use tera::Value;

/// Tests share the process-wide registry.
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    registry::reset();
    guard
}

#[derive(Debug, Clone, Serialize)]
struct Site {
    #[serde(rename = "Title")]
    title: String,
}

fn site(title: &str) -> Site {
    Site {
        title: title.to_string(),
    }
}

fn fixture() -> MemoryFs {
    MemoryFs::new()
        .with_file(
            "layout.html",
            "<title>{{ Base.Title }}</title>{% block main %}{% endblock %}",
        )
        .with_file(
            "alt.html",
            "<h1>{{ Base.Title }}</h1>{% block main %}{% endblock %}",
        )
        .with_file(
            "index.html",
            "{% extends \"layout.html\" %}{% block main %}{% include \"nav.html\" %}{% endblock %}",
        )
        .with_file("partials/nav.html", "<nav>{{ Base.Title }}</nav>")
        .with_file("missing_prefix.html", "<p>{{ Title }}</p>")
        .with_file("upper.html", "{{ Data | shout }}")
}

fn render<T, U>(template: &Template<T, U>, data: &U) -> String
where
    T: Serialize + Send + Sync + 'static,
    U: Serialize + Send + Sync + 'static,
{
    let mut out = Vec::new();
    template.render(&mut out, data);
    String::from_utf8(out).unwrap()
}

#[test]
fn test_load_all_is_idempotent() {
    let _guard = serial();
    let ctx = TemplateContext::new(BaseConfig::new(fixture()), site("Home"), ["layout.html"]);
    let layout = Template::new(&ctx, ());
    let nested = Template::with_pattern(
        &ctx.with_templates(["index.html", "partials/*.html"]),
        "index.html",
        (),
    );

    registry::load_all().unwrap();
    let first = (render(&layout, &()), render(&nested, &()));
    registry::load_all().unwrap();
    let second = (render(&layout, &()), render(&nested, &()));

    assert_eq!(first, second);
    assert_eq!(second.1, "<title>Home</title><nav>Home</nav>");
}

#[test]
fn test_base_data_updates_reach_every_derived_template() {
    let _guard = serial();
    let root = TemplateContext::new(BaseConfig::new(fixture()), site("v0"), ["layout.html"]);
    let copy = root.copy();
    let derived = root.with_templates(["partials/nav.html"]);
    let nested = derived.with_templates(["index.html"]);

    let templates = [
        Template::new(&root, ()),
        Template::new(&copy, ()),
        Template::new(&derived, ()),
        Template::with_pattern(&nested, "index.html", ()),
    ];
    registry::load_all().unwrap();

    let stores = [&root, &copy, &derived, &nested];
    for i in 0..4 {
        let title = format!("v{}", i + 1);
        stores[i].set_base_data(site(&title));
        for template in &templates {
            assert!(
                render(template, &()).contains(&title),
                "update through store {i} not visible"
            );
        }
    }
}

#[test]
fn test_copy_with_base_data_is_detached() {
    let _guard = serial();
    let root = TemplateContext::new(BaseConfig::new(fixture()), site("shared"), ["layout.html"]);
    let own = root.copy_with_base_data(site("own"));
    let shared = Template::new(&root, ());
    let detached = Template::new(&own, ());
    registry::load_all().unwrap();

    root.set_base_data(site("changed"));
    assert_eq!(render(&shared, &()), "<title>changed</title>");
    assert_eq!(render(&detached, &()), "<title>own</title>");
}

#[test]
fn test_derivation_is_independent() {
    let _guard = serial();
    let root = TemplateContext::new(BaseConfig::new(fixture()), site("Home"), ["layout.html"]);
    let mut alt = root.copy();
    alt.set_base_templates(["alt.html"]);

    let original = Template::new(&root, ());
    let changed = Template::new(&alt, ());
    registry::load_all().unwrap();

    assert_eq!(render(&original, &()), "<title>Home</title>");
    assert_eq!(render(&changed, &()), "<h1>Home</h1>");
    assert_eq!(root.base_patterns(), ["layout.html"]);
}

#[test]
fn test_copy_no_longer_sees_replaced_base() {
    let _guard = serial();
    let root = TemplateContext::new(BaseConfig::new(fixture()), site("Home"), ["layout.html"]);
    let mut alt = root.copy();
    alt.set_base_templates(["alt.html"]);

    let original = Template::with_pattern(&root, "layout.html", ());
    let stale = Template::with_pattern(&alt, "layout.html", ());

    let err = registry::load_all().unwrap_err();
    assert!(err.kind().is_execute() || err.kind().is_parse());
    assert!(err.to_string().contains("not found"), "{err}");
    assert_eq!(err.base_patterns, vec!["alt.html"]);
    assert!(original.is_loaded());
    assert!(!stale.is_loaded());
}

#[test]
fn test_missing_prefix_fails_fast() {
    let _guard = serial();
    let ctx = TemplateContext::new(BaseConfig::new(fixture()), site("Home"), ["layout.html"]);
    let before = Template::new(&ctx, ());
    let broken = Template::with_pattern(&ctx.with_templates(["missing_prefix.html"]), "missing_prefix.html", ());
    let after = Template::new(&ctx.copy(), ());

    let err = registry::load_all().unwrap_err();

    assert!(matches!(err.kind(), LoadError::Execute { hint: Some(h), .. } if *h == PREFIX_HINT));
    assert_eq!(err.pattern, "missing_prefix.html");
    assert_eq!(err.extra_patterns, vec!["missing_prefix.html"]);
    assert!(before.is_loaded());
    assert!(!broken.is_loaded());
    assert!(!after.is_loaded());

    // Same failure on every run
    assert_eq!(registry::load_all().unwrap_err().to_string(), err.to_string());
}

#[test]
fn test_dropped_templates_are_not_loaded() {
    let _guard = serial();
    let ctx = TemplateContext::new(BaseConfig::new(fixture()), site("Home"), ["layout.html"]);
    let kept = Template::new(&ctx, ());
    {
        let _broken = SubTemplate::new(&ctx.with_templates(["missing_prefix.html"]), "missing_prefix.html", ());
    }

    registry::load_all().unwrap();
    assert!(kept.is_loaded());
}

#[test]
fn test_func_map_is_available_to_templates() {
    let _guard = serial();
    let shout = |value: &Value, _: &HashMap<String, Value>| -> tera::Result<Value> {
        let s = tera::try_get_value!("shout", "value", String, value);
        Ok(Value::String(format!("{}!", s.to_uppercase())))
    };
    let ctx = TemplateContext::new(BaseConfig::new(fixture()), (), Vec::<String>::new())
        .with_templates(["upper.html"])
        .funcs(FuncMap::new().filter("shout", shout));
    let upper = SubTemplate::new(&ctx, "upper.html", "sample".to_string());

    registry::load_all().unwrap();
    let mut out = Vec::new();
    upper.render(&mut out, &"hello".to_string());
    assert_eq!(out, b"HELLO!");
}

#[test]
fn test_templates_from_disk() {
    let _guard = serial();
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("pages")).unwrap();
    std::fs::write(dir.path().join("base.html"), "[{% block main %}{% endblock %}]").unwrap();
    std::fs::write(
        dir.path().join("pages/home.html"),
        "{% extends \"base.html\" %}{% block main %}{{ Data.Name }}{% endblock %}",
    )
    .unwrap();

    #[derive(Serialize)]
    struct Page {
        #[serde(rename = "Name")]
        name: &'static str,
    }

    let ctx = TemplateContext::new(BaseConfig::new(DirFs::new(dir.path())), (), ["base.html"]);
    let home = Template::with_pattern(&ctx.with_templates(["pages/*.html"]), "home.html", Page { name: "sample" });

    registry::load_all().unwrap();
    assert_eq!(render(&home, &Page { name: "disk" }), "[disk]");
}
