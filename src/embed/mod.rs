//! Embedded static resources.
//!
//! - `livereload.html` - reload script injected into rendered pages

/// Placeholder replaced by the endpoint path, as a JS string literal.
const ENDPOINT_PLACEHOLDER: &str = "__LOADR_ENDPOINT__";

const LIVE_RELOAD_HTML: &str = include_str!("livereload.html");

/// Variables of the reload script.
#[derive(Debug, Clone, Copy)]
pub struct ScriptVars<'a> {
    pub endpoint: &'a str,
}

impl ScriptVars<'_> {
    fn apply(&self, content: &str) -> String {
        content.replace(ENDPOINT_PLACEHOLDER, &js_string(self.endpoint))
    }
}

/// Render the reload script for the stream at `vars.endpoint`.
pub fn live_reload_script(vars: &ScriptVars<'_>) -> String {
    vars.apply(LIVE_RELOAD_HTML)
}

/// JSON string literal that is also safe inside a `<script>` element.
fn js_string(value: &str) -> String {
    serde_json::Value::from(value).to_string().replace("</", "<\\/")
}
