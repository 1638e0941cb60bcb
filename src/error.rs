//! Error types for template loading, rendering and live reload.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// LoadError
// ============================================================================

/// Hint attached to execute failures of base-wrapped templates.
pub const PREFIX_HINT: &str = "has the Base. or Data. prefix been included for this template?";

/// Why a template unit failed to load (or, at render time, broke its contract).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no config provided")]
    ConfigMissing,

    #[error("no base templates nor patterns have been provided")]
    NoPatternsProvided,

    #[error("no base template has been provided, but a base-wrapped template was requested")]
    NoBasePatternProvided,

    #[error("template parse error: {0}")]
    Parse(String),

    #[error("template execute error: {message}{}", hint_suffix(.hint))]
    Execute {
        message: String,
        hint: Option<&'static str>,
    },

    #[error("on-load hook failed")]
    Hook(#[source] anyhow::Error),

    #[error("template rendered before it was loaded")]
    NotLoaded,

    #[error("template execute error: {0}")]
    Protocol(#[from] crate::template::ProtocolViolation),
}

fn hint_suffix(hint: &Option<&'static str>) -> String {
    hint.map(|h| format!(": {h}")).unwrap_or_default()
}

impl LoadError {
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    pub fn is_execute(&self) -> bool {
        matches!(self, Self::Execute { .. })
    }
}

// ============================================================================
// TemplateError
// ============================================================================

/// A [`LoadError`] together with the patterns of the unit that produced it.
#[derive(Debug, Error)]
pub struct TemplateError {
    pub base_patterns: Vec<String>,
    pub extra_patterns: Vec<String>,
    pub pattern: String,
    #[source]
    pub source: LoadError,
}

impl TemplateError {
    pub fn kind(&self) -> &LoadError {
        &self.source
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "base templates {:?} with templates {:?} and template pattern {:?} failed: {}",
            self.base_patterns,
            self.extra_patterns.join(", "),
            self.pattern,
            self.source
        )
    }
}

// ============================================================================
// WatchError
// ============================================================================

/// Errors raised by the live-reload engine.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("live reload is already running")]
    AlreadyRunning,

    #[error("watch error")]
    Notify(#[from] notify::Error),

    #[error("IO error when watching `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("failed to walk `{0}`: {1}")]
    Walk(PathBuf, String),
}

// ============================================================================
// ConfigError
// ============================================================================

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_error_hint() {
        let plain = LoadError::Execute {
            message: "Variable `Title` not found".into(),
            hint: None,
        };
        assert_eq!(
            plain.to_string(),
            "template execute error: Variable `Title` not found"
        );

        let hinted = LoadError::Execute {
            message: "Variable `Title` not found".into(),
            hint: Some(PREFIX_HINT),
        };
        assert!(hinted.to_string().ends_with(PREFIX_HINT));
        assert!(hinted.is_execute());
        assert!(!hinted.is_parse());
    }

    #[test]
    fn test_template_error_display() {
        let err = TemplateError {
            base_patterns: vec!["layout.html".into()],
            extra_patterns: vec!["a.html".into(), "b.html".into()],
            pattern: "layout.html".into(),
            source: LoadError::NoPatternsProvided,
        };
        let display = err.to_string();
        assert!(display.contains("[\"layout.html\"]"));
        assert!(display.contains("\"a.html, b.html\""));
        assert!(display.ends_with("no base templates nor patterns have been provided"));
    }

    #[test]
    fn test_config_error_display() {
        let io_err = ConfigError::Io(
            PathBuf::from("loadr.toml"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        assert!(io_err.to_string().contains("loadr.toml"));

        let validation = ConfigError::Validation("port must not be 0".into());
        assert!(validation.to_string().contains("port must not be 0"));
    }
}
