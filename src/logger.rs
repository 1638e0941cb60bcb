//! Terminal output for the library and the `loadr` binary.
//!
//! Two channels:
//! - `log!` / `debug!`: one line per message behind a colored `[module]` tag.
//!   `debug!` is silent unless verbose mode is on.
//! - [`ReloadStatus`]: a status block the live-reload handler rewrites in
//!   place, so a session of edits does not scroll the terminal. Repeats of the
//!   same message collapse into a counter.
//!
//! ```ignore
//! log!("load"; "validated {} templates", count);
//! debug!("watch"; "watching {}", dir.display());
//! ```

use std::io::{Write, stdout};
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crossterm::cursor::MoveUp;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use owo_colors::OwoColorize;
use parking_lot::Mutex;

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable `debug!` output (`-v`).
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

// ============================================================================
// Macros
// ============================================================================

/// `log!("module"; "format {}", args)`
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {
        $crate::logger::log($module, &format!($($arg)*))
    };
}

/// Like [`log!`], printed only in verbose mode.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    };
}

// ============================================================================
// Line output
// ============================================================================

/// Tag colors, by the module names the crate logs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Serve,
    Live,
    Error,
    Other,
}

impl Tag {
    fn of(module: &str) -> Self {
        match module {
            "serve" => Self::Serve,
            "watch" | "reload" => Self::Live,
            "error" => Self::Error,
            _ => Self::Other,
        }
    }

    fn paint(self, module: &str) -> String {
        let tag = format!("[{module}]");
        match self {
            Self::Serve => tag.bright_blue().bold().to_string(),
            Self::Live => tag.bright_green().bold().to_string(),
            Self::Error => tag.bright_red().bold().to_string(),
            Self::Other => tag.bright_yellow().bold().to_string(),
        }
    }
}

#[doc(hidden)]
pub fn log(module: &str, message: &str) {
    let tag = Tag::of(&module.to_ascii_lowercase()).paint(module);
    let mut out = stdout().lock();
    // A status block may still own the current line
    let _ = execute!(out, Clear(ClearType::UntilNewLine));
    let _ = writeln!(out, "{tag} {message}");
    let _ = out.flush();
}

// ============================================================================
// ReloadStatus
// ============================================================================

/// In-place status block for live reload.
#[derive(Debug, Default)]
pub struct ReloadStatus {
    /// Height of the block currently on screen.
    height: usize,
    last: Option<(bool, String)>,
    repeats: usize,
}

static STATUS: LazyLock<Mutex<ReloadStatus>> = LazyLock::new(|| Mutex::new(ReloadStatus::default()));

impl ReloadStatus {
    pub fn success(&mut self, message: &str) {
        self.show(true, message.to_string());
    }

    /// Red block: `summary` on the first line, `detail` below when present.
    pub fn error(&mut self, summary: &str, detail: &str) {
        let message = match detail {
            "" => summary.to_string(),
            detail => format!("{summary}\n{detail}"),
        };
        self.show(false, message);
    }

    fn show(&mut self, ok: bool, message: String) {
        let text = self.record(ok, message);
        let symbol = if ok {
            "✓".green().to_string()
        } else {
            "✗".red().to_string()
        };

        let mut out = stdout().lock();
        if self.height > 0 {
            let up = u16::try_from(self.height).unwrap_or(u16::MAX);
            let _ = execute!(out, MoveUp(up), Clear(ClearType::FromCursorDown));
        }
        let stamp = format!("[{}]", clock(unix_secs())).dimmed().to_string();
        let _ = writeln!(out, "{stamp} {symbol} {text}");
        let _ = out.flush();

        self.height = text.lines().count().max(1);
    }

    /// Track repeats and return the text to print.
    fn record(&mut self, ok: bool, message: String) -> String {
        let entry = (ok, message);
        if self.last.as_ref() == Some(&entry) {
            self.repeats += 1;
        } else {
            self.repeats = 1;
            self.last = Some(entry);
        }
        let message = self.last.as_ref().map(|(_, m)| m.as_str()).unwrap_or_default();
        if self.repeats > 1 {
            format!("{message} (x{})", self.repeats)
        } else {
            message.to_string()
        }
    }
}

pub fn status_success(message: &str) {
    STATUS.lock().success(message);
}

pub fn status_error(summary: &str, detail: &str) {
    STATUS.lock().error(summary, detail);
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// `HH:MM:SS` (UTC) of a unix timestamp.
fn clock(secs: u64) -> String {
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, day / 60 % 60, day % 60)
}
