//! Live reload engine.
//!
//! [`start`] turns on live mode for every registered template: renders
//! re-validate and carry the reload script, a watcher thread observes the
//! source directories, and the returned [`LiveServer`] streams `reload`
//! frames to connected browsers.
//!
//! # Example
//!
//! ```no_run
//! use loadr::livereload::{self, LiveReloadOptions};
//!
//! let server = livereload::start(
//!     LiveReloadOptions::default().watch(["templates"]),
//!     livereload::default_handler(),
//! )?;
//! assert_eq!(server.endpoint(), "/live-server");
//! # Ok::<(), loadr::WatchError>(())
//! ```

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::embed::{self, ScriptVars};
use crate::error::{TemplateError, WatchError};
use crate::registry;

mod broadcast;
mod inject;
mod message;
mod shutdown;
mod signal;
mod stream;
mod watcher;

pub use broadcast::{Broadcaster, Subscriber};
pub use inject::inject_script;
pub use message::ReloadMessage;
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
pub use stream::stream_to;
pub use watcher::{ChangeEvent, ChangeKind};

/// Default path of the streaming endpoint.
pub const DEFAULT_ENDPOINT: &str = "/live-server";

/// Called after each debounced change, and with every error the engine or a
/// live render runs into.
pub type ReloadHandler =
    Arc<dyn Fn(Result<&ChangeEvent, &(dyn Error + 'static)>) + Send + Sync>;

/// Wrap a closure into a [`ReloadHandler`].
pub fn reload_handler<F>(f: F) -> ReloadHandler
where
    F: Fn(Result<&ChangeEvent, &(dyn Error + 'static)>) + Send + Sync + 'static,
{
    Arc::new(f)
}

// ============================================================================
// Options
// ============================================================================

/// Live reload settings.
#[derive(Debug, Clone)]
pub struct LiveReloadOptions {
    /// Path the streaming endpoint is served on.
    pub endpoint: String,
    /// Roots whose directories are watched.
    pub watch_paths: Vec<PathBuf>,
    pub debounce: Duration,
    /// Extensions whose changes never trigger a reload.
    pub ignore_extensions: Vec<String>,
    /// Idle interval between keep-alive comments on each stream.
    pub keep_alive: Duration,
    /// Cancel the engine on the first Ctrl+C before the process exits.
    pub intercept_interrupt: bool,
}

impl Default for LiveReloadOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            watch_paths: vec![PathBuf::from(".")],
            debounce: Duration::from_millis(watcher::DEBOUNCE_MS),
            ignore_extensions: vec!["rs".to_string()],
            keep_alive: Duration::from_secs(15),
            intercept_interrupt: true,
        }
    }
}

impl LiveReloadOptions {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn watch<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.watch_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn ignore_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    pub fn intercept_interrupt(mut self, enabled: bool) -> Self {
        self.intercept_interrupt = enabled;
        self
    }
}

// ============================================================================
// Global state
// ============================================================================

/// Set once the engine started; never cleared.
static STARTED: Mutex<bool> = Mutex::new(false);

/// Handler used by [`notify`].
static HANDLER: RwLock<Option<ReloadHandler>> = RwLock::new(None);

/// Start the live reload engine.
///
/// Fails with [`WatchError::AlreadyRunning`] when called a second time in the
/// process; the running engine is left untouched. A start that fails for any
/// other reason can be retried.
pub fn start(options: LiveReloadOptions, handler: ReloadHandler) -> Result<LiveServer, WatchError> {
    let mut started = STARTED.lock();
    if *started {
        return Err(WatchError::AlreadyRunning);
    }

    let server = LiveServer::spawn(options, Arc::clone(&handler))?;

    *HANDLER.write() = Some(handler);
    registry::set_injected_script(embed::live_reload_script(&ScriptVars {
        endpoint: &server.endpoint,
    }));
    registry::set_live_reload(true);
    *started = true;

    crate::log!("reload"; "live reload enabled on {}", server.endpoint);
    Ok(server)
}

/// Report an error to the live reload handler (or the log when live reload
/// never started).
pub fn notify(err: &TemplateError) {
    let handler = HANDLER.read().clone();
    match handler {
        Some(handler) => handler(Err(err)),
        None => crate::log!("error"; "{}", err),
    }
}

/// The default handler: a timestamped status line per reload or error.
pub fn default_handler() -> ReloadHandler {
    reload_handler(handle_reload)
}

/// Log a reload or an error.
pub fn handle_reload(result: Result<&ChangeEvent, &(dyn Error + 'static)>) {
    match result {
        Ok(event) => crate::logger::status_success(&format!("reloaded: {}", event.describe())),
        Err(err) => crate::logger::status_error("error", &error_chain(err)),
    }
}

fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        // Some errors already print their source
        let text = e.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = e.source();
    }
    message
}

// ============================================================================
// LiveServer
// ============================================================================

/// Handle on a running live reload engine.
pub struct LiveServer {
    endpoint: String,
    keep_alive: Duration,
    broadcaster: Arc<Broadcaster>,
    trigger: Arc<ShutdownTrigger>,
    signal: ShutdownSignal,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl LiveServer {
    fn spawn(options: LiveReloadOptions, handler: ReloadHandler) -> Result<Self, WatchError> {
        let (mut os_watcher, events) = watcher::create_watcher()?;
        let watched = Arc::new(watcher::WatchedDirs::default());
        for root in &options.watch_paths {
            watched.add_tree(&mut os_watcher, root)?;
        }
        crate::debug!("watch"; "watching {} directories", watched.len());

        let broadcaster = Broadcaster::new();
        let (trigger, signal) = shutdown::channel();
        let trigger = Arc::new(trigger);

        let event_loop = watcher::EventLoop::new(
            os_watcher,
            events,
            watched,
            options.debounce,
            watcher::IgnoreRules::new(&options.ignore_extensions),
            handler,
            Arc::clone(&broadcaster),
            signal.clone(),
        );
        let handle = std::thread::Builder::new()
            .name("loadr-watch".into())
            .spawn(move || event_loop.run())
            .map_err(|e| WatchError::Io(PathBuf::from("<watch thread>"), e))?;

        if options.intercept_interrupt
            && let Err(e) = signal::intercept_interrupt(Arc::clone(&trigger))
        {
            crate::log!("error"; "failed to intercept interrupts: {}", e);
        }

        Ok(Self {
            endpoint: options.endpoint,
            keep_alive: options.keep_alive,
            broadcaster,
            trigger,
            signal,
            watcher: Mutex::new(Some(handle)),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether `url` (path plus optional query) addresses the endpoint.
    pub fn handles(&self, url: &str) -> bool {
        url.split('?').next() == Some(self.endpoint.as_str())
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    /// Push a message to every connected viewer.
    pub fn broadcast(&self, message: &ReloadMessage) {
        self.broadcaster.broadcast(message);
    }

    /// Stream to a `tiny_http` request until the client leaves or shutdown.
    /// Blocks the calling thread.
    pub fn serve(&self, request: tiny_http::Request) {
        stream::serve(request, &self.broadcaster, &self.signal, self.keep_alive);
    }

    /// Stream SSE frames (without HTTP headers) into `sink`. Blocks.
    pub fn stream_to<W: Write>(&self, sink: W) -> io::Result<()> {
        stream_to(sink, self.broadcaster.subscribe(), &self.signal, self.keep_alive)
    }

    /// Observer of this engine's cancellation.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.trigger.is_cancelled()
    }

    /// Cancel the watcher and every stream, then wait for the watcher thread.
    pub fn shutdown(&self) {
        self.trigger.cancel();
        if let Some(handle) = self.watcher.lock().take()
            && handle.join().is_err()
        {
            crate::log!("error"; "watcher thread panicked");
        }
    }
}

impl std::fmt::Debug for LiveServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveServer")
            .field("endpoint", &self.endpoint)
            .field("subscribers", &self.subscriber_count())
            .field("running", &self.is_running())
            .finish()
    }
}
