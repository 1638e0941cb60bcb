//! Template server with optional live reload.
//!
//! Every page template is loaded and validated before the listener binds, so
//! a broken template stops startup instead of failing a request later.

mod lifecycle;
mod pages;
mod response;

use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use loadr::config::{Config, cfg};
use loadr::livereload::{self, ChangeEvent, LiveServer, ReloadHandler};
use loadr::{TemplateError, debug, log, registry};
use tiny_http::{Method, Request, Server};

use pages::{Page, Pages, RequestData};

/// Worker threads rendering pages. Live-reload streams get their own threads.
const WORKERS: usize = 4;

/// Discover and validate every page.
pub fn load_pages(config: &Config) -> Result<Pages> {
    let pages = Pages::discover(config)?;
    registry::load_all().context("template validation failed")?;
    log!("load"; "validated {} page{}", pages.len(), if pages.len() == 1 { "" } else { "s" });
    Ok(pages)
}

/// Run `loadr serve` until the process is interrupted.
pub fn serve(config_path: &Path) -> Result<()> {
    let config = cfg();
    let pages = Arc::new(load_pages(&config)?);

    let live = if config.live_reload.enable {
        let handler = reload_handler(config_path.to_path_buf(), Arc::clone(&pages));
        Some(Arc::new(livereload::start(config.live_reload_options(), handler)?))
    } else {
        None
    };

    let (server, addr) = lifecycle::bind_with_retry(config.serve.interface, config.serve.port)?;
    log!("serve"; "http://{}", addr);
    if let Some(live) = &live {
        debug!("serve"; "live reload stream at http://{}{}", addr, live.endpoint());
    }

    run_request_loop(&server, &pages, live.as_ref())
}

fn run_request_loop(server: &Server, pages: &Arc<Pages>, live: Option<&Arc<LiveServer>>) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(WORKERS)
        .thread_name(|i| format!("loadr-worker-{i}"))
        .build()
        .context("failed to create thread pool")?;

    for request in server.incoming_requests() {
        // Streams block for their whole lifetime and must not starve the pool
        if let Some(live) = live
            && live.handles(request.url())
        {
            let live = Arc::clone(live);
            std::thread::spawn(move || live.serve(request));
            continue;
        }

        let pages = Arc::clone(pages);
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &pages) {
                log!("serve"; "request error: {e}");
            }
        });
    }

    Ok(())
}

/// Handle a single page request
fn handle_request(request: Request, pages: &Pages) -> Result<()> {
    if !matches!(request.method(), Method::Get | Method::Head) {
        return response::respond_method_not_allowed(request);
    }

    let data = RequestData::from_url(request.method().as_str(), request.url());
    let Some(page) = pages.get(&data.path) else {
        return response::respond_not_found(request, &pages.routes());
    };

    match render_page(page, &data) {
        Ok(body) => response::respond_html(request, body),
        Err(message) => response::respond_render_error(request, &message),
    }
}

/// Render a page, turning a render panic into its error message.
fn render_page(page: &Page, data: &RequestData) -> Result<Vec<u8>, String> {
    let mut body = Vec::new();
    panic::catch_unwind(AssertUnwindSafe(|| page.render(&mut body, data)))
        .map(|()| body)
        .map_err(|payload| match payload.downcast_ref::<TemplateError>() {
            Some(err) => err.to_string(),
            None => "template panicked".to_string(),
        })
}

/// Default reload logging, plus a `[site]` refresh when the config file changes.
fn reload_handler(config_path: PathBuf, pages: Arc<Pages>) -> ReloadHandler {
    livereload::reload_handler(move |result| {
        livereload::handle_reload(result);
        if let Ok(event) = result
            && touches(event, &config_path)
        {
            refresh_site(&config_path, &pages);
        }
    })
}

fn touches(event: &ChangeEvent, path: &Path) -> bool {
    let Ok(target) = path.canonicalize() else {
        return false;
    };
    event
        .paths
        .iter()
        .any(|p| p.canonicalize().is_ok_and(|p| p == target))
}

fn refresh_site(config_path: &Path, pages: &Pages) {
    match Config::load(config_path) {
        Ok(config) => {
            pages.set_site(config.site.clone());
            loadr::config::init_config(config);
            debug!("config"; "reloaded [site] from {}", config_path.display());
        }
        Err(e) => log!("error"; "failed to reload {}: {}", config_path.display(), e),
    }
}

/// Load every page once and report the outcome.
pub fn check() -> Result<()> {
    let config = cfg();
    let pages = load_pages(&config)?;
    let mut stdout = std::io::stdout().lock();
    for route in pages.routes() {
        writeln!(stdout, "{route}")?;
    }
    Ok(())
}
