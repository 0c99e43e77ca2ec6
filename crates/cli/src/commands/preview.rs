use super::{SiteSource, client};
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use sitekit_client::SiteApi;
use sitekit_core::{Config, GeneratedSite};
use sitekit_session::{FrameSurface, NAVIGATE_MESSAGE, PreviewSession, RegenerateError, Ticket};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::sync::{Mutex, broadcast};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Sandbox applied to the framed site: scripts and forms run, but the
/// document gets an opaque origin and cannot touch the host page.
const FRAME_SANDBOX: &str = "allow-scripts allow-forms";

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<PreviewSession<FrameSurface>>>,
    /// Present only for sites stored on the backend
    api: Option<Arc<dyn SiteApi>>,
    reload_tx: broadcast::Sender<()>,
}

impl AppState {
    fn new(session: PreviewSession<FrameSurface>, api: Option<Arc<dyn SiteApi>>) -> Self {
        let (reload_tx, _) = broadcast::channel::<()>(100);
        Self {
            session: Arc::new(Mutex::new(session)),
            api,
            reload_tx,
        }
    }
}

/// Tab selection (`page`) or a link followed inside the frame (`href`)
#[derive(Debug, Default, Deserialize)]
struct NavigateRequest {
    #[serde(default)]
    page: Option<String>,
    #[serde(default)]
    href: Option<String>,
}

#[derive(Debug, Serialize)]
struct PageResponse {
    page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegenerateRequest {
    #[serde(default)]
    modification_request: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Start the preview server.
///
/// The site is shown inside a sandboxed iframe with page tabs around it.
/// Internal links are intercepted inside the frame and turned into page
/// swaps; backend sites can be regenerated from the host page, and a
/// local directory is watched and reloaded on change.
pub async fn run(config: &Config, source: SiteSource, port: Option<u16>) -> Result<()> {
    println!("🌐 Starting preview server...");

    let site = source.load(config).await?;
    let api: Option<Arc<dyn SiteApi>> = if source.is_local() {
        None
    } else {
        Some(Arc::new(client(config)?))
    };

    println!("   ✓ Website: {}", site.id);
    println!("   ✓ Files: {}", site.files.len());

    let session = PreviewSession::open(site, FrameSurface::new(), None);
    match session.current_page() {
        Some(page) => println!("   ✓ Pages: {} (showing {})", session.pages().len(), page),
        None => println!("   ⚠️  No HTML pages found, the preview will be blank"),
    }

    let state = AppState::new(session, api);
    let app = router(state.clone());

    if let Some(dir) = source.dir.clone() {
        tokio::spawn(async move {
            if let Err(e) = watch_site(dir, state).await {
                eprintln!("File watcher error: {}", e);
            }
        });
    }

    let port = port.unwrap_or(config.preview.port);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("\n🚀 Preview ready at: http://localhost:{}", port);
    println!("   Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to port")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(shell_handler))
        .route("/frame", get(frame_handler))
        .route("/navigate", post(navigate_handler))
        .route("/regenerate", post(regenerate_handler))
        .route("/_reload", get(sse_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reload the site from disk whenever the directory changes
async fn watch_site(path: PathBuf, state: AppState) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut watcher =
        notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })?;

    watcher.watch(&path, RecursiveMode::Recursive)?;

    while let Some(event) = rx.recv().await {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => {
                // Skip editor swap files and hidden files
                if !event.paths.iter().any(|p| {
                    let filename = p.file_name().unwrap_or_default().to_string_lossy();
                    !filename.starts_with('.') && !filename.ends_with('~')
                }) {
                    continue;
                }

                match GeneratedSite::from_dir(&path) {
                    Ok(site) => {
                        println!("   📝 Files changed, reloading...");
                        state.session.lock().await.replace_site(site);
                        let _ = state.reload_tx.send(());
                    }
                    Err(e) => warn!(error = %e, "Keeping previous site after failed reload"),
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Host page: tabs, the sandboxed frame and the regeneration form
async fn shell_handler(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    let current = session.current_page();

    let tabs: String = session
        .pages()
        .into_iter()
        .map(|page| {
            let active = if Some(page) == current { " active" } else { "" };
            format!(
                r#"<button type="button" class="tab{}" data-page="{}">{}</button>"#,
                active,
                escape_html(page),
                escape_html(page)
            )
        })
        .collect();

    let regenerate_form = if state.api.is_some() {
        let status = session
            .controller()
            .last_error()
            .map(|e| format!(r#"<span class="error">{}</span>"#, escape_html(e)))
            .unwrap_or_default();
        format!(
            r#"<form id="regenerate">
            <input id="request" name="modification_request" placeholder="Describe what to change..." autocomplete="off">
            <button type="submit">Regenerate</button>
            <span id="status">{}</span>
        </form>"#,
            status
        )
    } else {
        r#"<p class="hint">Local preview: edit the files and the page reloads.</p>"#.to_string()
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Website {} | Preview</title>
    <style>{}</style>
</head>
<body>
    <header>
        <div class="preview-badge">PREVIEW</div>
        <nav class="tabs">{}</nav>
    </header>
    <iframe id="site-frame" src="/frame" sandbox="{}" title="Website preview"></iframe>
    <footer>{}</footer>
    <script>const NAVIGATE_MESSAGE = '{}';</script>
    <script>{}</script>
</body>
</html>"#,
        escape_html(session.site().id.as_str()),
        SHELL_CSS,
        tabs,
        FRAME_SANDBOX,
        regenerate_form,
        NAVIGATE_MESSAGE,
        SHELL_JS
    ))
}

/// Assembled document for the current page, interceptor included
async fn frame_handler(State(state): State<AppState>) -> Response {
    let session = state.session.lock().await;
    let document = session.renderer().surface().document().to_string();
    (
        [(
            header::CONTENT_SECURITY_POLICY,
            format!("sandbox {}", FRAME_SANDBOX),
        )],
        Html(document),
    )
        .into_response()
}

async fn navigate_handler(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Json<PageResponse> {
    let mut session = state.session.lock().await;
    let page = match (&request.href, &request.page) {
        (Some(href), _) => session.follow_link(href),
        (None, Some(page)) => session.select_page(page),
        (None, None) => session.current_page(),
    }
    .map(str::to_string);
    info!(href = ?request.href, requested = ?request.page, shown = ?page, "Page selected");
    Json(PageResponse { page })
}

/// Abandons a started regeneration if its request is dropped before the
/// backend answers, e.g. when the browser disconnects mid-request.
struct InFlight {
    session: Arc<Mutex<PreviewSession<FrameSurface>>>,
    ticket: Option<Ticket>,
}

impl InFlight {
    fn new(state: &AppState, ticket: Ticket) -> Self {
        Self {
            session: state.session.clone(),
            ticket: Some(ticket),
        }
    }

    fn disarm(&mut self) {
        self.ticket = None;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let Some(ticket) = self.ticket.take() else {
            return;
        };
        warn!("Regeneration request dropped before the backend answered");

        match self.session.try_lock() {
            Ok(mut session) => session.abandon_regeneration(ticket),
            Err(_) => {
                let session = self.session.clone();
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        session.lock().await.abandon_regeneration(ticket);
                    });
                }
            }
        }
    }
}

/// Regenerate the previewed site through the backend.
///
/// The session lock is released while the backend works, so a second
/// request arriving meanwhile is answered with 409 instead of queueing.
/// A request dropped mid-flight returns the controller to idle and its
/// late response is discarded.
async fn regenerate_handler(
    State(state): State<AppState>,
    Json(request): Json<RegenerateRequest>,
) -> Response {
    let Some(api) = state.api.clone() else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Regeneration is only available for websites stored on the backend".to_string(),
        );
    };

    let begun = state
        .session
        .lock()
        .await
        .begin_regeneration(&request.modification_request);
    let (ticket, id) = match begun {
        Ok(started) => started,
        Err(e) => return regenerate_error(e),
    };

    let mut in_flight = InFlight::new(&state, ticket);
    let result = api.regenerate(&id, &request.modification_request).await;

    let finished = state
        .session
        .lock()
        .await
        .finish_regeneration(ticket, result);
    in_flight.disarm();

    match finished {
        Ok(page) => {
            let _ = state.reload_tx.send(());
            Json(PageResponse { page }).into_response()
        }
        Err(e) => regenerate_error(e),
    }
}

fn regenerate_error(error: RegenerateError) -> Response {
    let status = match &error {
        RegenerateError::EmptyRequest => StatusCode::BAD_REQUEST,
        RegenerateError::AlreadyRequesting => StatusCode::CONFLICT,
        RegenerateError::Api(_) => StatusCode::BAD_GATEWAY,
        RegenerateError::Stale => StatusCode::GONE,
    };
    error_response(status, error.to_string())
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// SSE endpoint for hot reload
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut rx = state.reload_tx.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(()) => yield Ok(Event::default().data("reload")),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const SHELL_CSS: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    display: flex;
    flex-direction: column;
    height: 100vh;
    background: #f5f5f5;
    color: #333;
}
header {
    display: flex;
    align-items: center;
    gap: 1rem;
    padding: 0.5rem 1rem;
    background: white;
    border-bottom: 1px solid #ddd;
}
.preview-badge {
    background: #ff6b35;
    color: white;
    padding: 0.25rem 0.75rem;
    border-radius: 4px;
    font-weight: bold;
    font-size: 0.8rem;
}
.tabs { display: flex; gap: 0.25rem; flex-wrap: wrap; }
.tab {
    border: 1px solid #ddd;
    background: #fafafa;
    padding: 0.35rem 0.75rem;
    border-radius: 4px;
    cursor: pointer;
}
.tab.active { background: #333; color: white; border-color: #333; }
iframe { flex: 1; width: 100%; border: none; background: white; }
footer { padding: 0.75rem 1rem; background: white; border-top: 1px solid #ddd; }
form { display: flex; gap: 0.5rem; align-items: center; }
#request { flex: 1; padding: 0.5rem; border: 1px solid #ccc; border-radius: 4px; }
button[type="submit"] { padding: 0.5rem 1rem; cursor: pointer; }
.error, #status.error { color: #c0392b; }
.hint { color: #999; font-size: 0.9rem; }
"#;

const SHELL_JS: &str = r#"
const frame = document.getElementById('site-frame');

function markActive(page) {
    document.querySelectorAll('.tab').forEach((tab) => {
        tab.classList.toggle('active', tab.dataset.page === page);
    });
}

async function navigate(target) {
    const response = await fetch('/navigate', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(target),
    });
    if (!response.ok) return;
    const body = await response.json();
    markActive(body.page);
    frame.src = '/frame?t=' + Date.now();
}

document.querySelectorAll('.tab').forEach((tab) => {
    tab.addEventListener('click', () => navigate({ page: tab.dataset.page }));
});

// Link clicks intercepted inside the sandboxed frame
window.addEventListener('message', (event) => {
    if (event.source !== frame.contentWindow) return;
    const data = event.data || {};
    if (data.type !== NAVIGATE_MESSAGE || typeof data.href !== 'string') return;
    navigate({ href: data.href });
});

const form = document.getElementById('regenerate');
if (form) {
    const input = document.getElementById('request');
    const status = document.getElementById('status');
    const submit = form.querySelector('button[type="submit"]');
    form.addEventListener('submit', async (event) => {
        event.preventDefault();
        const request = input.value.trim();
        if (!request) {
            status.className = 'error';
            status.textContent = 'Please describe what changes you want';
            return;
        }
        submit.disabled = true;
        status.className = '';
        status.textContent = 'Regenerating...';
        try {
            const response = await fetch('/regenerate', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ modification_request: request }),
            });
            if (response.ok) {
                location.reload();
                return;
            }
            const body = await response.json().catch(() => ({}));
            status.className = 'error';
            status.textContent = body.error || 'Regeneration failed';
        } catch (err) {
            status.className = 'error';
            status.textContent = 'Preview server unreachable';
        }
        submit.disabled = false;
    });
}

// Hot reload via Server-Sent Events
const eventSource = new EventSource('/_reload');
eventSource.onmessage = () => location.reload();
eventSource.onerror = () => {
    console.log('Preview server disconnected');
    eventSource.close();
};
"#;
