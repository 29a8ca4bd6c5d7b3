//! Web server for the seismomap UI.
//!
//! Serves an embedded Leaflet page (the map view) and a small JSON API that
//! feeds user input into the coordinator:
//! - `GET /api/state` and `GET /stream` (SSE) publish session snapshots
//! - `POST /api/filters`, `/api/apply`, `/api/click`, `/api/locate` and
//!   `/api/notice/dismiss` turn user input into actions

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;

use crate::coordinator::CoordinatorHandle;
use crate::filters::{FilterState, MAX_HOURS_BACK, MIN_HOURS_BACK};
use crate::marker::MapMarker;
use crate::models::LatLon;
use crate::session::{Notice, Snapshot, ViewState};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    coordinator: CoordinatorHandle,
}

impl AppState {
    #[must_use]
    pub const fn new(coordinator: CoordinatorHandle) -> Self {
        Self { coordinator }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(sse_handler))
        .route("/api/state", get(state_handler))
        .route("/api/filters", post(filters_handler))
        .route("/api/apply", post(apply_handler))
        .route("/api/click", post(click_handler))
        .route("/api/locate", post(locate_handler))
        .route("/api/notice/dismiss", post(dismiss_notice_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the web server and run until Ctrl+C.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn run_server(config: ServerConfig, coordinator: CoordinatorHandle) -> anyhow::Result<()> {
    let app = create_router(AppState::new(coordinator));

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("🌍 seismomap UI starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Snapshot rendering
// ============================================================================

/// Status text shown for any fetch failure.
const FETCH_FAILED_MESSAGE: &str = "Failed to fetch earthquake data";

#[derive(Serialize)]
struct NoticeView {
    kind: Notice,
    message: &'static str,
}

/// JSON shape the page renders from.
#[derive(Serialize)]
struct StateView<'a> {
    filter: FilterState,
    view: ViewState,
    user_location: Option<LatLon>,
    markers: Vec<MapMarker<'a>>,
    outcome: &'static str,
    loading: bool,
    error: Option<&'static str>,
    notice: Option<NoticeView>,
    updated_at: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Snapshot> for StateView<'a> {
    fn from(s: &'a Snapshot) -> Self {
        Self {
            filter: s.filter,
            view: s.view,
            user_location: s.user_location,
            markers: s.events.iter().map(MapMarker::from).collect(),
            outcome: s.outcome,
            loading: s.loading,
            error: s.error.map(|_| FETCH_FAILED_MESSAGE),
            notice: s.notice.map(|kind| NoticeView {
                kind,
                message: kind.message(),
            }),
            updated_at: s.updated_at,
        }
    }
}

fn render_state(snapshot: &Snapshot) -> String {
    serde_json::to_string(&StateView::from(snapshot)).unwrap_or_else(|e| {
        tracing::error!("failed to serialize state: {e}");
        "{}".to_string()
    })
}

/// 202 while the coordinator is alive, 503 after it shut down.
fn accepted(delivered: bool) -> StatusCode {
    if delivered {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the map page.
async fn index_handler() -> Html<String> {
    Html(
        INDEX_HTML
            .replace("{{MIN_HOURS}}", &MIN_HOURS_BACK.to_string())
            .replace("{{MAX_HOURS}}", &MAX_HOURS_BACK.to_string()),
    )
}

/// SSE stream of state snapshots.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.coordinator.subscribe())
        .map(|snapshot| Ok(Event::default().event("state").data(render_state(&snapshot))));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Current state as JSON.
async fn state_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.coordinator.snapshot();
    (
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        render_state(&snapshot),
    )
        .into_response()
}

/// Filter edits update state only; nothing is fetched until Apply.
async fn filters_handler(
    State(state): State<AppState>,
    Json(filter): Json<FilterState>,
) -> StatusCode {
    accepted(state.coordinator.set_filters(filter).await)
}

async fn apply_handler(State(state): State<AppState>) -> StatusCode {
    tracing::debug!("apply requested via UI");
    accepted(state.coordinator.apply().await)
}

#[derive(Debug, Deserialize)]
struct ClickBody {
    lat: f64,
    lon: f64,
}

async fn click_handler(State(state): State<AppState>, Json(body): Json<ClickBody>) -> Response {
    match LatLon::wrapped(body.lat, body.lon) {
        Ok(point) => accepted(state.coordinator.map_clicked(point).await).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

async fn locate_handler(State(state): State<AppState>) -> StatusCode {
    accepted(state.coordinator.locate_me().await)
}

async fn dismiss_notice_handler(State(state): State<AppState>) -> StatusCode {
    accepted(state.coordinator.dismiss_notice().await)
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>seismomap · recent earthquakes</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        html, body { height: 100%; font-family: system-ui, sans-serif; background: #09090b; color: #fafafa; }
        body { display: flex; flex-direction: column; }
        .controls { display: flex; flex-wrap: wrap; gap: 0.75rem; align-items: center; padding: 0.75rem 1rem; border-bottom: 1px solid #27272a; }
        .controls label { font-size: 0.8125rem; color: #a1a1aa; display: flex; gap: 0.375rem; align-items: center; }
        .controls input, .controls select { background: #18181b; color: inherit; border: 1px solid #3f3f46; border-radius: 6px; padding: 0.25rem 0.5rem; }
        .btn { border: none; border-radius: 8px; padding: 0.4rem 0.9rem; font-weight: 500; cursor: pointer; }
        .btn-primary { background: #818cf8; color: white; }
        .btn-ghost { background: transparent; color: #a1a1aa; border: 1px solid #3f3f46; }
        .status { margin-left: auto; font-size: 0.8125rem; color: #a1a1aa; }
        .status.error { color: #ef4444; }
        .notice { display: none; gap: 0.75rem; align-items: center; padding: 0.5rem 1rem; background: #f59e0b22; color: #f59e0b; font-size: 0.875rem; }
        .notice.visible { display: flex; }
        #map { flex: 1; }
    </style>
</head>
<body>
    <div class="controls">
        <label>Hours back
            <input id="hours" type="number" min="{{MIN_HOURS}}" max="{{MAX_HOURS}}" step="1">
        </label>
        <label>Min magnitude
            <select id="minmag">
                <option value="0">All</option>
                <option value="2.5">2.5+</option>
                <option value="4.5">4.5+</option>
                <option value="6">6.0+</option>
            </select>
        </label>
        <button class="btn btn-primary" id="apply">Apply</button>
        <button class="btn btn-ghost" id="locate">📍 My Location</button>
        <span class="status" id="status">Loading…</span>
    </div>
    <div class="notice" id="notice">
        <span id="notice-text"></span>
        <button class="btn btn-ghost" id="notice-dismiss">Dismiss</button>
    </div>
    <div id="map"></div>

    <script>
        const MIN_HOURS = {{MIN_HOURS}}, MAX_HOURS = {{MAX_HOURS}};
        const map = L.map('map', { worldCopyJump: true }).setView([20, 0], 2);
        L.tileLayer('https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png', {
            attribution: '&copy; OpenStreetMap contributors'
        }).addTo(map);
        const markers = L.layerGroup().addTo(map);
        let userMarker = null, lastView = null, filtersShown = false;

        const post = (path, body) => fetch(path, {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: body === undefined ? undefined : JSON.stringify(body)
        });

        function escapeHtml(s) {
            return String(s).replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
        }

        function popup(m) {
            const mag = m.magnitude == null ? '?' : m.magnitude.toFixed(1);
            const depth = m.depth == null ? '?' : m.depth.toFixed(1) + ' km';
            const when = m.occurred_at ? new Date(m.occurred_at).toUTCString() : 'unknown time';
            const link = m.detail_url ? `<br><a href="${escapeHtml(m.detail_url)}" target="_blank">Details</a>` : '';
            return `<b>M${mag}</b> ${escapeHtml(m.place)}<br>Depth ${depth}<br>${when}${link}`;
        }

        function render(state) {
            markers.clearLayers();
            for (const m of state.markers) {
                L.circleMarker([m.lat, m.lon], {
                    radius: m.radius, color: m.color, fillColor: m.color, fillOpacity: 0.6, weight: 1
                }).bindPopup(popup(m)).addTo(markers);
            }

            const view = JSON.stringify(state.view);
            if (view !== lastView) {
                lastView = view;
                map.setView([state.view.center.lat, state.view.center.lon], state.view.zoom);
            }

            if (state.user_location && !userMarker) {
                userMarker = L.marker([state.user_location.lat, state.user_location.lon])
                    .bindPopup('You are here').addTo(map);
            }

            if (!filtersShown) {
                filtersShown = true;
                document.getElementById('hours').value = state.filter.hours_back;
                document.getElementById('minmag').value = String(state.filter.min_magnitude);
            }

            const status = document.getElementById('status');
            status.classList.toggle('error', !!state.error);
            status.textContent = state.error
                ? state.error
                : state.loading ? 'Loading…' : `${state.markers.length} earthquakes`;

            const notice = document.getElementById('notice');
            notice.classList.toggle('visible', !!state.notice);
            document.getElementById('notice-text').textContent = state.notice ? state.notice.message : '';
        }

        function sendFilters() {
            const hoursInput = document.getElementById('hours');
            let hours = parseInt(hoursInput.value, 10);
            if (Number.isNaN(hours)) hours = 24;
            hours = Math.min(MAX_HOURS, Math.max(MIN_HOURS, hours));
            hoursInput.value = hours;
            const minMag = parseFloat(document.getElementById('minmag').value);
            return post('/api/filters', { hours_back: hours, min_magnitude: minMag });
        }

        document.getElementById('hours').addEventListener('change', sendFilters);
        document.getElementById('minmag').addEventListener('change', sendFilters);
        document.getElementById('apply').addEventListener('click', async () => {
            await sendFilters();
            post('/api/apply');
        });
        document.getElementById('locate').addEventListener('click', () => post('/api/locate'));
        document.getElementById('notice-dismiss').addEventListener('click', () => post('/api/notice/dismiss'));
        map.on('click', e => post('/api/click', { lat: e.latlng.lat, lon: e.latlng.lng }));

        fetch('/api/state').then(r => r.json()).then(render);
        const source = new EventSource('/stream');
        source.addEventListener('state', e => render(JSON.parse(e.data)));
    </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::client::EventSource;
    use crate::coordinator::{self, EngineConfig};
    use crate::errors::SeismomapError;
    use crate::geolocation::NoGeolocation;
    use crate::models::RenderableEvent;

    struct OneEvent;

    #[async_trait]
    impl EventSource for OneEvent {
        async fn fetch_events(&self, _filter: FilterState) -> Result<Vec<RenderableEvent>, SeismomapError> {
            Ok(vec![RenderableEvent {
                id: "us1".into(),
                lat: 10.0,
                lon: 20.0,
                depth: Some(12.0),
                magnitude: Some(2.0),
                place: "Somewhere".into(),
                occurred_at: None,
                detail_url: None,
            }])
        }
    }

    fn app() -> (Router, CoordinatorHandle) {
        let (handle, _task) = coordinator::spawn(
            EngineConfig::default(),
            Arc::new(OneEvent),
            Arc::new(NoGeolocation),
        );
        (create_router(AppState::new(handle.clone())), handle)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _handle) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_index_has_bounded_hours_input() {
        let (app, _handle) = app();
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains(r#"min="1" max="720""#));
        assert!(!html.contains("{{"));
    }

    #[tokio::test]
    async fn test_state_after_apply_has_styled_markers() {
        let (app, handle) = app();
        let response = app
            .clone()
            .oneshot(Request::post("/api/apply").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        handle
            .subscribe()
            .wait_for(|s| s.outcome == "success")
            .await
            .unwrap();

        let response = app
            .oneshot(Request::get("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let state = body_json(response).await;
        let marker = &state["markers"][0];
        assert_eq!(marker["id"], "us1");
        assert_eq!(marker["color"], "green");
        assert_eq!(marker["radius"], 7.0);
        assert_eq!(state["error"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_click_recenters() {
        let (app, handle) = app();
        let zoom = handle.snapshot().view.zoom;
        let response = app
            .oneshot(post_json("/api/click", r#"{"lat": 10, "lon": 20}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let snapshot = handle
            .subscribe()
            .wait_for(|s| s.view.center == LatLon { lat: 10.0, lon: 20.0 })
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.view.zoom, zoom);
    }

    #[tokio::test]
    async fn test_click_rejects_bad_latitude() {
        let (app, _handle) = app();
        let response = app
            .oneshot(post_json("/api/click", r#"{"lat": 95, "lon": 20}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filters_reject_out_of_domain() {
        let (app, _handle) = app();
        let response = app
            .oneshot(post_json("/api/filters", r#"{"hours_back": 721, "min_magnitude": 2.5}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_locate_without_location_sets_notice() {
        let (app, handle) = app();
        let response = app
            .clone()
            .oneshot(Request::post("/api/locate").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        handle.subscribe().wait_for(|s| s.notice.is_some()).await.unwrap();

        let response = app
            .oneshot(Request::get("/api/state").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let state = body_json(response).await;
        assert_eq!(state["notice"]["kind"], "location_unavailable");
    }
}
