//! Web server module for net-health.
//!
//! Serves the rendered charts from the output directory, an index page that
//! embeds every chart, and a liveness probe.

use askama::Template;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    services::ServeDir,
    trace::{DefaultMakeSpan, TraceLayer},
};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Directory the charts are rendered into.
    pub output_dir: PathBuf,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

/// One chart on the index page.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChartEntry {
    host: String,
    file: String,
}

/// Index page template.
#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="10">
<title>net-health</title>
</head>
<body>
<h1>net-health</h1>
{% if charts.is_empty() %}
<p>No charts rendered yet.</p>
{% else %}
<ul>
{% for chart in charts %}
<li><a href="/{{ chart.file }}">{{ chart.host }}</a></li>
{% endfor %}
</ul>
{% for chart in charts %}
<figure><img src="/{{ chart.file }}" alt="Ping for {{ chart.host }}"></figure>
{% endfor %}
{% endif %}
</body>
</html>
"#
)]
struct IndexTemplate {
    charts: Vec<ChartEntry>,
}

/// Wrapper to render Askama templates as Axum responses.
struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(rendered) => Html(rendered).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "Template render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Create the Axum router with all routes.
///
/// Any path other than `/` and `/healthz` is served from the output directory.
pub fn create_router(state: AppState) -> Router {
    let charts = ServeDir::new(&state.output_dir);
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz_handler))
        .fallback_service(charts)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(app_state)
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Index page listing every chart in the output directory.
async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    match list_charts(&state.output_dir).await {
        Ok(charts) => HtmlTemplate(IndexTemplate { charts }).into_response(),
        Err(e) => {
            tracing::error!(dir = %state.output_dir.display(), error = %e, "Failed to list charts");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Visible `.svg` files in `dir`, sorted by host. A missing directory is empty.
async fn list_charts(dir: &std::path::Path) -> std::io::Result<Vec<ChartEntry>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut charts = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file = entry.file_name().to_string_lossy().into_owned();
        if file.starts_with('.') {
            continue;
        }
        if let Some(host) = file.strip_suffix(".svg") {
            charts.push(ChartEntry {
                host: host.to_string(),
                file: file.clone(),
            });
        }
    }
    charts.sort_by(|a, b| a.host.cmp(&b.host));
    Ok(charts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn get_body(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_healthz_endpoint() {
        let dir = tempdir().unwrap();
        let app = create_router(AppState {
            output_dir: dir.path().to_path_buf(),
        });

        let (status, body) = get_body(app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_index_lists_charts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.test.svg"), "<svg/>").unwrap();
        std::fs::write(dir.path().join("a.test.svg"), "<svg/>").unwrap();
        std::fs::write(dir.path().join(".c.test.svg.tmp"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let app = create_router(AppState {
            output_dir: dir.path().to_path_buf(),
        });

        let (status, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        let a = body.find("/a.test.svg").unwrap();
        let b = body.find("/b.test.svg").unwrap();
        assert!(a < b);
        assert!(!body.contains("c.test"));
        assert!(!body.contains("notes.txt"));
    }

    #[tokio::test]
    async fn test_index_without_output_dir() {
        let dir = tempdir().unwrap();
        let app = create_router(AppState {
            output_dir: dir.path().join("absent"),
        });

        let (status, body) = get_body(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No charts rendered yet"));
    }

    #[tokio::test]
    async fn test_serves_chart_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.test.svg"), "<svg>chart</svg>").unwrap();
        let app = create_router(AppState {
            output_dir: dir.path().to_path_buf(),
        });

        let (status, body) = get_body(app.clone(), "/a.test.svg").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<svg>chart</svg>");

        let (status, _) = get_body(app, "/missing.svg").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
