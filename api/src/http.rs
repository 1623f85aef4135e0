// http.rs
use crate::AppState;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use discuss_embed_core::{
    Command, ConfigError, Configurator, DirectConfig, Event, Mapping, Resolution, SessionObserver,
    Theme,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const VALIDATION_STATUS_HEADER: &str = "x-validation-status";

#[derive(Debug, Deserialize)]
struct SnippetParams {
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    mapping: Option<String>,
    #[serde(default)]
    term: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    theme: Option<String>,
    #[serde(default = "default_reactions")]
    reactions: bool,
    #[serde(default)]
    format: Option<String>,
}

fn default_reactions() -> bool {
    true
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<ConfigError>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        warn!(error = %self.0, status = %status, "Request failed");
        (status, format!("{}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn snippet(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SnippetParams>,
) -> Result<Response, AppError> {
    let start = Instant::now();
    state.metrics.record_request().await;

    let result = build_snippet(&state, params).await;
    if result.is_err() {
        state.metrics.record_error().await;
    }
    state.metrics.record_response_time(start.elapsed()).await;

    result
}

async fn build_snippet(state: &AppState, params: SnippetParams) -> Result<Response, AppError> {
    let theme = match params.theme.as_deref() {
        Some(theme) => theme.parse::<Theme>()?,
        None => Theme::default(),
    };
    let mut configurator = Configurator::with_direct(DirectConfig {
        theme,
        reactions_enabled: params.reactions,
    });

    if let Some(mapping) = params.mapping.as_deref() {
        let mapping = mapping.parse::<Mapping>()?;
        configurator.apply(Event::Command(Command::SetMapping { mapping }))?;
    }
    if let Some(term) = params.term {
        configurator.apply(Event::Command(Command::SetTerm { term }))?;
    }

    let mut failure = None;
    if let Some(repo) = params.repo.as_deref().filter(|r| !r.trim().is_empty()) {
        let repo = repo.trim();
        state.metrics.lookup_issued(repo).await;
        let outcome = configurator.validate_now(state.lookup.as_ref(), repo).await;
        state
            .metrics
            .lookup_resolved(repo, Resolution::Applied, outcome.is_ok())
            .await;

        match outcome {
            Ok(()) => {
                if let Some(category) = params.category.as_deref() {
                    let by_id = configurator.apply(Event::Command(Command::SelectCategory {
                        id: category.to_string(),
                    }));
                    if by_id.is_err() {
                        configurator.select_category_by_name(category)?;
                    }
                }
            }
            Err(e) => failure = Some(e.to_string()),
        }
    }

    let mut snapshot = configurator.snapshot();
    snapshot.error = failure;
    state.metrics.record_snippet().await;

    info!(
        repo = %snapshot.configuration.repository,
        status = snapshot.status,
        complete = snapshot.complete,
        "Snippet composed"
    );

    let status = snapshot.status;
    if params.format.as_deref() == Some("json") {
        Ok(([(VALIDATION_STATUS_HEADER, status)], Json(snapshot)).into_response())
    } else {
        Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8"),
                (VALIDATION_STATUS_HEADER, status),
            ],
            snapshot.snippet,
        )
            .into_response())
    }
}

async fn themes() -> impl IntoResponse {
    let themes: Vec<_> = Theme::ALL
        .iter()
        .map(|t| serde_json::json!({ "value": t.as_str(), "label": t.label() }))
        .collect();
    Json(themes)
}

async fn mappings() -> impl IntoResponse {
    let mappings: Vec<_> = Mapping::ALL
        .iter()
        .map(|m| {
            serde_json::json!({
                "value": m.as_str(),
                "description": m.description(),
                "requiresTerm": m.requires_term(),
            })
        })
        .collect();
    Json(mappings)
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = state.metrics.get_metrics().await;
    let top = state.metrics.get_top_repositories(10).await;
    Json(serde_json::json!({
        "metrics": metrics,
        "top_repositories": top,
    }))
}

async fn health() -> &'static str {
    "OK"
}

async fn index() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        "discuss-embed API - build the embed snippet for a discussion widget\n\
        \n\
        HTTP API: GET /snippet?repo=owner/name\n\
        WebSocket: live configurator session, JSON commands in, snapshots out\n\
        \n\
        Query parameters:\n\
        - repo: Repository in owner/name form\n\
        - mapping: pathname, url, title, og:title, specific, number\n\
        - term: Term for the specific and number mappings\n\
        - category: Category name or id\n\
        - theme: Widget theme (see /themes)\n\
        - reactions: true or false\n\
        - format: json for the full configuration\n\
        \n\
        Examples:\n\
        - /snippet?repo=octo/demo&category=General\n\
        - /snippet?repo=octo/demo&mapping=number&term=42&format=json\n",
    )
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/themes", get(themes))
        .route("/mappings", get(mappings))
        .route("/snippet", get(snippet))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCollector;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use discuss_embed_core::{Category, LookupError, RepositoryInfo, RepositoryLookup, Settings};
    use tower::ServiceExt;

    struct DemoLookup;

    #[async_trait]
    impl RepositoryLookup for DemoLookup {
        async fn lookup(&self, identifier: &str) -> Result<RepositoryInfo, LookupError> {
            match identifier {
                "octo/demo" => Ok(RepositoryInfo {
                    repository_id: "R_1".to_string(),
                    categories: vec![Category {
                        id: "C_1".to_string(),
                        emoji: "💬".to_string(),
                        name: "General".to_string(),
                    }],
                }),
                _ => Err(LookupError::NotEligible {
                    status: 404,
                    message: "not found".to_string(),
                }),
            }
        }
    }

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            lookup: Arc::new(DemoLookup),
            metrics: Arc::new(MetricsCollector::new()),
            settings: Settings::default(),
        })
    }

    async fn get_text(state: Arc<AppState>, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let validation = response
            .headers()
            .get(VALIDATION_STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, validation, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_snippet_end_to_end() {
        let state = test_state();
        let (status, validation, body) =
            get_text(state.clone(), "/snippet?repo=octo/demo&category=General&mapping=pathname").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(validation.as_deref(), Some("success"));
        assert!(body.contains("data-repo=\"octo/demo\""));
        assert!(body.contains("data-repo-id=\"R_1\""));
        assert!(body.contains("data-category-id=\"C_1\""));
        assert!(body.contains("data-mapping=\"pathname\""));
        assert!(!body.contains("data-term"));

        let metrics = state.metrics.get_metrics().await;
        assert_eq!(metrics.snippets_served, 1);
        assert_eq!(metrics.lookups_issued, 1);
    }

    #[tokio::test]
    async fn test_snippet_without_repo_uses_placeholders() {
        let (status, validation, body) = get_text(test_state(), "/snippet?mapping=number").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(validation.as_deref(), Some("idle"));
        assert!(body.contains("[ENTER REPO HERE]"));
        assert!(body.contains("[ENTER TERM HERE]"));
    }

    #[tokio::test]
    async fn test_snippet_failed_lookup() {
        let state = test_state();
        let (status, validation, body) =
            get_text(state.clone(), "/snippet?repo=octo/private&format=json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(validation.as_deref(), Some("error"));

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json["error"].as_str().unwrap().contains("not found"));
        assert_eq!(state.metrics.get_metrics().await.lookups_failed, 1);
    }

    #[tokio::test]
    async fn test_bad_params_are_400() {
        let (status, _, _) = get_text(test_state(), "/snippet?theme=solarized").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = get_text(test_state(), "/snippet?repo=octo/demo&category=Nope").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_option_lists() {
        let (status, _, body) = get_text(test_state(), "/mappings").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 6);
        assert_eq!(json[3]["value"], "og:title");

        let (_, _, body) = get_text(test_state(), "/themes").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json.as_array().unwrap().len(), Theme::ALL.len());
    }
}
