use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::cluster::cluster_articles;
use crate::error::FeedError;
use crate::feed::FeedService;
use crate::model::Article;
use crate::options::{ClusterConfigInput, FeedOptions, FeedQuery};

/// Set by the upstream auth layer once the session is validated.
pub const VIEWER_HEADER: &str = "x-viewer-id";

const DEFAULT_TRENDING: usize = 10;
const MAX_TRENDING: usize = 50;

pub struct AppState {
    pub feed: FeedService,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/feed", get(feed))
        .route("/feed/explanation", get(explanation))
        .route("/clusters", post(clusters))
        .route("/stories/trending", get(trending))
        .route("/articles/:id/related", get(related))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<FeedError>() {
            Some(FeedError::Configuration { .. }) => StatusCode::BAD_REQUEST,
            Some(err) if err.is_upstream_failure() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {:#}", self.0);
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

fn viewer_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(VIEWER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// Route handlers
pub async fn feed(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, AppError> {
    let options = FeedOptions::from_query(query)?;
    let page = state
        .feed
        .get_personalized_feed(viewer_id(&headers), &options)
        .await?;
    Ok(Json(page))
}

pub async fn explanation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let viewer = viewer_id(&headers)
        .ok_or_else(|| FeedError::configuration("viewer", "an identified viewer is required"))?;
    let explanation = state.feed.get_feed_explanation(viewer).await?;
    Ok(Json(explanation))
}

#[derive(Deserialize)]
pub struct ClusterRequest {
    pub articles: Vec<Article>,
    #[serde(default)]
    pub config: ClusterConfigInput,
}

pub async fn clusters(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ClusterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let config = request.config.resolve(state.feed.cluster_defaults())?;
    let clusters = cluster_articles(&request.articles, Some(&config));
    Ok(Json(clusters))
}

#[derive(Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<i64>,
}

pub async fn trending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = match query.limit {
        Some(limit) if limit < 0 => {
            return Err(FeedError::configuration("limit", "must not be negative").into())
        }
        Some(limit) => (limit as usize).clamp(1, MAX_TRENDING),
        None => DEFAULT_TRENDING,
    };
    let stories = state.feed.trending_stories(limit, Utc::now()).await?;
    Ok(Json(stories))
}

pub async fn related(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let articles = state.feed.related_articles(&article_id, Utc::now()).await?;
    Ok(Json(articles))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
