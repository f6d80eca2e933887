use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use url::Url;

use wishgrab_core::browser::BrowserError;
use wishgrab_core::wishlist::WishlistScraper;

#[derive(Clone)]
pub struct AppState {
    scraper: Arc<WishlistScraper>,
}

pub fn router(scraper: Arc<WishlistScraper>) -> Router {
    Router::new()
        .route("/scrape", get(scrape))
        .route("/scrape/enriched", get(scrape_enriched))
        .route("/info", get(info))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { scraper })
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("scraping failed")]
    Scrape(#[source] BrowserError),
    #[error("detail fetch failed")]
    Detail(#[source] BrowserError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            ApiError::Scrape(err) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "scraping failed", "details": err.to_string() }),
            ),
            ApiError::Detail(err) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "detail fetch failed", "details": err.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ListingQuery {
    url: Option<String>,
    limit: Option<usize>,
}

impl ListingQuery {
    /// A limit of zero means no limit.
    fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|n| *n > 0)
    }
}

#[derive(Debug, Deserialize)]
struct DetailQuery {
    id: Option<String>,
}

fn require_listing_url(raw: Option<&str>) -> Result<Url, ApiError> {
    let raw = raw
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing url parameter".to_string()))?;
    let url = Url::parse(raw)
        .map_err(|err| ApiError::BadRequest(format!("invalid url parameter: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::BadRequest(format!(
            "unsupported url scheme: {other}"
        ))),
    }
}

async fn scrape(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Response, ApiError> {
    let url = require_listing_url(query.url.as_deref())?;
    let records = state
        .scraper
        .fetch_listing(url.as_str(), query.effective_limit())
        .await
        .map_err(ApiError::Scrape)?;
    Ok(Json(json!({ "records": records })).into_response())
}

async fn scrape_enriched(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Response, ApiError> {
    let url = require_listing_url(query.url.as_deref())?;
    let records = state
        .scraper
        .fetch_listing_enriched(url.as_str(), query.effective_limit())
        .await
        .map_err(ApiError::Scrape)?;
    Ok(Json(json!({ "records": records })).into_response())
}

async fn info(
    State(state): State<AppState>,
    Query(query): Query<DetailQuery>,
) -> Result<Response, ApiError> {
    let id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing id parameter".to_string()))?;
    let record = state
        .scraper
        .fetch_detail(id)
        .await
        .map_err(ApiError::Detail)?;
    Ok(Json(record).into_response())
}

async fn healthz() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use wishgrab_core::browser::SessionManager;
    use wishgrab_core::WishgrabConfig;

    use super::*;

    /// Session launch is lazy, so building real state never touches a
    /// browser; only the validation paths are exercised here.
    fn test_router() -> Router {
        let config = WishgrabConfig::default();
        let session = Arc::new(SessionManager::new(
            config.chromium.clone(),
            config.identity.clone(),
        ));
        let scraper =
            Arc::new(WishlistScraper::new(session, config).expect("default config is valid"));
        router(scraper)
    }

    async fn get_status(uri: &str) -> StatusCode {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        response.status()
    }

    #[tokio::test]
    async fn scrape_without_url_is_bad_request() {
        assert_eq!(get_status("/scrape").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn scrape_rejects_relative_and_non_http_urls() {
        assert_eq!(
            get_status("/scrape?url=not-a-url").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status("/scrape?url=ftp://example.com/list").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn enriched_scrape_validates_url_the_same_way() {
        assert_eq!(
            get_status("/scrape/enriched").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn info_without_id_is_bad_request() {
        assert_eq!(get_status("/info").await, StatusCode::BAD_REQUEST);
        assert_eq!(get_status("/info?id=").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_request_payload_names_the_missing_parameter() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/scrape")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(payload["error"], "missing url parameter");
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        assert_eq!(get_status("/healthz").await, StatusCode::OK);
    }
}
