pub mod health;

use axum::{
    extract::{DefaultBodyLimit, OriginalUri},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};

use crate::errors::AppError;
use crate::forms::handlers;
use crate::middleware::{rate_limit::rate_limit, security_headers};
use crate::state::AppState;

/// Headroom for multipart boundaries and text fields on top of the file ceiling.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("Cannot find {} on this server.", uri.path()))
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .upload_max_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let forms = Router::new()
        .route(
            "/forms",
            get(handlers::list_forms).post(handlers::create_form),
        )
        .route(
            "/forms/:id",
            get(handlers::get_form)
                .put(handlers::update_form)
                .delete(handlers::delete_form),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    let api = match state.config.api_prefix.as_str() {
        "" => forms,
        prefix => Router::new().nest(prefix, forms),
    };

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(api)
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(from_fn(security_headers))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::store::MemoryFormStore;

    fn router(config: Config) -> Router {
        build_router(AppState::new(Arc::new(MemoryFormStore::new()), config))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_route_envelope() {
        let response = router(Config::default())
            .oneshot(get_request("/x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "Cannot find /x on this server.");
    }

    #[tokio::test]
    async fn test_health_carries_security_headers() {
        let response = router(Config::default())
            .oneshot(get_request("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
        assert!(headers.contains_key("strict-transport-security"));
        assert_eq!(headers["x-ratelimit-limit"], "100");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_excess_requests() {
        let app = router(Config {
            rate_limit_max: 2,
            ..Config::default()
        });
        for _ in 0..2 {
            let response = app.clone().oneshot(get_request("/api/v1/forms")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app.oneshot(get_request("/api/v1/forms")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_empty_prefix_mounts_at_root() {
        let app = router(Config {
            api_prefix: String::new(),
            ..Config::default()
        });
        let response = app.oneshot(get_request("/forms")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
