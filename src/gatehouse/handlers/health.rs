use axum::{
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;
use std::sync::Arc;

use crate::{gatehouse::SecurityState, GIT_COMMIT_HASH};

// axum handler for health
pub async fn health(Extension(state): Extension<Arc<SecurityState>>) -> impl IntoResponse {
    let stats = state.stats().snapshot();

    let body = Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "build": GIT_COMMIT_HASH,
        "stats": stats,
    }));

    let short_hash = if GIT_COMMIT_HASH.len() > 7 {
        &GIT_COMMIT_HASH[0..7]
    } else {
        ""
    };

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!(
        "{}:{}:{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_hash
    )) {
        headers.insert("X-App", value);
    }

    (headers, body)
}
