pub mod handlers;

use crate::security::{AccessPolicyResolver, AuthDecisionEngine, SecurityStats};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
    Extension, Router,
};
use std::{net::SocketAddr, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

/// Everything the security middleware needs, shared by all requests.
pub struct SecurityState {
    engine: AuthDecisionEngine,
    resolver: Arc<dyn AccessPolicyResolver>,
    stats: SecurityStats,
    realm: String,
    trust_forwarded_proto: bool,
}

impl SecurityState {
    #[must_use]
    pub fn new(
        engine: AuthDecisionEngine,
        resolver: Arc<dyn AccessPolicyResolver>,
        realm: String,
    ) -> Self {
        Self {
            engine,
            resolver,
            stats: SecurityStats::new(),
            realm,
            trust_forwarded_proto: false,
        }
    }

    /// Treat `X-Forwarded-Proto: https` as proof of secure transport.
    #[must_use]
    pub fn with_trusted_forwarded_proto(mut self, trust: bool) -> Self {
        self.trust_forwarded_proto = trust;
        self
    }

    #[must_use]
    pub fn engine(&self) -> &AuthDecisionEngine {
        &self.engine
    }

    #[must_use]
    pub fn resolver(&self) -> &dyn AccessPolicyResolver {
        self.resolver.as_ref()
    }

    #[must_use]
    pub fn stats(&self) -> &SecurityStats {
        &self.stats
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }
}

impl std::fmt::Debug for SecurityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityState")
            .field("engine", &self.engine)
            .field("stats", &self.stats)
            .field("realm", &self.realm)
            .field("trust_forwarded_proto", &self.trust_forwarded_proto)
            .finish_non_exhaustive()
    }
}

/// Build the application router.
///
/// With `secure` false the security handler is not installed and every
/// document is served as is.
pub fn router(state: Arc<SecurityState>, web_root: &Path, secure: bool) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .fallback_service(ServeDir::new(web_root));

    if secure {
        app = app.layer(middleware::from_fn(handlers::security));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(state)),
    )
}

/// Serve `app` on an already bound listener until ctrl-c.
///
/// # Errors
/// Return error if the server fails
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<SecurityState>, web_root: &Path, secure: bool) -> Result<()> {
    let app = router(state, web_root, secure);

    let listener = TcpListener::bind(format!("[::]:{port}")).await?;

    info!("Listening on [::]:{}", port);

    serve(listener, app).await
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
