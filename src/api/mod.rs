use crate::api::handlers::{
    auth::{self, AuthConfig, AuthState},
    health, root,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::{DefaultBodyLimit, MatchedPath},
    http::{
        HeaderName, HeaderValue, Request,
        header::{CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS},
    },
    routing::{get, options},
};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{Span, error, info, info_span, warn};
use ulid::Ulid;

pub mod handlers;
mod openapi;
pub mod pages;

pub use openapi::openapi;

/// Form bodies are small; anything larger is rejected.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024;

/// Build the application router around `auth_state`.
///
/// Serves the documented routes plus `/` and `GET /logout`, and applies the
/// request id, tracing, body limit and security header layers.
#[must_use]
pub fn router(auth_state: Arc<AuthState>) -> Router {
    let (router, _openapi) = openapi::api_router().split_for_parts();
    router
        .route("/", get(root::root))
        .route("/logout", get(auth::logout))
        .route("/health", options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(SetResponseHeaderLayer::if_not_present(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static("default-src 'self'"),
                ))
                .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
                .layer(Extension(auth_state)),
        )
}

/// Start the server
///
/// Without a `dsn` identities and sessions are kept in memory and are lost
/// on restart.
///
/// # Errors
/// Return error if the database is unreachable, the schema cannot be applied
/// or the listener fails to bind.
pub async fn new(
    port: u16,
    dsn: Option<SecretString>,
    auth_config: AuthConfig,
) -> Result<()> {
    let auth_state = match dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .min_connections(1)
                .max_connections(5)
                .max_lifetime(Duration::from_secs(60 * 2))
                .test_before_acquire(true)
                .connect(dsn.expose_secret())
                .await
                .context("Failed to connect to database")?;

            auth::apply_schema(&pool).await?;

            AuthState::new(
                &auth_config,
                Arc::new(auth::PgIdentityStore::new(pool.clone())),
                Arc::new(auth::PgSessionStore::new(pool)),
            )?
        }
        None => {
            warn!("No DSN configured; using in-memory identity and session stores");
            AuthState::in_memory(&auth_config)?
        }
    };

    let app = router(Arc::new(auth_state));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
        }
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
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
