use std::any::Any;

use anyhow::Context;
use axum::{
    http::{HeaderValue, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, request_log_middleware};
use crate::state::AppState;

/// Build the full router over a shared state.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(request_log_middleware))
        .layer(TraceLayer::new_for_http());

    let router = match cors_layer(crate::config::config()) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    use axum::routing::post;

    Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/register", post(public::register))
        .route("/login", post(public::login))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use protected::{account, notes, tags};

    Router::new()
        .route("/me", get(account::whoami).delete(account::delete_account))
        .route("/notes", get(notes::list).post(notes::create))
        .route("/notes/:id", get(notes::get).put(notes::update).delete(notes::delete))
        .route("/tags", get(tags::list))
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if !config.security.enable_cors {
        return None;
    }
    if config.allows_any_origin() {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin),
    )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    };
    error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal server error" })),
    )
        .into_response()
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(
        "{} v{} listening on http://{}",
        crate::config::config().app_name,
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    axum::serve(listener, app(state)).await.context("server error")?;
    Ok(())
}
