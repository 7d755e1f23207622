use anyhow::{Context, Result};
use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

use markbook_core::Markbook;

mod auth;
mod dto;
mod error;
mod handlers;
mod security;

#[cfg(test)]
mod tests;

#[derive(Clone)]
pub(crate) struct WebState {
    pub(crate) app: Markbook,
}

/// Start the REST API server and block until shutdown.
///
/// # Errors
/// Returns an error when the cold-start index build fails, the runtime
/// cannot be created, the socket cannot be bound, or the server exits with
/// a runtime failure.
pub fn serve_web(app: Markbook, host: &str, port: u16) -> Result<()> {
    // An index must exist before the first request arrives; a cold scan
    // inside a handler would serve its latency to an unlucky caller.
    let index = app
        .assignment_index()
        .context("cold-start index build failed; refusing to serve")?;
    println!(
        "index ready: {} assignments across {} subjects",
        index.assignments.len(),
        index.subjects.len()
    );

    let state = WebState { app };
    let bind_addr = format!("{host}:{port}");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build web runtime")?;

    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind web server at {bind_addr}"))?;
        println!("markbook api listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app_router(state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await
            .context("web server failed")
    })
}

pub(crate) fn app_router(state: WebState) -> Router {
    let protected = Router::new()
        .route("/api/operator/assignments", get(handlers::list_assignments))
        .route("/api/operator/assignments", post(handlers::create_assignment))
        .route(
            "/api/operator/assignments/{subject}/{name}",
            get(handlers::get_assignment),
        )
        .route(
            "/api/operator/assignments/{subject}/{name}",
            put(handlers::update_assignment),
        )
        .route(
            "/api/operator/assignments/{subject}/{name}",
            delete(handlers::delete_assignment),
        )
        .route("/api/operator/tokens", get(handlers::list_tokens))
        .route("/api/operator/tokens", post(handlers::create_token))
        .route("/api/operator/whitelist", get(handlers::list_whitelist))
        .route("/api/operator/whitelist", post(handlers::add_to_whitelist))
        .route(
            "/api/operator/whitelist/{token}",
            delete(handlers::remove_from_whitelist),
        )
        .route("/api/marker/mark", post(handlers::mark_submission))
        .route("/api/admin/rebuild-index", post(handlers::rebuild_index))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token_middleware,
        ));

    Router::new()
        .route("/", get(handlers::health))
        .route("/api/operator/login", post(handlers::login))
        .merge(protected)
        .layer(middleware::from_fn(security::security_headers_middleware))
        .with_state(state)
}
