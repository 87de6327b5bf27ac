use crate::errors::handlers::not_found;
use crate::http::create_permissive_cors_layer;
use axum::Router;
use core_config::server::ServerConfig;
use std::future::Future;
use std::io;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Serves `router` until `shutdown` resolves, then drains in-flight requests.
///
/// # Errors
/// Returns an error if the listener fails to bind or the server fails while
/// running.
pub async fn serve<F>(router: Router, server_config: &ServerConfig, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(server_config.address()).await?;

    info!("Server starting on {}", listener.local_addr()?);
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .inspect_err(|e| {
            tracing::error!("Server encountered an error: {:?}", e);
        })?;

    info!("Server stopped");
    Ok(())
}

/// Combines API routes with documentation and cross-cutting layers.
///
/// This function sets up:
/// - Swagger UI at `/swagger-ui`, OpenAPI document at `/api-docs/openapi.json`
/// - The given routes, unprefixed (they carry their own paths)
/// - Request tracing and permissive CORS
/// - 404 fallback handler
///
/// Health and metrics endpoints are merged by the app.
///
/// # Type Parameters
/// * `T` - A type implementing `utoipa::OpenApi` for API documentation
pub fn create_router<T>(apis: Router) -> Router
where
    T: OpenApi + 'static,
{
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", T::openapi()))
        .merge(apis)
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(create_permissive_cors_layer())
}
