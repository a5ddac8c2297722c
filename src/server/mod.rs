//! HTTP API
//!
//! Routes:
//! - `POST /api/v1/remove-bg/binary` multipart upload (field `image`)
//! - `POST /api/v1/remove-bg/url` JSON `{"image_url": "..."}`
//! - `GET /health`, `GET /`

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ErrorResponse, ValidatedJson};
pub use extract::ApiKey;
pub use handlers::{ImageDimensions, SuccessResponse, UrlRequest};
pub use state::AppState;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::Uri;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower::util::MapRequest;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Largest accepted image, in bytes
pub const MAX_IMAGE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Request body limit; leaves room for multipart framing around a maximal image
pub const REQUEST_BODY_LIMIT: usize = MAX_IMAGE_SIZE_BYTES + 2 * 1024 * 1024;

/// Accepted declared content types (compared case-insensitively)
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg", "image/webp"];

/// Multipart field carrying the upload
pub const IMAGE_FIELD: &str = "image";

/// Router wrapped with path normalization
pub type App = MapRequest<Router, fn(Request) -> Request>;

/// Build the router with all routes and layers
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/v1/remove-bg/binary", post(handlers::remove_bg_binary))
        .route("/api/v1/remove-bg/url", post(handlers::remove_bg_url))
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .layer(DefaultBodyLimit::max(REQUEST_BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Router plus repeated-slash collapsing, which must run before routing
pub fn create_app(state: AppState) -> App {
    MapRequest::new(
        create_router(state),
        collapse_repeated_slashes as fn(Request) -> Request,
    )
}

/// Rewrite `//api//v1/x` to `/api/v1/x`, keeping the query string
pub fn collapse_repeated_slashes(mut request: Request) -> Request {
    let uri = request.uri();
    if !uri.path().contains("//") {
        return request;
    }

    let mut path = String::with_capacity(uri.path().len());
    for ch in uri.path().chars() {
        if ch == '/' && path.ends_with('/') {
            continue;
        }
        path.push(ch);
    }
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    let mut parts = uri.clone().into_parts();
    if let Ok(path_and_query) = path_and_query.parse() {
        parts.path_and_query = Some(path_and_query);
        if let Ok(uri) = Uri::from_parts(parts) {
            *request.uri_mut() = uri;
        }
    }
    request
}

/// Serve on `address` until Ctrl+C or SIGTERM
///
/// # Errors
/// - Binding the listener fails
/// - The server exits with an I/O error
pub async fn serve(address: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening");

    let app = create_app(state);
    axum::serve(
        listener,
        axum::ServiceExt::<Request>::into_make_service(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received terminate signal"),
    }
}
