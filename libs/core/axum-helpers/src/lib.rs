//! # Axum Helpers
//!
//! A collection of utilities and helpers for building Axum web applications.
//!
//! ## Modules
//!
//! - **[`server`]**: Router setup, health checks, graceful shutdown
//! - **[`http`]**: HTTP middleware (CORS)
//! - **[`errors`]**: Structured error responses with error codes
//! - **[`extractors`]**: Custom extractors (numeric id path, validated JSON)
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum_helpers::server::{create_router, health_router, serve};
//! use core_config::{app_info, server::ServerConfig};
//!
//! let router = create_router::<ApiDoc>(api_routes).merge(health_router(app_info!()));
//! serve(router, &ServerConfig::default(), shutdown_signal()).await?;
//! ```

pub mod errors;
pub mod extractors;
pub mod http;
pub mod server;

// Re-export server types
pub use server::{
    HealthCheckFuture, HealthResponse, ShutdownCoordinator, create_router, health_router,
    run_health_checks, serve, shutdown_signal,
};

// Re-export HTTP middleware
pub use http::create_permissive_cors_layer;

// Re-export error types
pub use errors::{AppError, ErrorCode, ErrorResponse};

// Re-export extractors
pub use extractors::{IdPath, ValidatedJson};
