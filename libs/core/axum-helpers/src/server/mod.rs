//! Server infrastructure module.
//!
//! This module provides:
//! - Router setup with OpenAPI documentation
//! - Health and readiness endpoints
//! - Graceful shutdown coordination
//!
//! ```ignore
//! use axum_helpers::server::{create_router, health_router, serve};
//! use core_config::app_info;
//!
//! let app = create_router::<ApiDoc>(api_routes).merge(health_router(app_info!()));
//! serve(app, &config, coordinator.wait()).await?;
//! ```

pub mod app;
pub mod health;
pub mod shutdown;

pub use app::{create_router, serve};
pub use health::{HealthCheckFuture, HealthResponse, health_router, run_health_checks};
pub use shutdown::{ShutdownCoordinator, shutdown_signal};
