//! PostgreSQL connector for the task store.

mod config;
mod connector;
mod health;

pub use config::{DEFAULT_DATABASE_URL, PostgresConfig};
pub use connector::{connect_from_config, connect_from_config_with_retry};
pub use health::check_health;

pub use sea_orm::{DatabaseConnection, DbErr};
