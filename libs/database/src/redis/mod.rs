//! Redis connector for the event stream broker.

mod config;
mod connector;
mod health;

pub use config::{DEFAULT_REDIS_URL, RedisConfig};
pub use connector::{connect, connect_from_config_with_retry};
pub use health::check_health;

pub use redis::aio::ConnectionManager;
