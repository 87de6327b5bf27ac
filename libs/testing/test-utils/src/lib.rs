//! Shared test utilities
//!
//! This crate provides reusable test infrastructure:
//! - `TestDatabase`: PostgreSQL container with automatic cleanup (feature: "postgres")
//! - `TestRedis`: Redis container with automatic cleanup (feature: "redis")
//! - `TestDataBuilder`: Deterministic test data generation (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Features
//!
//! - `postgres` (default): Enables PostgreSQL test infrastructure
//! - `redis`: Enables Redis test infrastructure
//! - `all`: Enables everything
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let user_id = builder.user_id();
//!     let title = builder.name("task", "main");
//! }
//! ```
//!
//! For Redis, add `features = ["redis"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

#[cfg(feature = "redis")]
pub use redis::TestRedis;

/// Builder for test data with deterministic randomization
///
/// Tests sharing one container stay apart by deriving ids and names from
/// their own name.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_seed_tasks");
    /// assert!(builder.user_id() >= 1);
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// A positive user id that fits a BIGINT column
    pub fn user_id(&self) -> u64 {
        (self.seed % (i64::MAX as u64 - 1)) + 1
    }

    /// A second user id, distinct from [`user_id`](Self::user_id)
    pub fn other_user_id(&self) -> u64 {
        self.user_id() + 1
    }

    /// Generate a unique name for testing
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.name("task", "main"), "test-task-7-main");
    /// ```
    pub fn name(&self, prefix: &str, suffix: &str) -> String {
        format!("test-{}-{}-{}", prefix, self.seed, suffix)
    }
}

/// Test assertion helpers
pub mod assertions {
    use std::fmt::Debug;

    /// Assert that an Option is Some and return the value
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        match value {
            Some(v) => v,
            None => panic!("{}: expected Some, got None", context),
        }
    }

    /// Assert that `items` projected through `field` equal `expected`, in order
    pub fn assert_fields<T, F, V>(items: &[T], field: F, expected: &[V], context: &str)
    where
        F: Fn(&T) -> V,
        V: PartialEq + Debug,
    {
        let actual: Vec<V> = items.iter().map(field).collect();
        assert_eq!(actual.as_slice(), expected, "{}", context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_builder_deterministic() {
        let builder1 = TestDataBuilder::new(42);
        let builder2 = TestDataBuilder::new(42);

        assert_eq!(builder1.user_id(), builder2.user_id());
        assert_eq!(builder1.name("task", "test"), builder2.name("task", "test"));
    }

    #[test]
    fn test_user_ids_fit_bigint() {
        let builder = TestDataBuilder::new(u64::MAX);
        assert!(builder.user_id() >= 1);
        assert!(i64::try_from(builder.user_id()).is_ok());
        assert!(i64::try_from(builder.other_user_id()).is_ok());
        assert_ne!(builder.user_id(), builder.other_user_id());
    }

    #[test]
    fn test_data_builder_different_names() {
        let builder1 = TestDataBuilder::from_test_name("test1");
        let builder2 = TestDataBuilder::from_test_name("test2");

        assert_ne!(builder1.user_id(), builder2.user_id());
    }
}
