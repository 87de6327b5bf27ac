//! Stream Worker Framework
//!
//! A generic Redis Streams consumer loop for applying events.
//!
//! ## Features
//!
//! - **Generic worker**: `StreamWorker<J, P, S>` applies any message type
//! - **Consumer groups**: offsets tracked by a Redis consumer group
//! - **Commit policies**: commit on read, or only after the handler succeeded
//! - **Dead Letter Queue**: failing messages parked after `max_deliveries`
//! - **Lifecycle**: observable `Initializing -> Running -> Draining -> Stopped`
//! - **Prometheus metrics**: built-in observability
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{StreamConsumer, StreamDef, StreamWorker, WorkerConfig};
//!
//! struct UserEventStream;
//! impl StreamDef for UserEventStream {
//!     const STREAM_NAME: &'static str = "user-events";
//!     const CONSUMER_GROUP: &'static str = "task-service-group";
//!     const DLQ_STREAM: &'static str = "user-events:dlq";
//! }
//!
//! let config = WorkerConfig::from_stream_def::<UserEventStream>();
//! let source = StreamConsumer::new(redis, config.clone());
//! let worker = StreamWorker::new(source, processor, config);
//! worker.run(shutdown_rx).await?;
//! ```

mod config;
mod consumer;
mod dlq;
mod error;
mod memory;
mod message;
pub mod metrics;
mod producer;
mod registry;
mod source;
mod worker;

pub use config::{CommitPolicy, WorkerConfig};
pub use consumer::{StreamConsumer, StreamInfo};
pub use dlq::{DlqEntry, DlqManager};
pub use error::{ErrorCategory, StreamError};
pub use memory::MemorySource;
pub use message::StreamMessage;
pub use metrics::{StreamMetrics, init_metrics, render_metrics};
pub use producer::StreamProducer;
pub use registry::{MessageKey, StreamDef, StreamJob, StreamProcessor};
pub use source::MessageSource;
pub use worker::{ConsumerState, StreamWorker};
