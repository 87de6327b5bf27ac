//! Stream definitions for the tasks domain.

use stream_worker::StreamDef;

/// User lifecycle events published by the user service.
///
/// A single stream, so events are applied in the order they were published.
pub struct UserEventStream;

impl StreamDef for UserEventStream {
    const STREAM_NAME: &'static str = "user-events";

    /// One logical consumer identity per deployment.
    const CONSUMER_GROUP: &'static str = "task-service-group";

    const DLQ_STREAM: &'static str = "user-events:dlq";
}
