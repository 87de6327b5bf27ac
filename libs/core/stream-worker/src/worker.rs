//! The generic StreamWorker loop.
//!
//! One worker drives one [`MessageSource`]: it pulls a message, decodes it,
//! hands it to the processor, and commits according to the configured
//! [`CommitPolicy`]. Messages are applied strictly one at a time, in the order
//! they are pulled.

use crate::config::{CommitPolicy, WorkerConfig};
use crate::error::StreamError;
use crate::message::StreamMessage;
use crate::metrics::StreamMetrics;
use crate::registry::{StreamJob, StreamProcessor};
use crate::source::MessageSource;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::{AsRefStr, Display};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Lifecycle of a worker.
///
/// `Initializing -> Running -> Draining -> Stopped`. A worker whose
/// subscription fails goes straight from `Initializing` to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConsumerState {
    Initializing,
    Running,
    Draining,
    Stopped,
}

/// Generic stream worker that applies messages with a processor.
///
/// # Type Parameters
///
/// * `J` - The decoded message type
/// * `P` - The processor applying `J`
/// * `S` - Where messages come from
pub struct StreamWorker<J, P, S>
where
    J: StreamJob,
    P: StreamProcessor<J>,
    S: MessageSource,
{
    source: Arc<S>,
    processor: Arc<P>,
    config: WorkerConfig,
    metrics: StreamMetrics,
    state: watch::Sender<ConsumerState>,
    _phantom: PhantomData<fn() -> J>,
}

impl<J, P, S> StreamWorker<J, P, S>
where
    J: StreamJob,
    P: StreamProcessor<J>,
    S: MessageSource,
{
    /// Create a new stream worker.
    pub fn new(source: S, processor: P, config: WorkerConfig) -> Self {
        Self::with_arcs(Arc::new(source), Arc::new(processor), config)
    }

    /// Create a worker over shared source and processor handles.
    pub fn with_arcs(source: Arc<S>, processor: Arc<P>, config: WorkerConfig) -> Self {
        let metrics = StreamMetrics::new(config.stream_name.clone(), processor.name());
        let (state, _) = watch::channel(ConsumerState::Initializing);
        Self {
            source,
            processor,
            config,
            metrics,
            state,
            _phantom: PhantomData,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsumerState {
        *self.state.borrow()
    }

    /// Observe lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConsumerState> {
        self.state.subscribe()
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn set_state(&self, next: ConsumerState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Consumer state changed");
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Returns `Ok(())` after a requested shutdown. Returns the error when the
    /// subscription could not be established or was irrecoverably closed.
    /// The subscription is released on every exit path.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), StreamError> {
        self.set_state(ConsumerState::Initializing);
        info!(
            subscription = %self.source.describe(),
            processor = %self.processor.name(),
            commit_policy = %self.config.commit_policy,
            "Starting stream worker"
        );

        if let Err(e) = self.source.subscribe().await {
            error!(error = %e, "Failed to subscribe, stream worker not started");
            self.stop().await;
            return Err(e);
        }

        self.set_state(ConsumerState::Running);
        let outcome = self.consume(&mut shutdown).await;

        self.set_state(ConsumerState::Draining);
        self.stop().await;
        outcome
    }

    async fn consume(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), StreamError> {
        loop {
            if *shutdown.borrow() {
                info!("Received shutdown signal, stopping worker");
                return Ok(());
            }

            let pulled = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Received shutdown signal while waiting for messages");
                        return Ok(());
                    }
                    continue;
                }
                pulled = self.source.pull() => pulled,
            };

            match pulled {
                Ok(Some(message)) => self.handle(message, shutdown).await,
                Ok(None) => debug!("BLOCK timeout - no messages, continuing"),
                Err(e) if e.is_closed() => {
                    error!(error = %e, "Subscription closed, stopping worker");
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read from stream, retrying");
                    self.metrics.read_error();
                    pause(Duration::from_millis(self.config.read_error_backoff_ms), shutdown).await;
                }
            }
        }
    }

    /// Apply one message. Never fails: outcomes are logged and committed
    /// according to the policy.
    async fn handle(&self, message: StreamMessage, shutdown: &mut watch::Receiver<bool>) {
        let started = Instant::now();
        let after_apply = self.config.commit_policy == CommitPolicy::AfterApply;
        self.metrics.message_received();

        let job: J = match message.decode() {
            Ok(job) => job,
            Err(e) => {
                warn!(
                    message_id = %message.id,
                    key = ?message.key,
                    error = %e,
                    "Dropping malformed message"
                );
                self.metrics.message_malformed();
                if after_apply {
                    self.commit(&message).await;
                }
                return;
            }
        };

        if after_apply && message.delivery_count > self.config.max_deliveries {
            warn!(
                message_id = %message.id,
                job_id = %job.job_id(),
                delivery_count = message.delivery_count,
                "Delivery limit exceeded"
            );
            self.dead_letter(&message, "exceeded max deliveries").await;
            return;
        }

        debug!(
            message_id = %message.id,
            job_id = %job.job_id(),
            delivery_count = message.delivery_count,
            "Dispatching message"
        );

        match self.processor.process(&job).await {
            Ok(()) => {
                self.metrics.message_processed(started.elapsed());
                if after_apply {
                    self.commit(&message).await;
                }
            }
            Err(e) => {
                let category = e.category();
                error!(
                    message_id = %message.id,
                    job_id = %job.job_id(),
                    error = %e,
                    category = category.as_str(),
                    "Message handler failed"
                );
                self.metrics.message_failed(category);

                if !after_apply {
                    return;
                }
                if category.should_retry() {
                    info!(message_id = %message.id, "Leaving message pending for redelivery");
                    pause(Duration::from_millis(self.config.redelivery_delay_ms), shutdown).await;
                } else {
                    self.dead_letter(&message, &e.to_string()).await;
                }
            }
        }
    }

    async fn commit(&self, message: &StreamMessage) {
        if let Err(e) = self.source.commit(message).await {
            warn!(message_id = %message.id, error = %e, "Failed to commit message");
        }
    }

    /// Dead-letter then commit; a message that could not be parked stays pending.
    async fn dead_letter(&self, message: &StreamMessage, reason: &str) {
        match self.source.dead_letter(message, reason).await {
            Ok(()) => {
                self.metrics.message_dead_lettered();
                self.commit(message).await;
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "Failed to dead-letter message");
            }
        }
    }

    async fn stop(&self) {
        if let Err(e) = self.source.release().await {
            warn!(error = %e, "Failed to release subscription");
        }
        self.set_state(ConsumerState::Stopped);
        info!("Stream worker stopped");
    }
}

/// Sleep unless shutdown is requested first.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) {
    if duration.is_zero() {
        return;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = shutdown.changed() => {}
    }
}
