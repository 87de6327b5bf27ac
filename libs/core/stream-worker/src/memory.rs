//! In-memory [`MessageSource`] for tests and local runs.
//!
//! Messages are scripted up front or pushed while the worker runs. The
//! source records what the worker committed, dead-lettered and released so
//! tests can assert on it.

use crate::config::CommitPolicy;
use crate::error::StreamError;
use crate::message::StreamMessage;
use crate::source::MessageSource;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug)]
enum Scripted {
    Message(StreamMessage),
    ReadError(String),
    Close(String),
}

#[derive(Debug, Default)]
struct State {
    script: VecDeque<Scripted>,
    /// Pulled under AfterApply but not committed yet, oldest first.
    unacked: VecDeque<StreamMessage>,
    committed: Vec<String>,
    dead_letters: Vec<(StreamMessage, String)>,
    pulled: usize,
    subscribed: bool,
    released: usize,
    next_seq: u64,
}

/// Scriptable message source
pub struct MemorySource {
    policy: CommitPolicy,
    block_timeout: Duration,
    fail_subscribe: Option<String>,
    state: Mutex<State>,
    notify: Notify,
}

impl MemorySource {
    pub fn new(policy: CommitPolicy) -> Self {
        Self {
            policy,
            block_timeout: Duration::from_millis(50),
            fail_subscribe: None,
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    /// How long `pull` waits for a pushed message before returning `Ok(None)`.
    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }

    /// Make `subscribe` fail with the given reason.
    pub fn failing_subscribe(mut self, reason: impl Into<String>) -> Self {
        self.fail_subscribe = Some(reason.into());
        self
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    fn push(&self, item: Scripted) {
        self.with_state(|s| s.script.push_back(item));
        self.notify.notify_one();
    }

    fn next_id(&self) -> String {
        self.with_state(|s| {
            s.next_seq += 1;
            format!("mem-{}", s.next_seq)
        })
    }

    /// Queue a raw payload under an optional key. Returns the entry ID.
    pub fn push_payload(&self, key: Option<&str>, payload: impl Into<String>) -> String {
        let id = self.next_id();
        let message = StreamMessage::new(id.clone(), key.map(str::to_string), Some(payload.into()));
        self.push(Scripted::Message(message));
        id
    }

    /// Queue payload bytes exactly as a broker would hand them over.
    pub fn push_bytes(&self, key: Option<&str>, payload: impl Into<Vec<u8>>) -> String {
        let id = self.next_id();
        let key = key.map(|k| k.as_bytes().to_vec());
        let message = StreamMessage::from_bytes(id.clone(), key, Some(payload.into()));
        self.push(Scripted::Message(message));
        id
    }

    /// Queue a JSON-serialized value.
    pub fn push_json<T: Serialize>(&self, key: Option<&str>, value: &T) -> Result<String, StreamError> {
        let payload = serde_json::to_string(value)?;
        Ok(self.push_payload(key, payload))
    }

    /// Queue a recoverable read failure.
    pub fn push_read_error(&self, reason: impl Into<String>) {
        self.push(Scripted::ReadError(reason.into()));
    }

    /// Queue an irrecoverable closure of the subscription.
    pub fn push_close(&self, reason: impl Into<String>) {
        self.push(Scripted::Close(reason.into()));
    }

    pub fn committed(&self) -> Vec<String> {
        self.with_state(|s| s.committed.clone())
    }

    pub fn dead_letters(&self) -> Vec<(StreamMessage, String)> {
        self.with_state(|s| s.dead_letters.clone())
    }

    /// Messages handed to the worker, redeliveries included.
    pub fn pulled(&self) -> usize {
        self.with_state(|s| s.pulled)
    }

    /// Scripted items not pulled yet.
    pub fn remaining(&self) -> usize {
        self.with_state(|s| s.script.len())
    }

    pub fn is_subscribed(&self) -> bool {
        self.with_state(|s| s.subscribed)
    }

    /// How many times `release` actually released.
    pub fn release_count(&self) -> usize {
        self.with_state(|s| s.released)
    }

    fn next(&self) -> Option<Result<StreamMessage, StreamError>> {
        self.with_state(|s| {
            if self.policy == CommitPolicy::AfterApply
                && let Some(oldest) = s.unacked.front_mut()
            {
                oldest.delivery_count += 1;
                s.pulled += 1;
                return Some(Ok(oldest.clone()));
            }

            match s.script.pop_front()? {
                Scripted::Message(message) => {
                    s.pulled += 1;
                    match self.policy {
                        CommitPolicy::OnRead => s.committed.push(message.id.clone()),
                        CommitPolicy::AfterApply => s.unacked.push_back(message.clone()),
                    }
                    Some(Ok(message))
                }
                Scripted::ReadError(reason) => Some(Err(StreamError::Internal(reason))),
                Scripted::Close(reason) => Some(Err(StreamError::Closed(reason))),
            }
        })
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(CommitPolicy::OnRead)
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn subscribe(&self) -> Result<(), StreamError> {
        if let Some(reason) = &self.fail_subscribe {
            return Err(StreamError::Config(reason.clone()));
        }
        self.with_state(|s| s.subscribed = true);
        Ok(())
    }

    async fn pull(&self) -> Result<Option<StreamMessage>, StreamError> {
        if let Some(next) = self.next() {
            return next.map(Some);
        }

        let notified = self.notify.notified();
        if tokio::time::timeout(self.block_timeout, notified).await.is_err() {
            return Ok(None);
        }
        self.next().transpose()
    }

    async fn commit(&self, message: &StreamMessage) -> Result<(), StreamError> {
        if self.policy == CommitPolicy::AfterApply {
            self.with_state(|s| {
                s.unacked.retain(|m| m.id != message.id);
                s.committed.push(message.id.clone());
            });
        }
        Ok(())
    }

    async fn dead_letter(&self, message: &StreamMessage, reason: &str) -> Result<(), StreamError> {
        self.with_state(|s| s.dead_letters.push((message.clone(), reason.to_string())));
        Ok(())
    }

    async fn release(&self) -> Result<(), StreamError> {
        self.with_state(|s| {
            if s.subscribed {
                s.subscribed = false;
                s.released += 1;
            }
        });
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
