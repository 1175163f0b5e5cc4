//! Message queue for external log/message layers.
//!
//! Every message is mirrored to `tracing` at the matching level, kept in a
//! bounded queue for polling, and forwarded to channel subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

const MAX_QUEUED: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Message {
    pub severity: Severity,
    pub tag: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.severity,
            self.tag,
            self.text
        )
    }
}

#[derive(Default)]
struct QueueInner {
    messages: VecDeque<Message>,
    subscribers: Vec<Sender<Message>>,
}

/// Cheaply cloneable handle; clones share the same queue.
#[derive(Clone, Default)]
pub struct MessageQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, severity: Severity, tag: impl Into<String>, text: impl Into<String>) {
        let msg = Message {
            severity,
            tag: tag.into(),
            text: text.into(),
            timestamp: Utc::now(),
        };
        match severity {
            Severity::Debug => tracing::debug!(tag = %msg.tag, "{}", msg.text),
            Severity::Info => tracing::info!(tag = %msg.tag, "{}", msg.text),
            Severity::Warning => tracing::warn!(tag = %msg.tag, "{}", msg.text),
            Severity::Error | Severity::Fatal => tracing::error!(tag = %msg.tag, "{}", msg.text),
        }

        let mut inner = self.lock();
        inner.subscribers.retain(|tx| tx.send(msg.clone()).is_ok());
        if inner.messages.len() == MAX_QUEUED {
            inner.messages.pop_front();
        }
        inner.messages.push_back(msg);
    }

    pub fn info(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.push(Severity::Info, tag, text);
    }

    pub fn warn(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.push(Severity::Warning, tag, text);
    }

    pub fn error(&self, tag: impl Into<String>, text: impl Into<String>) {
        self.push(Severity::Error, tag, text);
    }

    /// Take every queued message, oldest first.
    pub fn drain(&self) -> Vec<Message> {
        self.lock().messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive every message pushed from now on.
    pub fn subscribe(&self) -> Receiver<Message> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageQueue")
            .field("queued", &self.len())
            .finish()
    }
}
