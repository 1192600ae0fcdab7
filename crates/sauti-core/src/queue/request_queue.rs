use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{oneshot, Mutex, Notify};
use tracing::{debug, info};

use crate::engine::{TtsOverrides, TtsResult};
use crate::error::{Error, Result};

const TEXT_PREVIEW_CHARS: usize = 50;

/// A synthesis request traveling through the queue.
///
/// Dropping an item unfulfilled also drops `respond_to`, which the
/// submitter observes as a closed channel.
#[derive(Debug)]
pub struct QueueItem {
    pub request_id: u64,
    pub caller_id: String,
    pub character: String,
    pub text: String,
    /// Per-request parameter overrides the worker forwards to the engine.
    pub overrides: Option<TtsOverrides>,
    pub submitted_at: Instant,
    pub respond_to: oneshot::Sender<Result<TtsResult>>,
}

impl QueueItem {
    /// Build an item together with the receiver its result arrives on.
    pub fn new(
        request_id: u64,
        caller_id: impl Into<String>,
        character: impl Into<String>,
        text: impl Into<String>,
    ) -> (Self, oneshot::Receiver<Result<TtsResult>>) {
        let (respond_to, rx) = oneshot::channel();
        let item = Self {
            request_id,
            caller_id: caller_id.into(),
            character: character.into(),
            text: text.into(),
            overrides: None,
            submitted_at: Instant::now(),
            respond_to,
        };
        (item, rx)
    }

    fn snapshot(&self) -> QueueItemState {
        QueueItemState {
            request_id: self.request_id,
            caller_id: self.caller_id.clone(),
            character: self.character.clone(),
            text: truncate_string(&self.text, TEXT_PREVIEW_CHARS),
            queued_ms: self.submitted_at.elapsed().as_millis() as u64,
        }
    }
}

/// Display snapshot of one queued or in-flight request.
#[derive(Debug, Clone, Serialize)]
pub struct QueueItemState {
    pub request_id: u64,
    pub caller_id: String,
    pub character: String,
    /// Request text truncated for display.
    pub text: String,
    pub queued_ms: u64,
}

/// Point-in-time view of the whole queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueState {
    pub depth: usize,
    pub max_depth: usize,
    pub processing: Option<QueueItemState>,
    pub pending: Vec<QueueItemState>,
}

struct QueueInner {
    pending: VecDeque<QueueItem>,
    processing: Option<QueueItemState>,
}

struct QueueShared {
    inner: Mutex<QueueInner>,
    notify: Notify,
    max_depth: usize,
}

/// Submitting half of the request queue. Cheap to clone.
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<QueueShared>,
}

/// Receiving half of the request queue.
///
/// There is exactly one consumer and it is not cloneable, so at most one
/// request is in flight at a time. [`QueueConsumer::dequeue`] claims the
/// processing slot; [`QueueConsumer::mark_done`] releases it whether the
/// request succeeded or failed.
pub struct QueueConsumer {
    shared: Arc<QueueShared>,
}

impl RequestQueue {
    /// Create a queue bounded at `max_depth` pending items, returning the
    /// submit handle and the single consumer.
    pub fn new(max_depth: usize) -> (RequestQueue, QueueConsumer) {
        let shared = Arc::new(QueueShared {
            inner: Mutex::new(QueueInner {
                pending: VecDeque::new(),
                processing: None,
            }),
            notify: Notify::new(),
            max_depth,
        });
        (
            RequestQueue {
                shared: Arc::clone(&shared),
            },
            QueueConsumer { shared },
        )
    }

    /// Add a request. Returns its 1-based position among pending items.
    ///
    /// A full queue rejects immediately; submission never waits for the
    /// worker.
    pub async fn submit(&self, item: QueueItem) -> Result<usize> {
        let request_id = item.request_id;
        let position = {
            let mut inner = self.shared.inner.lock().await;
            if inner.pending.len() >= self.shared.max_depth {
                return Err(Error::QueueFull(self.shared.max_depth));
            }
            inner.pending.push_back(item);
            inner.pending.len()
        };
        self.shared.notify.notify_one();
        info!("Queued request {} at position {}", request_id, position);
        Ok(position)
    }

    /// Remove a pending request. The in-flight request cannot be cancelled.
    pub async fn cancel(&self, request_id: u64) -> bool {
        let mut inner = self.shared.inner.lock().await;
        let before = inner.pending.len();
        inner.pending.retain(|item| item.request_id != request_id);
        let removed = inner.pending.len() < before;
        if removed {
            info!("Cancelled request {}", request_id);
        }
        removed
    }

    /// Move a pending request to the front of the queue.
    pub async fn bump(&self, request_id: u64) -> bool {
        let mut inner = self.shared.inner.lock().await;
        let Some(index) = inner
            .pending
            .iter()
            .position(|item| item.request_id == request_id)
        else {
            return false;
        };
        if let Some(item) = inner.pending.remove(index) {
            inner.pending.push_front(item);
            info!("Bumped request {} to front of queue", request_id);
            true
        } else {
            false
        }
    }

    /// 1-based position of a pending request, if still pending.
    pub async fn position(&self, request_id: u64) -> Option<usize> {
        let inner = self.shared.inner.lock().await;
        inner
            .pending
            .iter()
            .position(|item| item.request_id == request_id)
            .map(|index| index + 1)
    }

    /// Snapshot of the in-flight slot and pending items, in queue order.
    pub async fn state(&self) -> QueueState {
        let inner = self.shared.inner.lock().await;
        QueueState {
            depth: inner.pending.len(),
            max_depth: self.shared.max_depth,
            processing: inner.processing.clone(),
            pending: inner.pending.iter().map(QueueItem::snapshot).collect(),
        }
    }

    pub async fn depth(&self) -> usize {
        self.shared.inner.lock().await.pending.len()
    }

    pub async fn is_full(&self) -> bool {
        self.shared.inner.lock().await.pending.len() >= self.shared.max_depth
    }

    pub fn max_depth(&self) -> usize {
        self.shared.max_depth
    }
}

impl QueueConsumer {
    /// Wait for the next request and claim the processing slot.
    ///
    /// This is an await point, so a worker task blocked here is stopped by
    /// aborting the task.
    pub async fn dequeue(&mut self) -> QueueItem {
        loop {
            let notified = self.shared.notify.notified();
            {
                let mut inner = self.shared.inner.lock().await;
                if let Some(item) = inner.pending.pop_front() {
                    inner.processing = Some(item.snapshot());
                    debug!("Dequeued request {}", item.request_id);
                    return item;
                }
            }
            notified.await;
        }
    }

    /// Release the processing slot after finishing a request, successful
    /// or not.
    pub async fn mark_done(&mut self) {
        let mut inner = self.shared.inner.lock().await;
        inner.processing = None;
    }
}

fn truncate_string(input: &str, max_chars: usize) -> String {
    let mut result = String::new();
    for (idx, ch) in input.chars().enumerate() {
        if idx >= max_chars {
            break;
        }
        result.push(ch);
    }

    if input.chars().count() > max_chars {
        result.push_str("...");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn item(request_id: u64) -> (QueueItem, oneshot::Receiver<Result<TtsResult>>) {
        QueueItem::new(request_id, "caller", "marcus", "hello there")
    }

    #[tokio::test]
    async fn rejects_submissions_beyond_max_depth() {
        let (queue, mut consumer) = RequestQueue::new(2);

        let (a, _rx_a) = item(1);
        let (b, _rx_b) = item(2);
        let (c, _rx_c) = item(3);
        assert_eq!(queue.submit(a).await.unwrap(), 1);
        assert_eq!(queue.submit(b).await.unwrap(), 2);
        match queue.submit(c).await {
            Err(Error::QueueFull(2)) => {}
            other => panic!("expected QueueFull, got {:?}", other),
        }
        assert!(queue.is_full().await);

        // Draining one slot makes room again.
        let first = consumer.dequeue().await;
        assert_eq!(first.request_id, 1);
        let (c, _rx_c) = item(3);
        assert_eq!(queue.submit(c).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_waits_for_a_submission() {
        let (queue, mut consumer) = RequestQueue::new(4);

        let submitter = tokio::spawn({
            let queue = queue.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let (queued, _rx) = QueueItem::new(7, "caller", "marcus", "hi");
                queue.submit(queued).await.unwrap();
            }
        });

        let received = consumer.dequeue().await;
        assert_eq!(received.request_id, 7);
        submitter.await.unwrap();
    }

    #[tokio::test]
    async fn dequeue_is_fifo_except_for_bumps() {
        let (queue, mut consumer) = RequestQueue::new(4);
        for id in 1..=3 {
            let (queued, _rx) = item(id);
            queue.submit(queued).await.unwrap();
        }

        assert!(queue.bump(3).await);
        assert!(!queue.bump(99).await);

        let mut order = Vec::new();
        for _ in 0..3 {
            let next = consumer.dequeue().await;
            order.push(next.request_id);
            consumer.mark_done().await;
        }
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn cancel_removes_pending_and_closes_its_channel() {
        let (queue, _consumer) = RequestQueue::new(4);
        let (queued, rx) = item(1);
        queue.submit(queued).await.unwrap();

        assert!(queue.cancel(1).await);
        assert!(rx.await.is_err());
        assert!(!queue.cancel(1).await);
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn cancel_does_not_reach_the_in_flight_request() {
        let (queue, mut consumer) = RequestQueue::new(4);
        let (queued, _rx) = item(1);
        queue.submit(queued).await.unwrap();

        let in_flight = consumer.dequeue().await;
        assert_eq!(in_flight.request_id, 1);
        assert!(!queue.cancel(1).await);

        let snapshot = queue.state().await;
        assert_eq!(snapshot.processing.as_ref().map(|s| s.request_id), Some(1));

        consumer.mark_done().await;
        assert!(queue.state().await.processing.is_none());
    }

    #[tokio::test]
    async fn positions_are_one_based_and_follow_queue_order() {
        let (queue, _consumer) = RequestQueue::new(4);
        for id in 1..=3 {
            let (queued, _rx) = item(id);
            queue.submit(queued).await.unwrap();
        }

        assert_eq!(queue.position(1).await, Some(1));
        assert_eq!(queue.position(3).await, Some(3));
        assert_eq!(queue.position(99).await, None);

        assert!(queue.bump(3).await);
        assert_eq!(queue.position(3).await, Some(1));
        assert_eq!(queue.position(1).await, Some(2));
    }

    #[tokio::test]
    async fn state_truncates_long_text_for_display() {
        let (queue, _consumer) = RequestQueue::new(4);
        let long_text = "a".repeat(120);
        let (queued, _rx) = QueueItem::new(1, "caller", "marcus", long_text.clone());
        queue.submit(queued).await.unwrap();

        let snapshot = queue.state().await;
        assert_eq!(snapshot.depth, 1);
        assert_eq!(snapshot.max_depth, 4);
        let text = &snapshot.pending[0].text;
        assert!(text.len() <= TEXT_PREVIEW_CHARS + 3);
        assert!(text.ends_with("..."));
    }
}
