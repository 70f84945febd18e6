//! In-process crawl frontier
//!
//! This module provides:
//! - The `Frontier` trait the coordinator pulls requests from
//! - `MemoryFrontier`, a FIFO queue with canonical-URL duplicate filtering
//! - Delayed re-entry for retries, realized as a timer task so no worker
//!   sleeps while a request waits

use crate::model::TraversalRequest;
use crate::url::canonicalize_url;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

/// Queue of requests waiting to be dispatched
#[async_trait]
pub trait Frontier: Send + Sync {
    /// Enqueues a request; returns false when it was filtered as a duplicate
    fn push(&self, request: TraversalRequest) -> bool;

    /// Enqueues a request once `delay` has elapsed, without blocking the caller
    fn push_after(&self, request: TraversalRequest, delay: Duration);

    /// Takes the next ready request
    fn pop(&self) -> Option<TraversalRequest>;

    /// Requests ready for dispatch
    fn len(&self) -> usize;

    /// Requests waiting on a delay
    fn delayed(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// No request is ready or waiting on a delay
    fn is_idle(&self) -> bool {
        self.is_empty() && self.delayed() == 0
    }

    /// Waits until a request may have been added
    async fn changed(&self);
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<TraversalRequest>,
    seen: HashSet<String>,
    delayed: usize,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enqueue(&self, request: TraversalRequest) -> bool {
        let accepted = enqueue_locked(&mut self.lock(), request);
        if accepted {
            self.notify.notify_one();
        }
        accepted
    }

    /// Moves a delayed request into the queue
    ///
    /// The delayed count drops in the same critical section that enqueues,
    /// so no observer sees the request in neither place.
    fn release_delayed(&self, request: TraversalRequest) -> bool {
        let accepted = {
            let mut state = self.lock();
            state.delayed = state.delayed.saturating_sub(1);
            enqueue_locked(&mut state, request)
        };
        // Filtered re-entry still has to wake the dispatcher
        self.notify.notify_one();
        accepted
    }
}

fn enqueue_locked(state: &mut QueueState, request: TraversalRequest) -> bool {
    let key = fingerprint(&request.url);
    let fresh = state.seen.insert(key);

    if !fresh && !request.dont_filter {
        tracing::trace!("Filtered duplicate request {}", request.url);
        return false;
    }
    state.queue.push_back(request);
    true
}

/// Duplicate-filter key: the canonical URL, or the raw URL when it cannot be parsed
fn fingerprint(url: &str) -> String {
    canonicalize_url(url).unwrap_or_else(|_| url.to_string())
}

/// FIFO frontier held in memory for one crawl run
#[derive(Clone, Default)]
pub struct MemoryFrontier {
    shared: Arc<Shared>,
}

impl MemoryFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct URLs seen so far
    pub fn seen(&self) -> usize {
        self.shared.lock().seen.len()
    }
}

#[async_trait]
impl Frontier for MemoryFrontier {
    fn push(&self, request: TraversalRequest) -> bool {
        self.shared.enqueue(request)
    }

    fn push_after(&self, request: TraversalRequest, delay: Duration) {
        self.shared.lock().delayed += 1;

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.release_delayed(request);
        });
    }

    fn pop(&self) -> Option<TraversalRequest> {
        self.shared.lock().queue.pop_front()
    }

    fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    fn delayed(&self) -> usize {
        self.shared.lock().delayed
    }

    fn is_idle(&self) -> bool {
        let state = self.shared.lock();
        state.queue.is_empty() && state.delayed == 0
    }

    async fn changed(&self) {
        self.shared.notify.notified().await;
    }
}
