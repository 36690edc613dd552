//! Fairness queue.
//!
//! Limits how many requesters run the pipeline at once and tells the rest
//! where they stand. Requesters move Idle -> Queued -> Processing -> Idle;
//! Idle requesters are simply absent from the table. Anyone without
//! admit/release activity for `idle_timeout` is purged, whatever its state,
//! so a vanished client cannot hold a slot forever.
//!
//! Scheduling order and feedback only; nothing here guards pipeline
//! correctness.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, info};

use crate::config::QueueConfig;
use crate::models::RequesterId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequesterState {
    Queued,
    Processing,
}

#[derive(Debug, Clone)]
struct RequesterEntry {
    state: RequesterState,
    last_activity: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    requesters: HashMap<RequesterId, RequesterEntry>,
    waiting: VecDeque<RequesterId>,
}

impl QueueState {
    fn processing(&self) -> usize {
        self.requesters
            .values()
            .filter(|e| e.state == RequesterState::Processing)
            .count()
    }

    /// 1-based position in the waiting line
    fn position(&self, id: &RequesterId) -> Option<usize> {
        self.waiting.iter().position(|w| w == id).map(|p| p + 1)
    }

    /// Move queue heads to Processing while fewer than `max` are running
    fn promote_heads(&mut self, max_concurrent: usize, now: Instant) -> usize {
        let mut promoted = 0;
        while self.processing() < max_concurrent {
            let Some(next) = self.waiting.pop_front() else {
                break;
            };
            if let Some(entry) = self.requesters.get_mut(&next) {
                entry.state = RequesterState::Processing;
                entry.last_activity = now;
                debug!("Requester {} promoted", next);
                promoted += 1;
            }
        }
        promoted
    }

    fn purge_idle(&mut self, now: Instant, idle_timeout: Duration) -> usize {
        let stale: Vec<RequesterId> = self
            .requesters
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_activity) >= idle_timeout)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.requesters.remove(id);
        }
        if !stale.is_empty() {
            self.waiting.retain(|w| !stale.contains(w));
        }
        stale.len()
    }
}

/// Outcome of an admission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    /// 1-based position while queued, 0 once admitted
    pub queue_position: usize,
    pub eta_seconds: u64,
}

impl Admission {
    fn admitted() -> Self {
        Self {
            admitted: true,
            queue_position: 0,
            eta_seconds: 0,
        }
    }

    /// Human-readable status for callers left waiting
    pub fn notice(&self) -> String {
        format!(
            "Server is busy. You are number {} in the queue, estimated wait {} s. Please try again shortly.",
            self.queue_position, self.eta_seconds
        )
    }
}

/// Snapshot of the queue, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub processing: usize,
    pub waiting: Vec<RequesterId>,
}

struct QueueInner {
    max_concurrent: usize,
    idle_timeout: Duration,
    promotion_delay: Duration,
    estimated_request_duration: Duration,
    state: Mutex<QueueState>,
    promoted: Notify,
}

/// Shared handle to the requester table
#[derive(Clone)]
pub struct FairnessQueue {
    inner: Arc<QueueInner>,
}

impl FairnessQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                max_concurrent: config.max_concurrent.max(1),
                idle_timeout: config.idle_timeout,
                promotion_delay: config.promotion_delay,
                estimated_request_duration: config.estimated_request_duration,
                state: Mutex::new(QueueState::default()),
                promoted: Notify::new(),
            }),
        }
    }

    fn eta_for(&self, position: usize) -> u64 {
        self.inner.estimated_request_duration.as_secs() * position as u64
    }

    /// Admit `id` when there is room, otherwise queue it (or report its
    /// current place if it is already queued)
    pub async fn admit(&self, id: &RequesterId) -> Admission {
        let now = Instant::now();
        let mut state = self.inner.state.lock().await;
        let purged = state.purge_idle(now, self.inner.idle_timeout);
        if purged > 0 {
            debug!("Purged {} idle requesters", purged);
            // Purging may have freed slots nobody else will hand out
            if state.promote_heads(self.inner.max_concurrent, now) > 0 {
                self.inner.promoted.notify_waiters();
            }
        }

        if let Some(entry) = state.requesters.get_mut(id) {
            entry.last_activity = now;
            if entry.state == RequesterState::Processing {
                return Admission::admitted();
            }
            let position = state.position(id).unwrap_or(1);
            return Admission {
                admitted: false,
                queue_position: position,
                eta_seconds: self.eta_for(position),
            };
        }

        if state.processing() < self.inner.max_concurrent && state.waiting.is_empty() {
            state.requesters.insert(
                id.clone(),
                RequesterEntry {
                    state: RequesterState::Processing,
                    last_activity: now,
                },
            );
            debug!("Requester {} admitted", id);
            return Admission::admitted();
        }

        state.requesters.insert(
            id.clone(),
            RequesterEntry {
                state: RequesterState::Queued,
                last_activity: now,
            },
        );
        state.waiting.push_back(id.clone());
        let position = state.waiting.len();
        info!("Requester {} queued at position {}", id, position);
        Admission {
            admitted: false,
            queue_position: position,
            eta_seconds: self.eta_for(position),
        }
    }

    /// Return `id` to Idle and schedule promotion of the queue head
    pub async fn release(&self, id: &RequesterId) {
        let schedule = {
            let mut state = self.inner.state.lock().await;
            state.purge_idle(Instant::now(), self.inner.idle_timeout);
            if state.requesters.remove(id).is_some() {
                state.waiting.retain(|w| w != id);
                debug!("Requester {} released", id);
            }
            !state.waiting.is_empty() && state.processing() < self.inner.max_concurrent
        };

        if schedule {
            let queue = self.clone();
            tokio::spawn(async move {
                sleep(queue.inner.promotion_delay).await;
                queue.promote().await;
            });
        }
    }

    /// Drop a requester that stopped waiting, so a later promotion cannot
    /// hand its slot to nobody
    async fn abandon(&self, id: &RequesterId) {
        self.release(id).await;
    }

    async fn promote(&self) {
        let now = Instant::now();
        let promoted = {
            let mut state = self.inner.state.lock().await;
            state.purge_idle(now, self.inner.idle_timeout);
            state.promote_heads(self.inner.max_concurrent, now)
        };
        if promoted > 0 {
            self.inner.promoted.notify_waiters();
        }
    }

    /// Admit `id`, waiting up to `max_wait` for a promotion if it is queued.
    ///
    /// Returns the last admission state; `admitted` is false when the wait ran
    /// out.
    pub async fn wait_for_turn(&self, id: &RequesterId, max_wait: Duration) -> Admission {
        let deadline = Instant::now() + max_wait;
        loop {
            let notified = self.inner.promoted.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let admission = self.admit(id).await;
            if admission.admitted {
                return admission;
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_until(deadline) => {
                    debug!("Requester {} still queued after {:?}, leaving the queue", id, max_wait);
                    self.abandon(id).await;
                    return admission;
                }
            }
        }
    }

    /// Handle that releases `id` when dropped, so a cancelled caller does
    /// not hold its slot until the idle purge
    pub fn guard(&self, id: &RequesterId) -> AdmissionGuard {
        AdmissionGuard {
            queue: self.clone(),
            id: id.clone(),
            released: false,
        }
    }

    pub async fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock().await;
        QueueStats {
            processing: state.processing(),
            waiting: state.waiting.iter().cloned().collect(),
        }
    }
}

/// Releases its requester on drop unless released explicitly
pub struct AdmissionGuard {
    queue: FairnessQueue,
    id: RequesterId,
    released: bool,
}

impl AdmissionGuard {
    pub async fn release(mut self) {
        self.released = true;
        self.queue.release(&self.id).await;
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let queue = self.queue.clone();
        let id = self.id.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                queue.release(&id).await;
            });
        }
    }
}
