//! Rate-limited request gateway.
//!
//! Every outbound provider call goes through one [`RequestGateway`]. Requests
//! are dispatched strictly in submission order by a single drain task, spaced
//! by at least `min_interval`. A throttled (429) request is put back at the
//! head of the queue after an exponential backoff; any other failure is handed
//! straight back to its caller.

use futures::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{debug, error, warn};

pub mod retry;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use retry::RetryPolicy;
pub use transport::{GatewayRequest, GatewayResponse, HttpTransport, ReqwestTransport};

use crate::config::GatewayConfig;
use crate::errors::{ProviderError, ProviderResult};

struct PendingRequest {
    request: GatewayRequest,
    /// Retries already spent on this request
    attempt: u32,
    reply: oneshot::Sender<ProviderResult<GatewayResponse>>,
}

#[derive(Default)]
struct GatewayState {
    pending: VecDeque<PendingRequest>,
    draining: bool,
    last_dispatch: Option<Instant>,
}

struct GatewayInner {
    transport: Arc<dyn HttpTransport>,
    min_interval: Duration,
    retry: RetryPolicy,
    state: Mutex<GatewayState>,
}

/// Shared handle to the process-wide request queue
#[derive(Clone)]
pub struct RequestGateway {
    inner: Arc<GatewayInner>,
}

impl RequestGateway {
    pub fn new(transport: Arc<dyn HttpTransport>, min_interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                transport,
                min_interval,
                retry,
                state: Mutex::new(GatewayState::default()),
            }),
        }
    }

    pub fn from_config(transport: Arc<dyn HttpTransport>, config: &GatewayConfig) -> Self {
        Self::new(transport, config.min_interval, RetryPolicy::from(config))
    }

    /// Queue `request` and wait for its outcome.
    ///
    /// The request joins the queue when this future is first polled, so
    /// submission order is polling order.
    pub async fn enqueue(&self, request: GatewayRequest) -> ProviderResult<GatewayResponse> {
        let (reply, outcome) = oneshot::channel();

        let start_drain = {
            let mut state = self.inner.lock_state();
            state.pending.push_back(PendingRequest {
                request,
                attempt: 0,
                reply,
            });
            if state.draining {
                false
            } else {
                state.draining = true;
                true
            }
        };

        if start_drain {
            self.inner.clone().spawn_drain();
        }

        outcome.await.map_err(|_| ProviderError::GatewayClosed)?
    }

    /// Requests waiting for dispatch
    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }
}

impl GatewayInner {
    fn lock_state(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run the drain loop; a panicking transport must not leave `draining`
    /// set, or every later request would wait forever
    fn spawn_drain(self: Arc<Self>) {
        tokio::spawn(async move {
            let drained = AssertUnwindSafe(self.clone().drain()).catch_unwind().await;
            if drained.is_ok() {
                return;
            }

            error!("Request gateway drain loop panicked");
            let restart = {
                let mut state = self.lock_state();
                if state.pending.is_empty() {
                    state.draining = false;
                    false
                } else {
                    true
                }
            };
            if restart {
                self.spawn_drain();
            }
        });
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let (mut pending, last_dispatch) = {
                let mut state = self.lock_state();
                match state.pending.pop_front() {
                    Some(pending) => (pending, state.last_dispatch),
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };

            // Caller gave up (timeout or cancellation) before its turn
            if pending.reply.is_closed() {
                debug!("Dropping abandoned {} request", pending.request.label);
                continue;
            }

            if let Some(last) = last_dispatch {
                sleep_until(last + self.min_interval).await;
            }
            self.lock_state().last_dispatch = Some(Instant::now());

            debug!("{} request: {}", pending.request.label, pending.request.display_url());
            let result = self.transport.execute(&pending.request).await;
            let outcome = match result {
                Ok(response) if response.is_throttled() => {
                    if self.retry.allows_retry(pending.attempt) {
                        let delay = self.retry.delay_for(pending.attempt);
                        warn!(
                            "{} throttled, retry {}/{} in {:?}: {}",
                            pending.request.label,
                            pending.attempt + 1,
                            self.retry.max_retries,
                            delay,
                            pending.request.display_url()
                        );
                        sleep(delay).await;
                        pending.attempt += 1;
                        self.lock_state().pending.push_front(pending);
                        continue;
                    }
                    warn!(
                        "{} still throttled after {} retries: {}",
                        pending.request.label,
                        pending.attempt,
                        pending.request.display_url()
                    );
                    Err(ProviderError::RateLimited {
                        url: pending.request.display_url(),
                        attempts: pending.attempt + 1,
                    })
                }
                Ok(response) if !response.is_success() => {
                    debug!(
                        "{} answered HTTP {}: {}",
                        pending.request.label,
                        response.status,
                        pending.request.display_url()
                    );
                    Err(ProviderError::Http {
                        status: response.status,
                        url: pending.request.display_url(),
                    })
                }
                Ok(response) => Ok(response),
                Err(e) => {
                    debug!("{} request failed: {}", pending.request.label, e);
                    Err(e)
                }
            };

            let _ = pending.reply.send(outcome);
        }
    }
}
