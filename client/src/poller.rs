//! Bounded status polling for the originating device.
//!
//! A poll is a spawned task that owns its cancellation signal
//! (`watch::channel(false)`). The caller receives a [`PollHandle`] and is
//! responsible for releasing it: [`PollHandle::stop`] on every exit path,
//! or simply dropping the handle, which stops the task as well.
//!
//! ```text
//!   tick ──► fetch ──ok, pending──► on_update, polls += 1 ──► polls == max? ──► TimedOut
//!              │  └─ok, terminal──► on_update, on_terminal ──► Terminal
//!              ├─transient error──► failures += 1 (polls unchanged) ──► failures == max? ──► Unreachable
//!              ├─404────────────────────────────────────────────────────────────────────► NotFound
//!              └─other error────────────────────────────────────────────────────────────► Rejected
//! ```
//!
//! Transient failures never consume the poll budget. They consume a separate
//! budget of consecutive failures, reset by any successful read, so a dead
//! network still ends the poll.

use crate::error::ClientError;
use crate::source::SessionSource;
use paysession_core::{PaymentSession, SessionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Poll timing and budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between reads; the first read happens one interval after start
    pub interval: Duration,
    /// Successful non-terminal reads before giving up
    pub max_polls: u32,
    /// Consecutive transient failures before giving up
    pub max_transient_failures: u32,
}

impl PollerConfig {
    /// Default interval between reads.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);
    /// Default poll budget: 60 reads, about three minutes.
    pub const DEFAULT_MAX_POLLS: u32 = 60;
    /// Shortest interval a poll will run with.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Override the interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the poll budget.
    #[must_use]
    pub const fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    /// Override the consecutive-failure budget.
    #[must_use]
    pub const fn with_max_transient_failures(mut self, max: u32) -> Self {
        self.max_transient_failures = max;
        self
    }

    /// Clamp to values a poll can run with: an interval of at least
    /// [`Self::MIN_INTERVAL`] and budgets of at least one.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            interval: self.interval.max(Self::MIN_INTERVAL),
            max_polls: self.max_polls.max(1),
            max_transient_failures: self.max_transient_failures.max(1),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            max_polls: Self::DEFAULT_MAX_POLLS,
            max_transient_failures: Self::DEFAULT_MAX_POLLS,
        }
    }
}

/// How a poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The session reached a terminal status
    Terminal(PaymentSession),
    /// The poll budget ran out with the session still pending
    TimedOut {
        /// Successful reads performed
        polls: u32,
    },
    /// The server does not know the session
    NotFound,
    /// Too many consecutive transient failures
    Unreachable {
        /// The last failure seen
        last_error: ClientError,
    },
    /// The server rejected the read for a non-transient reason
    Rejected(ClientError),
    /// The caller stopped the poll, or a newer poll for the same session replaced it
    Stopped,
}

impl PollOutcome {
    /// Whether the session resolved with a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

struct Registration {
    token: u64,
    stop: Arc<watch::Sender<bool>>,
}

type Registry = Arc<Mutex<HashMap<SessionId, Registration>>>;

/// Starts polls and keeps at most one running per session id.
///
/// # Example
///
/// ```ignore
/// let poller = ClientPoller::new(api_client, PollerConfig::default());
/// let handle = poller.start(
///     session.id,
///     |s| tracing::debug!(status = %s.status, "Still waiting"),
///     |outcome| tracing::info!(?outcome, "Payment finished"),
/// );
/// let outcome = handle.join().await;
/// ```
#[derive(Clone)]
pub struct ClientPoller {
    source: Arc<dyn SessionSource>,
    config: PollerConfig,
    active: Registry,
    next_token: Arc<AtomicU64>,
}

impl ClientPoller {
    /// Create a poller over any session source.
    ///
    /// `config` is [normalized](PollerConfig::normalized) first.
    pub fn new(source: impl SessionSource + 'static, config: PollerConfig) -> Self {
        Self {
            source: Arc::new(source),
            config: config.normalized(),
            active: Arc::new(Mutex::new(HashMap::new())),
            next_token: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Number of polls currently running.
    #[must_use]
    pub fn active_polls(&self) -> usize {
        lock(&self.active).len()
    }

    /// Start polling `id`, stopping any poll already running for it.
    ///
    /// `on_update` runs after every successful read. `on_terminal` runs once
    /// when the poll ends by itself (resolved, timed out, not found,
    /// unreachable, rejected); it does not run when the poll is stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<U, T>(&self, id: SessionId, on_update: U, on_terminal: T) -> PollHandle
    where
        U: FnMut(&PaymentSession) + Send + 'static,
        T: FnOnce(&PollOutcome) + Send + 'static,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let previous = lock(&self.active).insert(
            id,
            Registration {
                token,
                stop: Arc::clone(&stop_tx),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(session_id = %id, "Replacing running poll");
            previous.stop.send_replace(true);
        }

        let run = PollRun {
            id,
            source: Arc::clone(&self.source),
            config: self.config,
            stop: stop_rx,
        };
        let active = Arc::clone(&self.active);

        let task = tokio::spawn(async move {
            let outcome = run.run(on_update).await;

            {
                let mut active = lock(&active);
                if active.get(&id).is_some_and(|r| r.token == token) {
                    active.remove(&id);
                }
            }

            if outcome != PollOutcome::Stopped {
                on_terminal(&outcome);
            }
            outcome
        });

        PollHandle {
            session_id: id,
            stop: stop_tx,
            task: Some(task),
        }
    }
}

/// Owner of a running poll.
///
/// Dropping the handle stops the poll.
#[must_use = "dropping a PollHandle stops the poll"]
pub struct PollHandle {
    session_id: SessionId,
    stop: Arc<watch::Sender<bool>>,
    task: Option<JoinHandle<PollOutcome>>,
}

impl PollHandle {
    /// The session being polled.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Stop the poll. Idempotent; no callbacks run after the task observes it.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Whether the poll task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the poll to end and return its outcome.
    pub async fn join(mut self) -> PollOutcome {
        let Some(task) = self.task.take() else {
            return PollOutcome::Stopped;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(session_id = %self.session_id, error = %err, "Poll task failed");
                PollOutcome::Stopped
            },
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop.send_replace(true);
    }
}

struct PollRun {
    id: SessionId,
    source: Arc<dyn SessionSource>,
    config: PollerConfig,
    stop: watch::Receiver<bool>,
}

impl PollRun {
    async fn run<U>(mut self, mut on_update: U) -> PollOutcome
    where
        U: FnMut(&PaymentSession) + Send,
    {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut polls: u32 = 0;
        let mut failures: u32 = 0;

        loop {
            if *self.stop.borrow() {
                return PollOutcome::Stopped;
            }

            tokio::select! {
                biased;
                _ = self.stop.changed() => return PollOutcome::Stopped,
                _ = ticker.tick() => {},
            }

            let result = tokio::select! {
                biased;
                _ = self.stop.changed() => return PollOutcome::Stopped,
                result = self.source.fetch(self.id) => result,
            };

            match result {
                Ok(session) => {
                    failures = 0;
                    polls += 1;
                    on_update(&session);

                    if session.is_terminal() {
                        tracing::info!(
                            session_id = %self.id,
                            status = %session.status,
                            polls,
                            "Payment session resolved"
                        );
                        return PollOutcome::Terminal(session);
                    }
                    if polls >= self.config.max_polls {
                        tracing::info!(session_id = %self.id, polls, "Poll budget exhausted");
                        return PollOutcome::TimedOut { polls };
                    }
                },
                Err(ClientError::NotFound(message)) => {
                    tracing::info!(session_id = %self.id, %message, "Session not found while polling");
                    return PollOutcome::NotFound;
                },
                Err(err) if err.is_transient() => {
                    failures += 1;
                    tracing::warn!(
                        session_id = %self.id,
                        error = %err,
                        consecutive_failures = failures,
                        "Transient poll failure"
                    );
                    if failures >= self.config.max_transient_failures {
                        return PollOutcome::Unreachable { last_error: err };
                    }
                },
                Err(err) => {
                    tracing::warn!(session_id = %self.id, error = %err, "Poll rejected");
                    return PollOutcome::Rejected(err);
                },
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
