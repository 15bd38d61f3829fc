//! Per-route pacing engine
//!
//! Each engine is a cheap handle onto a scheduling loop running on its own
//! tokio task. The loop owns the pacing state and the FIFO queue; handles talk
//! to it over a command channel, and admitted tasks report completion over a
//! second channel. All admission decisions happen in one place, the loop.

use super::route::RouteKey;
use super::state::PacingState;
use super::types::{PacingConfig, PacingSnapshot};
use crate::error::{Error, Result};
use crate::http::RateLimitHeaders;
use crate::trace::{TraceEvent, Tracer};
use chrono::Utc;
use futures::future::BoxFuture;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace};

type Job = BoxFuture<'static, ()>;

enum Command {
    Schedule(Job),
    UpdateFromHeaders(RateLimitHeaders),
    Penalize(Duration),
    Snapshot(oneshot::Sender<PacingSnapshot>),
}

/// Adaptive admission control for one route
///
/// Cloning yields another handle to the same scheduling loop. The loop stops
/// once every handle is dropped.
///
/// Must be created from within a tokio runtime.
#[derive(Clone)]
pub struct PacingEngine {
    route: RouteKey,
    commands: mpsc::UnboundedSender<Command>,
}

impl PacingEngine {
    /// Spawn the scheduling loop for `route`
    pub fn new(route: RouteKey, config: PacingConfig, tracer: Tracer) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let scheduler = Scheduler {
            route: route.to_string(),
            state: PacingState::new(config, Instant::now()),
            queue: VecDeque::new(),
            commands: command_rx,
            done_tx,
            done_rx,
            tracer,
        };
        tokio::spawn(scheduler.run());

        Self { route, commands }
    }

    /// Route this engine governs
    pub fn route(&self) -> &RouteKey {
        &self.route
    }

    /// Queue `task` and wait for it to be admitted and finish
    ///
    /// Tasks start in enqueue order. The task's own result is returned
    /// unchanged; it is polled on a separate tokio task, so its slot is held
    /// until it completes even if the caller stops waiting.
    pub async fn schedule<T, Fut>(&self, task: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let _ = result_tx.send(task.await);
        });

        self.send(Command::Schedule(job))?;
        result_rx
            .await
            .map_err(|_| Error::pacing_stopped(self.route.as_str()))?
    }

    /// Recompute pacing from a response's rate-limit headers
    pub fn update_from_headers(&self, headers: &HeaderMap) {
        self.update_from_signals(RateLimitHeaders::from_headers(headers));
    }

    /// Recompute pacing from already-parsed signals
    pub fn update_from_signals(&self, signals: RateLimitHeaders) {
        if signals.is_empty() {
            return;
        }
        let _ = self.send(Command::UpdateFromHeaders(signals));
    }

    /// Hold new admissions back for at least `wait` from now
    pub fn penalize(&self, wait: Duration) {
        let _ = self.send(Command::Penalize(wait));
    }

    /// Current pacing state
    ///
    /// Reflects every command sent from this handle before the call.
    pub async fn snapshot(&self) -> Result<PacingSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await
            .map_err(|_| Error::pacing_stopped(self.route.as_str()))
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::pacing_stopped(self.route.as_str()))
    }
}

impl std::fmt::Debug for PacingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacingEngine")
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

/// Releases a running slot when an admitted task ends, panics included
struct CompletionGuard(mpsc::UnboundedSender<()>);

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

struct Scheduler {
    route: String,
    state: PacingState,
    queue: VecDeque<Job>,
    commands: mpsc::UnboundedReceiver<Command>,
    done_tx: mpsc::UnboundedSender<()>,
    done_rx: mpsc::UnboundedReceiver<()>,
    tracer: Tracer,
}

impl Scheduler {
    async fn run(mut self) {
        debug!(route = %self.route, "pacing scheduler started");

        loop {
            let now = Instant::now();
            self.reset_window_if_due(now);
            self.pump(now);

            let deadline = self.state.next_deadline(!self.queue.is_empty());

            // Commands first: a task's header update must land before its completion.
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                Some(()) = self.done_rx.recv() => {
                    self.state.complete();
                    trace!(route = %self.route, running = self.state.running, "task completed");
                }
                () = sleep_until(deadline) => {}
            }
        }

        debug!(route = %self.route, "pacing scheduler stopped");
    }

    fn handle(&mut self, command: Command) {
        let now = Instant::now();
        match command {
            Command::Schedule(job) => {
                self.queue.push_back(job);
                let queued = self.queue.len();
                trace!(route = %self.route, queued, "task enqueued");
                self.tracer.emit(|| TraceEvent::Enqueued {
                    route: self.route.clone(),
                    queued,
                });
            }
            Command::UpdateFromHeaders(signals) => {
                let unix_now_secs = Utc::now().timestamp_millis() as f64 / 1000.0;
                if let Some(recalc) = self.state.apply_headers(&signals, now, unix_now_secs) {
                    debug!(
                        route = %self.route,
                        interval_ms = recalc.interval_ms,
                        concurrency = recalc.concurrency,
                        remaining = ?signals.remaining,
                        "pacing recalculated"
                    );
                    self.tracer.emit(|| TraceEvent::Recalculated {
                        route: self.route.clone(),
                        interval_ms: recalc.interval_ms,
                        concurrency: recalc.concurrency,
                        remaining: signals.remaining,
                        window_ms: recalc.window_ms,
                    });
                }
            }
            Command::Penalize(wait) => {
                let wait = self.state.penalize(wait, now);
                debug!(route = %self.route, wait_ms = wait.as_millis() as u64, "admission penalized");
                self.tracer.emit(|| TraceEvent::Penalized {
                    route: self.route.clone(),
                    wait,
                });
            }
            Command::Snapshot(reply) => {
                self.reset_window_if_due(now);
                let _ = reply.send(self.snapshot(now));
            }
        }
    }

    /// Admit as many queued tasks as the current pacing allows
    fn pump(&mut self, now: Instant) {
        while !self.queue.is_empty() && self.state.can_admit(now) {
            let Some(job) = self.queue.pop_front() else {
                break;
            };
            self.state.admit(now);
            trace!(
                route = %self.route,
                running = self.state.running,
                interval_ms = self.state.interval_ms,
                "task admitted"
            );
            self.tracer.emit(|| TraceEvent::Admitted {
                route: self.route.clone(),
                running: self.state.running,
                interval_ms: self.state.interval_ms,
            });

            let guard = CompletionGuard(self.done_tx.clone());
            tokio::spawn(async move {
                let _guard = guard;
                job.await;
            });
        }
    }

    fn reset_window_if_due(&mut self, now: Instant) {
        if self.state.reset_window_if_due(now) {
            debug!(route = %self.route, "rate window elapsed, pacing back to baseline");
            self.tracer.emit(|| TraceEvent::WindowReset {
                route: self.route.clone(),
            });
        }
    }

    fn snapshot(&self, now: Instant) -> PacingSnapshot {
        PacingSnapshot {
            route: self.route.clone(),
            interval_ms: self.state.interval_ms,
            concurrency: self.state.concurrency,
            running: self.state.running,
            queued: self.queue.len(),
            next_available_in: self.state.next_available.saturating_duration_since(now),
            window_reset_in: self
                .state
                .window_reset_at
                .map(|at| at.saturating_duration_since(now)),
            window_ms: self.state.window_ms,
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
