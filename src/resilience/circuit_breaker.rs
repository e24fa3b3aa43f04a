//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: calls pass through, outcomes land in a rolling window
//! - Open: calls are rejected without touching the downstream
//! - HalfOpen: exactly one trial call is in flight
//!
//! # State Transitions
//! ```text
//! Closed → Open: samples >= minimum_throughput and failures/samples >= failure_ratio
//! Open → HalfOpen: first call after break_duration (lazy, no timer)
//! HalfOpen → Closed: trial succeeds (window cleared)
//! HalfOpen → Open: trial fails (break restarts)
//! any → Closed: manual reset (window cleared)
//! ```
//!
//! # Design Decisions
//! - One mutex per breaker serializes read-evaluate-transition
//! - Outcomes that arrive after the breaker left Closed are ignored
//! - A trial that ends without a verdict (cancelled, unhandled) frees the
//!   trial slot and leaves the breaker HalfOpen
//! - Observer hooks run after the lock is released, on the calling task

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::outcome::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => f.write_str("closed"),
            CircuitState::Open => f.write_str("open"),
            CircuitState::HalfOpen => f.write_str("half_open"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakerOptions {
    /// Length of the rolling outcome window.
    pub sampling_duration: Duration,
    /// Ratio in (0, 1] at which the circuit opens.
    pub failure_ratio: f64,
    /// Samples required before the ratio is evaluated.
    pub minimum_throughput: u32,
    /// How long Open lasts before a trial is admitted.
    pub break_duration: Duration,
}

/// A state change, handed to observers.
#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    pub pipeline: &'a str,
    pub from: CircuitState,
    pub to: CircuitState,
    pub break_duration: Duration,
}

/// Synchronous transition hooks.
///
/// Hooks run on the task that caused the transition and must return quickly;
/// anything slow belongs on a spawned task.
pub trait CircuitObserver: Send + Sync {
    fn on_opened(&self, _transition: &Transition<'_>) {}
    fn on_half_opened(&self, _transition: &Transition<'_>) {}
    fn on_closed(&self, _transition: &Transition<'_>) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CircuitObserver for NoopObserver {}

/// Returned when a call is not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    /// Remaining break time; zero while a HalfOpen trial is in flight.
    pub retry_after: Duration,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub samples: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Closed,
    Open { opened_at: Instant },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    failed: bool,
}

#[derive(Debug, Default)]
struct Window {
    samples: VecDeque<Sample>,
    failures: usize,
}

impl Window {
    fn evict(&mut self, now: Instant, span: Duration) {
        while let Some(oldest) = self.samples.front() {
            if now.saturating_duration_since(oldest.at) < span {
                break;
            }
            if oldest.failed {
                self.failures -= 1;
            }
            self.samples.pop_front();
        }
    }

    fn push(&mut self, at: Instant, failed: bool) {
        if failed {
            self.failures += 1;
        }
        self.samples.push_back(Sample { at, failed });
    }

    fn should_trip(&self, options: &BreakerOptions) -> bool {
        let total = self.samples.len();
        if total == 0 || total < options.minimum_throughput as usize {
            return false;
        }
        self.failures as f64 / total as f64 >= options.failure_ratio
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.failures = 0;
    }
}

#[derive(Debug)]
struct Core {
    phase: Phase,
    window: Window,
}

/// The protective gate for one downstream dependency.
pub struct CircuitBreaker {
    name: String,
    options: BreakerOptions,
    observer: Arc<dyn CircuitObserver>,
    core: Mutex<Core>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, options: BreakerOptions, observer: Arc<dyn CircuitObserver>) -> Self {
        Self {
            name: name.into(),
            options,
            observer,
            core: Mutex::new(Core { phase: Phase::Closed, window: Window::default() }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &BreakerOptions {
        &self.options
    }

    /// Current state. Open is reported until a call performs the lazy
    /// transition to HalfOpen.
    pub fn state(&self) -> CircuitState {
        self.lock().phase.into()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let core = self.lock();
        BreakerSnapshot {
            state: core.phase.into(),
            samples: core.window.samples.len(),
            failures: core.window.failures,
        }
    }

    /// Ask to let one call through.
    ///
    /// The returned permit must be settled with [`Permit::record`]; dropping
    /// it unsettled releases a HalfOpen trial slot without a verdict.
    pub fn try_acquire(&self) -> Result<Permit<'_>, Rejection> {
        let now = Instant::now();
        let mut transition = None;

        let admitted = {
            let mut core = self.lock();
            match core.phase {
                Phase::Closed => Ok(false),
                Phase::Open { opened_at } => {
                    let elapsed = now.saturating_duration_since(opened_at);
                    if elapsed >= self.options.break_duration {
                        core.phase = Phase::HalfOpen { trial_in_flight: true };
                        transition = Some((CircuitState::Open, CircuitState::HalfOpen));
                        Ok(true)
                    } else {
                        Err(Rejection { retry_after: self.options.break_duration - elapsed })
                    }
                }
                Phase::HalfOpen { trial_in_flight: true } => Err(Rejection { retry_after: Duration::ZERO }),
                Phase::HalfOpen { trial_in_flight: false } => {
                    core.phase = Phase::HalfOpen { trial_in_flight: true };
                    Ok(true)
                }
            }
        };

        if let Some((from, to)) = transition {
            self.notify(from, to);
        }

        admitted.map(|trial| Permit { breaker: self, trial, settled: false })
    }

    /// Force the breaker Closed with an empty window. Returns the state it
    /// left. `on_closed` fires only when the state actually changed.
    pub fn reset(&self) -> CircuitState {
        let previous = {
            let mut core = self.lock();
            let previous: CircuitState = core.phase.into();
            core.phase = Phase::Closed;
            core.window.clear();
            previous
        };

        tracing::info!(pipeline = %self.name, from = %previous, "Circuit manually reset");
        if previous != CircuitState::Closed {
            self.notify(previous, CircuitState::Closed);
        }
        previous
    }

    fn settle(&self, trial: bool, outcome: Outcome) {
        let now = Instant::now();

        let transition = {
            let mut core = self.lock();
            match core.phase {
                Phase::Closed => {
                    if outcome == Outcome::UnhandledFailure {
                        return;
                    }
                    core.window.evict(now, self.options.sampling_duration);
                    core.window.push(now, outcome == Outcome::HandledFailure);
                    if core.window.should_trip(&self.options) {
                        core.phase = Phase::Open { opened_at: now };
                        core.window.clear();
                        Some((CircuitState::Closed, CircuitState::Open))
                    } else {
                        None
                    }
                }
                Phase::HalfOpen { .. } if trial => match outcome {
                    Outcome::Success => {
                        core.phase = Phase::Closed;
                        core.window.clear();
                        Some((CircuitState::HalfOpen, CircuitState::Closed))
                    }
                    Outcome::HandledFailure => {
                        core.phase = Phase::Open { opened_at: now };
                        Some((CircuitState::HalfOpen, CircuitState::Open))
                    }
                    Outcome::UnhandledFailure => {
                        core.phase = Phase::HalfOpen { trial_in_flight: false };
                        None
                    }
                },
                // Late outcome of a call admitted before the circuit opened.
                _ => None,
            }
        };

        if let Some((from, to)) = transition {
            self.notify(from, to);
        }
    }

    fn release(&self, trial: bool) {
        if !trial {
            return;
        }
        let mut core = self.lock();
        if core.phase == (Phase::HalfOpen { trial_in_flight: true }) {
            core.phase = Phase::HalfOpen { trial_in_flight: false };
        }
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        let transition = Transition {
            pipeline: &self.name,
            from,
            to,
            break_duration: self.options.break_duration,
        };

        match to {
            CircuitState::Open => {
                tracing::warn!(
                    pipeline = %self.name,
                    from = %from,
                    break_duration = ?self.options.break_duration,
                    "Circuit opened"
                );
                self.observer.on_opened(&transition);
            }
            CircuitState::HalfOpen => {
                tracing::info!(pipeline = %self.name, "Circuit half-open, admitting trial call");
                self.observer.on_half_opened(&transition);
            }
            CircuitState::Closed => {
                tracing::info!(pipeline = %self.name, "Circuit closed, downstream recovered");
                self.observer.on_closed(&transition);
            }
        }

        metrics::record_transition(&self.name, to);
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().expect("circuit breaker mutex poisoned")
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("state", &self.state())
            .finish()
    }
}

impl From<Phase> for CircuitState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

/// Admission ticket for one attempt.
#[must_use = "an unsettled permit releases its trial slot without a verdict"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    /// Whether this permit is the single HalfOpen trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// Feed the classified outcome back into the breaker.
    pub fn record(mut self, outcome: Outcome) {
        self.settled = true;
        self.breaker.settle(self.trial, outcome);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release(self.trial);
        }
    }
}

impl fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("breaker", &self.breaker.name)
            .field("trial", &self.trial)
            .finish()
    }
}
