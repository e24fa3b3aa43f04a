//! Outcome classification.
//!
//! # Responsibilities
//! - Decide whether a finished attempt counts as a failure for policy purposes
//! - Keep the decision pure so it can be tested without clocks or breakers
//!
//! # Design Decisions
//! - Only `HandledFailure` feeds the breaker ratio and the retry budget
//! - `UnhandledFailure` is returned to the caller as-is
//! - Per-attempt timeouts are presented to the classifier like any other result

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Policy-level verdict for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    HandledFailure,
    UnhandledFailure,
}

/// What a single attempt produced, as seen by a classifier.
#[derive(Clone, Copy)]
pub enum AttemptResult<'a> {
    /// The operation returned a value.
    Value(&'a dyn Any),
    /// The operation returned an error.
    Error(&'a (dyn StdError + 'static)),
    /// The attempt ran past its per-attempt timeout.
    TimedOut,
}

impl<'a> AttemptResult<'a> {
    /// Downcast the returned value, if this attempt produced one of type `T`.
    pub fn value<T: 'static>(&self) -> Option<&'a T> {
        match *self {
            AttemptResult::Value(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Downcast the returned error, if this attempt failed with an `E`.
    pub fn error<E: StdError + 'static>(&self) -> Option<&'a E> {
        match *self {
            AttemptResult::Error(error) => error.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl fmt::Debug for AttemptResult<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptResult::Value(_) => f.write_str("Value(..)"),
            AttemptResult::Error(e) => write!(f, "Error({})", e),
            AttemptResult::TimedOut => f.write_str("TimedOut"),
        }
    }
}

type ClassifyFn = dyn Fn(&AttemptResult<'_>) -> Outcome + Send + Sync;

/// Pluggable outcome predicate stored in a pipeline's options.
#[derive(Clone)]
pub struct Classifier {
    inner: Arc<ClassifyFn>,
}

impl Classifier {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&AttemptResult<'_>) -> Outcome + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Every error and every timeout is a handled failure; every value succeeds.
    pub fn handle_all_errors() -> Self {
        Self::new(|attempt| match attempt {
            AttemptResult::Value(_) => Outcome::Success,
            AttemptResult::Error(_) | AttemptResult::TimedOut => Outcome::HandledFailure,
        })
    }

    pub fn classify(&self, attempt: &AttemptResult<'_>) -> Outcome {
        (self.inner)(attempt)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::handle_all_errors()
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Classifier(..)")
    }
}
