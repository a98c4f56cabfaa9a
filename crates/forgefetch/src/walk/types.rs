//! Shared walk types and constants.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

/// Server-side maximum page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// An optional cap on the number of rows a consumer wants.
///
/// Decremented as rows are emitted. Once it hits zero the walkers stop
/// issuing remote calls, even mid-page; rows already delivered are never
/// retracted.
#[derive(Debug, Clone)]
pub struct RowBudget {
    remaining: Option<u64>,
}

impl RowBudget {
    /// A budget of at most `rows` rows.
    #[must_use]
    pub fn limited(rows: u64) -> Self {
        Self {
            remaining: Some(rows),
        }
    }

    /// No cap: the consumer wants everything.
    #[must_use]
    pub fn unbounded() -> Self {
        Self { remaining: None }
    }

    /// Consume one row. Returns `false` when the budget was already spent.
    pub fn consume(&mut self) -> bool {
        match &mut self.remaining {
            Some(0) => false,
            Some(n) => {
                *n -= 1;
                true
            }
            None => true,
        }
    }

    /// Rows still wanted; `None` means unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// True once the cap is spent.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Cooperative cancellation signal shared between a walk and its caller.
///
/// Walkers check the flag after each row emission and before each remote
/// call; once raised, no further calls are issued. Rows delivered before
/// the flag was observed stay delivered.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    #[inline]
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

/// Receives rows produced by a walk.
///
/// The walkers poll [`remaining`] after every [`emit`] and stop issuing
/// remote calls once it reports zero.
///
/// [`emit`]: RowSink::emit
/// [`remaining`]: RowSink::remaining
pub trait RowSink<T>: Send {
    /// Deliver one row to the consumer.
    fn emit(&mut self, row: T);

    /// Rows the consumer still wants; `None` means unbounded.
    fn remaining(&self) -> Option<u64>;
}

/// Adapter pairing a row callback with a [`RowBudget`].
///
/// This is the sink the table layer typically hands to a walker: the
/// callback pushes rows upstream, the budget carries the query's limit.
pub struct FnSink<F> {
    callback: F,
    budget: RowBudget,
}

impl<F> FnSink<F> {
    pub fn new(budget: RowBudget, callback: F) -> Self {
        Self { callback, budget }
    }

    /// The budget state after the walk.
    #[must_use]
    pub fn budget(&self) -> &RowBudget {
        &self.budget
    }
}

impl<T, F> RowSink<T> for FnSink<F>
where
    F: FnMut(T) + Send,
{
    fn emit(&mut self, row: T) {
        // The walkers stop before over-emitting; this guard keeps the
        // budget invariant even for a misbehaving caller.
        if self.budget.consume() {
            (self.callback)(row);
        }
    }

    fn remaining(&self) -> Option<u64> {
        self.budget.remaining()
    }
}

/// Sink that forwards rows into an unbounded channel.
///
/// This is the streaming delivery mode: downstream processing starts
/// while the walk is still fetching. A dropped receiver reads as an
/// exhausted budget, so a walker feeding a cancelled consumer stops
/// issuing remote calls instead of fetching into the void.
pub struct ChannelSink<T> {
    tx: mpsc::UnboundedSender<T>,
    budget: RowBudget,
    closed: bool,
}

impl<T> ChannelSink<T> {
    pub fn new(budget: RowBudget, tx: mpsc::UnboundedSender<T>) -> Self {
        Self {
            tx,
            budget,
            closed: false,
        }
    }
}

impl<T: Send> RowSink<T> for ChannelSink<T> {
    fn emit(&mut self, row: T) {
        if self.budget.consume() && self.tx.send(row).is_err() {
            self.closed = true;
        }
    }

    fn remaining(&self) -> Option<u64> {
        if self.closed {
            Some(0)
        } else {
            self.budget.remaining()
        }
    }
}

/// Counters for one walk, returned alongside the streamed rows.
#[derive(Debug, Default)]
pub struct WalkStats {
    /// Outer passes over the frontier (tree walks only).
    pub passes: usize,
    /// Retry-wrapped remote calls issued.
    pub calls: usize,
    /// File rows emitted.
    pub files: usize,
    /// Directory rows emitted.
    pub directories: usize,
    /// Subtrees abandoned after a fatal error.
    pub skipped_subtrees: usize,
    /// Short messages for the non-fatal errors behind the skips.
    pub errors: Vec<String>,
}
