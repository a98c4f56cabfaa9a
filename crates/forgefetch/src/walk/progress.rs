//! Progress reporting for walk operations.
//!
//! Walkers report through an optional callback so UI layers can render
//! activity without this crate depending on any terminal or logging
//! machinery.

use crate::remote::QueryDepth;

/// Progress events emitted while walking a remote resource.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum FetchProgress {
    /// Fetched one page of a flat listing.
    FetchedPage {
        /// Ordinal of the call within the walk (1-indexed).
        page: u32,
        /// Items on this page.
        count: usize,
        /// Rows delivered so far, across pages.
        total_so_far: usize,
    },

    /// Finished a flat listing.
    PageWalkComplete {
        /// Total rows delivered.
        total: usize,
    },

    /// Waiting out a rate-limit backoff before re-attempting a call.
    RateLimitBackoff {
        /// What is being fetched.
        target: String,
        /// How long the walker will wait.
        retry_after_ms: u64,
        /// Attempt number that just failed (1-indexed).
        attempt: u32,
    },

    /// Started one pass over the current tree frontier.
    TreePass {
        /// Pass number (1-indexed).
        pass: usize,
        /// Directories queued for expansion in this pass.
        frontier: usize,
    },

    /// A tree call timed out and the walker fell back to a shallower shape.
    DepthDegraded {
        /// The path whose call timed out.
        path: String,
        /// Shape that timed out.
        from: QueryDepth,
        /// Shape tried next.
        to: QueryDepth,
    },

    /// A subtree failed with a non-timeout error and was skipped.
    SubtreeSkipped {
        /// Root of the abandoned subtree.
        path: String,
        /// Short error message.
        error: String,
    },

    /// Finished a tree walk.
    TreeWalkComplete {
        /// File rows emitted.
        files: usize,
        /// Directory rows emitted.
        directories: usize,
    },
}

/// Progress callback for walk operations.
pub type ProgressCallback = Box<dyn Fn(FetchProgress) + Send + Sync>;

/// Send a progress event if a callback is present.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: FetchProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
