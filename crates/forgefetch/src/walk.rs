//! Walk drivers for flat and hierarchical retrieval.
//!
//! This module provides the two walk loops the table layer calls into:
//!
//! - [`for_each_page`] - Drive a paginated listing to exhaustion, generic
//!   over numeric page tokens and opaque cursors
//! - [`TreeWalker`] - Enumerate a tree-shaped resource with depth-adaptive
//!   calls and per-subtree failure tolerance
//!
//! Both deliver rows through a [`RowSink`], respect its row budget, and
//! stop cleanly when a [`CancelFlag`] is raised.
//!
//! # Example
//!
//! ```ignore
//! use forgefetch::walk::{FnSink, RowBudget, TreeWalker};
//!
//! let mut sink = FnSink::new(RowBudget::unbounded(), |entry| rows.push(entry));
//! let stats = TreeWalker::new(&client)
//!     .walk([String::new()], &mut sink)
//!     .await;
//! tracing::info!("walked {} files in {} passes", stats.files, stats.passes);
//! ```

mod page;
mod paths;
mod progress;
mod tree;
mod types;

pub use page::{effective_page_size, for_each_page};
pub use paths::reduce;
pub use progress::{FetchProgress, ProgressCallback, emit};
pub use tree::TreeWalker;
pub use types::{
    CancelFlag, ChannelSink, DEFAULT_PAGE_SIZE, FnSink, RowBudget, RowSink, WalkStats,
};
