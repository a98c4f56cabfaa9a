//! Remote call interface shared by all walkers.
//!
//! This module defines the error taxonomy for remote forge calls, the page
//! and tree shapes the walkers decode, and the [`TreeSource`] capability a
//! platform client must provide for hierarchical traversal.
//!
//! # Example
//!
//! ```ignore
//! use forgefetch::remote::{QueryDepth, TreeSource};
//!
//! async fn list_top_level<C: TreeSource>(client: &C) -> forgefetch::Result<usize> {
//!     let nodes = client.fetch_level("", QueryDepth::Level1).await?;
//!     Ok(nodes.len())
//! }
//! ```

mod errors;
mod types;

pub use errors::{FetchError, Result, is_timeout_message, short_error_message};
pub use types::{EntryKind, Page, QueryDepth, TreeEntry, TreeNode, TreeSource};
