use async_trait::async_trait;
use serde::Deserialize;

use super::errors::Result;

/// One page of items from a paginated endpoint.
///
/// `next` carries the continuation token for the following page; `None`
/// means the listing is exhausted. Encoding the "has more" flag as the
/// presence of the token makes the invariant "no more pages implies no
/// token" hold by construction.
#[derive(Debug, Clone)]
pub struct Page<T, K> {
    /// Items in the order the platform returned them.
    pub items: Vec<T>,
    /// Token for the next page, absent when the listing is exhausted.
    pub next: Option<K>,
}

impl<T> Page<T, u32> {
    /// Build a page from a REST-style numeric continuation, where the
    /// platform reports "no further pages" as a next page number of 0.
    #[must_use]
    pub fn numbered(items: Vec<T>, next_page: u32) -> Self {
        Self {
            items,
            next: (next_page != 0).then_some(next_page),
        }
    }
}

impl<T> Page<T, String> {
    /// Build a page from a GraphQL-style envelope: an explicit
    /// `has_next_page` boolean plus an opaque end cursor.
    ///
    /// The cursor is ignored when the envelope says there is nothing more.
    #[must_use]
    pub fn cursored(items: Vec<T>, has_next_page: bool, end_cursor: Option<String>) -> Self {
        Self {
            items,
            next: if has_next_page { end_cursor } else { None },
        }
    }
}

/// How many nested levels of tree entries a single call requests.
///
/// Deeper shapes amortize round trips across large trees, and they are
/// also the ones that hit server-side execution timeouts on big subtrees.
/// Every root call of a traversal pass starts at [`Level3`] and degrades
/// per path when the platform reports a timeout.
///
/// [`Level3`]: QueryDepth::Level3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryDepth {
    /// Three nested levels of entries in one round trip.
    Level3,
    /// Two nested levels.
    Level2,
    /// A single level of entries.
    Level1,
}

impl QueryDepth {
    /// Number of nested entry layers this shape returns.
    #[must_use]
    pub fn levels(self) -> usize {
        match self {
            Self::Level3 => 3,
            Self::Level2 => 2,
            Self::Level1 => 1,
        }
    }

    /// The next shallower shape, or `None` once at [`QueryDepth::Level1`].
    #[must_use]
    pub fn shallower(self) -> Option<Self> {
        match self {
            Self::Level3 => Some(Self::Level2),
            Self::Level2 => Some(Self::Level1),
            Self::Level1 => None,
        }
    }
}

/// Kind of a tree entry.
///
/// Platforms spell these differently (`blob`/`tree` in GraphQL,
/// `file`/`dir` in REST); decoding normalizes both families. Anything
/// unrecognized is preserved verbatim rather than collapsed into a
/// catch-all, so callers can still match on it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum EntryKind {
    File,
    Directory,
    Other(String),
}

impl From<String> for EntryKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "file" | "blob" => Self::File,
            "directory" | "dir" | "tree" => Self::Directory,
            _ => Self::Other(raw),
        }
    }
}

impl EntryKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Other(raw) => raw,
        }
    }
}

/// One node in a nested tree response, up to the requested depth.
///
/// Only the fields the walkers need are decoded, which keeps this
/// resilient to additions on the platform side.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeNode {
    /// Entry name within its parent directory.
    pub name: String,
    /// Full path from the tree root.
    pub path: String,
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Child entries, populated on directories for all but the deepest
    /// layer the call returned.
    #[serde(default)]
    pub children: Vec<TreeNode>,
    /// File body, present when the call asked for content.
    #[serde(default)]
    pub content: Option<String>,
    /// Size in bytes, when reported.
    #[serde(default)]
    pub size: Option<u64>,
    /// Platform-specific extras (object id, mode, ...).
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// One discovered tree row, handed to the consumer by the tree walker.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// Entry name within its parent directory.
    pub name: String,
    /// Full path from the tree root.
    pub path: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Size in bytes, when reported.
    pub size: Option<u64>,
    /// File body, when fetched.
    pub content: Option<String>,
    /// Platform-specific extras the table layer may surface.
    pub metadata: serde_json::Value,
}

impl TreeEntry {
    /// Build a row from one decoded node, dropping the nesting.
    #[must_use]
    pub fn from_node(node: &TreeNode) -> Self {
        Self {
            name: node.name.clone(),
            path: node.path.clone(),
            kind: node.kind.clone(),
            size: node.size,
            content: node.content.clone(),
            metadata: node.metadata.clone(),
        }
    }
}

/// Capability the tree walker needs from a platform client: fetch the
/// entries under `path`, nested up to `depth` levels.
///
/// # Implementation Notes
///
/// Implementors must:
/// - surface a spent request quota as [`FetchError::RateLimited`], so the
///   retry policy can wait it out;
/// - surface server-side query timeouts with message text recognizable by
///   [`is_timeout_message`], so the walker can fall back to a shallower
///   shape;
/// - build the request fresh per call rather than reusing a shared
///   mutable template, since walks may run concurrently.
///
/// [`FetchError::RateLimited`]: super::FetchError::RateLimited
/// [`is_timeout_message`]: super::is_timeout_message
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Fetch the entries directly under `path` (`""` for the tree root),
    /// nested up to `depth` levels.
    async fn fetch_level(&self, path: &str, depth: QueryDepth) -> Result<Vec<TreeNode>>;
}
