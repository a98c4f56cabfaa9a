//! Depth-adaptive traversal of hierarchical tree resources.
//!
//! A single tree call can request up to three nested levels of entries,
//! which amortizes round trips across large trees. Deep shapes are exactly
//! the ones that hit server-side execution timeouts on big subtrees, so
//! each path's call falls back to shallower shapes when the platform
//! reports a timeout. Degradation is local to the path: a timeout is a
//! function of the subtree's size, not of the resource, and the next path
//! starts back at the deepest shape. A single repository can hold both a
//! huge flat directory that times out at depth 3 and small ones that are
//! fine, side by side.
//!
//! Subtree failures are tolerated: an unreachable subtree is logged and
//! skipped rather than aborting the whole walk.

use std::collections::BTreeSet;

use crate::remote::{EntryKind, FetchError, QueryDepth, TreeEntry, TreeNode, TreeSource};
use crate::retry;
use crate::walk::paths::reduce;
use crate::walk::progress::{FetchProgress, ProgressCallback, emit};
use crate::walk::types::{CancelFlag, RowSink, WalkStats};

/// Walks every directory and file under a set of root paths.
///
/// # Example
///
/// ```ignore
/// use forgefetch::{FnSink, RowBudget, TreeWalker};
///
/// let mut sink = FnSink::new(RowBudget::unbounded(), |entry| rows.push(entry));
/// let stats = TreeWalker::new(&client).walk([String::new()], &mut sink).await;
/// ```
pub struct TreeWalker<'a, C> {
    source: &'a C,
    cancel: Option<&'a CancelFlag>,
    on_progress: Option<&'a ProgressCallback>,
}

impl<'a, C: TreeSource> TreeWalker<'a, C> {
    #[must_use]
    pub fn new(source: &'a C) -> Self {
        Self {
            source,
            cancel: None,
            on_progress: None,
        }
    }

    /// Stop issuing remote calls once `cancel` is raised.
    #[must_use]
    pub fn with_cancel(mut self, cancel: &'a CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Report walk progress through `on_progress`.
    #[must_use]
    pub fn with_progress(mut self, on_progress: &'a ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Enumerate the full tree under `roots`, streaming every discovered
    /// entry to `sink`.
    ///
    /// Runs passes over successive frontiers: directories found at the
    /// deepest layer of one pass become the roots of the next, until no
    /// new directories remain. Entries rediscovered through overlapping
    /// passes are emitted once. A fatal error under one path skips that
    /// subtree and the walk carries on; the details land in the returned
    /// [`WalkStats`].
    pub async fn walk<S>(&self, roots: impl IntoIterator<Item = String>, sink: &mut S) -> WalkStats
    where
        S: RowSink<TreeEntry> + ?Sized,
    {
        let mut stats = WalkStats::default();
        // Entry paths already delivered; spans passes so overlapping
        // responses do not produce duplicate rows.
        let mut seen: BTreeSet<String> = BTreeSet::new();
        // Paths already used as a pass root. Never expanded twice, which
        // also bounds the number of passes.
        let mut expanded: BTreeSet<String> = BTreeSet::new();
        let mut frontier = reduce(roots);

        while !frontier.is_empty() && !self.should_stop(sink) {
            stats.passes += 1;
            emit(
                self.on_progress,
                FetchProgress::TreePass {
                    pass: stats.passes,
                    frontier: frontier.len(),
                },
            );

            let mut next: Vec<String> = Vec::new();
            for path in &frontier {
                if self.should_stop(sink) {
                    break;
                }
                if !expanded.insert(path.clone()) {
                    continue;
                }

                match self.fetch_adaptive(path, &mut stats).await {
                    Ok((nodes, depth)) => {
                        self.collect(&nodes, depth.levels(), &mut seen, &mut next, sink, &mut stats);
                    }
                    // A ladder cut short by cancellation is not a failed
                    // subtree; the outer check ends the walk.
                    Err(_) if self.cancelled() => break,
                    Err(err) => self.skip_subtree(path, &err, &mut stats),
                }
            }

            frontier = reduce(next.into_iter().filter(|p| !expanded.contains(p)));
        }

        emit(
            self.on_progress,
            FetchProgress::TreeWalkComplete {
                files: stats.files,
                directories: stats.directories,
            },
        );

        stats
    }

    /// Fetch file bodies for a set of known directories.
    ///
    /// Content retrieval is a flat second pass: one single-level call per
    /// directory, so the depth-adaptive logic does not apply. Only file
    /// entries are emitted. Subtree failures are skipped the same way the
    /// structural walk skips them.
    pub async fn fetch_contents<S>(
        &self,
        dirs: impl IntoIterator<Item = String>,
        sink: &mut S,
    ) -> WalkStats
    where
        S: RowSink<TreeEntry> + ?Sized,
    {
        let mut stats = WalkStats::default();
        let dirs: BTreeSet<String> = dirs.into_iter().collect();

        for path in &dirs {
            if self.should_stop(sink) {
                break;
            }

            stats.calls += 1;
            let result = retry::execute(
                || self.source.fetch_level(path, QueryDepth::Level1),
                path,
                self.on_progress,
            )
            .await;

            match result {
                Ok(nodes) => {
                    for node in &nodes {
                        if self.should_stop(sink) {
                            break;
                        }
                        if node.kind == EntryKind::File {
                            stats.files += 1;
                            sink.emit(TreeEntry::from_node(node));
                        }
                    }
                }
                Err(err) => self.skip_subtree(path, &err, &mut stats),
            }
        }

        stats
    }

    /// Fetch one path, starting at the deepest shape and degrading on
    /// timeout-class failures.
    ///
    /// Rate-limit retries happen inside each shape's call, and the ladder
    /// never revisits a shape, so remote calls for one path are bounded by
    /// the retry cap times the number of shapes. A timeout at the
    /// shallowest shape is fatal for the path.
    async fn fetch_adaptive(
        &self,
        path: &str,
        stats: &mut WalkStats,
    ) -> Result<(Vec<TreeNode>, QueryDepth), FetchError> {
        let mut depth = QueryDepth::Level3;

        loop {
            stats.calls += 1;
            let result = retry::execute(
                || self.source.fetch_level(path, depth),
                path,
                self.on_progress,
            )
            .await;

            match result {
                Ok(nodes) => return Ok((nodes, depth)),
                Err(err) if err.is_timeout() => match depth.shallower() {
                    Some(shallower) if !self.cancelled() => {
                        tracing::debug!(
                            "Tree query for {:?} timed out at {:?}, falling back to {:?}",
                            path,
                            depth,
                            shallower
                        );
                        emit(
                            self.on_progress,
                            FetchProgress::DepthDegraded {
                                path: path.to_string(),
                                from: depth,
                                to: shallower,
                            },
                        );
                        depth = shallower;
                    }
                    _ => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Emit every entry decoded from one response and record which
    /// directories still need expansion: only those at the deepest layer
    /// the call actually returned, since shallower directories came back
    /// with their children inline.
    fn collect<S>(
        &self,
        nodes: &[TreeNode],
        layers_left: usize,
        seen: &mut BTreeSet<String>,
        next: &mut Vec<String>,
        sink: &mut S,
        stats: &mut WalkStats,
    ) where
        S: RowSink<TreeEntry> + ?Sized,
    {
        for node in nodes {
            if self.should_stop(sink) {
                return;
            }

            if seen.insert(node.path.clone()) {
                match node.kind {
                    EntryKind::File => stats.files += 1,
                    EntryKind::Directory => stats.directories += 1,
                    EntryKind::Other(_) => {}
                }
                sink.emit(TreeEntry::from_node(node));
            }

            if node.kind == EntryKind::Directory {
                if layers_left <= 1 {
                    next.push(node.path.clone());
                } else {
                    self.collect(&node.children, layers_left - 1, seen, next, sink, stats);
                }
            }
        }
    }

    fn skip_subtree(&self, path: &str, err: &FetchError, stats: &mut WalkStats) {
        let message = crate::remote::short_error_message(err);
        tracing::warn!("Skipping subtree {:?}: {}", path, message);
        emit(
            self.on_progress,
            FetchProgress::SubtreeSkipped {
                path: path.to_string(),
                error: message.clone(),
            },
        );
        stats.skipped_subtrees += 1;
        stats.errors.push(format!("{path}: {message}"));
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelFlag::is_cancelled)
    }

    fn should_stop<S>(&self, sink: &S) -> bool
    where
        S: RowSink<TreeEntry> + ?Sized,
    {
        sink.remaining() == Some(0) || self.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::walk::types::{FnSink, RowBudget};

    /// Scripted tree source: responses keyed by (path, depth), with a log
    /// of every call in order.
    #[derive(Default)]
    struct ScriptedTree {
        responses: HashMap<(String, QueryDepth), Result<Vec<TreeNode>, &'static str>>,
        calls: Mutex<Vec<(String, QueryDepth)>>,
    }

    impl ScriptedTree {
        fn respond(
            mut self,
            path: &str,
            depth: QueryDepth,
            response: Result<Vec<TreeNode>, &'static str>,
        ) -> Self {
            self.responses
                .insert((path.to_string(), depth), response);
            self
        }

        fn calls(&self) -> Vec<(String, QueryDepth)> {
            self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl TreeSource for ScriptedTree {
        async fn fetch_level(
            &self,
            path: &str,
            depth: QueryDepth,
        ) -> crate::Result<Vec<TreeNode>> {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((path.to_string(), depth));

            match self.responses.get(&(path.to_string(), depth)) {
                Some(Ok(nodes)) => Ok(nodes.clone()),
                Some(Err(message)) => Err(FetchError::api(*message)),
                None => Err(FetchError::not_found(path.to_string())),
            }
        }
    }

    fn file(path: &str) -> TreeNode {
        node(path, EntryKind::File, vec![])
    }

    fn dir(path: &str, children: Vec<TreeNode>) -> TreeNode {
        node(path, EntryKind::Directory, children)
    }

    fn node(path: &str, kind: EntryKind, children: Vec<TreeNode>) -> TreeNode {
        TreeNode {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            kind,
            children,
            content: None,
            size: None,
            metadata: serde_json::Value::Null,
        }
    }

    fn collect_sink(rows: &mut Vec<TreeEntry>) -> FnSink<impl FnMut(TreeEntry) + Send + '_> {
        FnSink::new(RowBudget::unbounded(), |entry| rows.push(entry))
    }

    #[tokio::test(start_paused = true)]
    async fn degrades_on_timeouts_and_never_reattempts_deeper_shapes() {
        let source = ScriptedTree::default()
            .respond("", QueryDepth::Level3, Err("query timed out"))
            .respond("", QueryDepth::Level2, Err("504 gateway"))
            .respond("", QueryDepth::Level1, Ok(vec![file("README.md")]));

        let mut rows = Vec::new();
        let mut sink = collect_sink(&mut rows);
        let stats = TreeWalker::new(&source).walk([String::new()], &mut sink).await;

        drop(sink);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "README.md");
        assert_eq!(stats.files, 1);
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.skipped_subtrees, 0);

        // The ladder went strictly downward, one attempt per shape.
        assert_eq!(
            source.calls(),
            vec![
                (String::new(), QueryDepth::Level3),
                (String::new(), QueryDepth::Level2),
                (String::new(), QueryDepth::Level1),
            ]
        );
    }

    #[tokio::test]
    async fn timeout_at_level1_skips_the_subtree() {
        let source = ScriptedTree::default()
            .respond("big", QueryDepth::Level3, Err("timed out"))
            .respond("big", QueryDepth::Level2, Err("timed out"))
            .respond("big", QueryDepth::Level1, Err("timed out"))
            .respond("small", QueryDepth::Level3, Ok(vec![file("small/a.rs")]));

        let mut rows = Vec::new();
        let mut sink = collect_sink(&mut rows);
        let stats = TreeWalker::new(&source)
            .walk(["big".to_string(), "small".to_string()], &mut sink)
            .await;

        drop(sink);
        // One unreachable subtree does not prevent enumerating the rest.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "small/a.rs");
        assert_eq!(stats.skipped_subtrees, 1);
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0].starts_with("big:"));
    }

    #[tokio::test]
    async fn fatal_error_skips_subtree_without_degrading() {
        let source = ScriptedTree::default()
            .respond("gone", QueryDepth::Level3, Err("bad credentials"))
            .respond("ok", QueryDepth::Level3, Ok(vec![file("ok/x.rs")]));

        let mut rows = Vec::new();
        let mut sink = collect_sink(&mut rows);
        let stats = TreeWalker::new(&source)
            .walk(["gone".to_string(), "ok".to_string()], &mut sink)
            .await;

        drop(sink);
        assert_eq!(rows.len(), 1);
        assert_eq!(stats.skipped_subtrees, 1);
        // No Level2/Level1 attempts for a non-timeout failure.
        assert_eq!(
            source.calls(),
            vec![
                ("gone".to_string(), QueryDepth::Level3),
                ("ok".to_string(), QueryDepth::Level3),
            ]
        );
    }

    #[tokio::test]
    async fn deepest_layer_directories_feed_the_next_pass() {
        // Pass 1 returns three layers under "": the layer-3 directory
        // "a/b/c" has unknown children and must seed pass 2. Each pass
        // starts back at Level3.
        let source = ScriptedTree::default()
            .respond(
                "",
                QueryDepth::Level3,
                Ok(vec![dir(
                    "a",
                    vec![dir("a/b", vec![file("a/b/f.rs"), dir("a/b/c", vec![])])],
                )]),
            )
            .respond(
                "a/b/c",
                QueryDepth::Level3,
                Ok(vec![file("a/b/c/deep.rs")]),
            );

        let mut rows = Vec::new();
        let mut sink = collect_sink(&mut rows);
        let stats = TreeWalker::new(&source).walk([String::new()], &mut sink).await;

        drop(sink);
        assert_eq!(stats.passes, 2);
        assert_eq!(stats.directories, 3);
        assert_eq!(stats.files, 2);

        let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "a/b", "a/b/f.rs", "a/b/c", "a/b/c/deep.rs"]);

        assert_eq!(
            source.calls(),
            vec![
                (String::new(), QueryDepth::Level3),
                ("a/b/c".to_string(), QueryDepth::Level3),
            ]
        );
    }

    #[tokio::test]
    async fn overlapping_responses_emit_each_entry_once() {
        // Both roots report the same "shared" subtree; the walk must
        // neither re-emit its entries nor expand it twice.
        let shared = || dir("shared", vec![file("shared/a.rs")]);
        let source = ScriptedTree::default()
            .respond("a", QueryDepth::Level3, Ok(vec![shared()]))
            .respond("b", QueryDepth::Level3, Ok(vec![shared()]));

        let mut rows = Vec::new();
        let mut sink = collect_sink(&mut rows);
        let stats = TreeWalker::new(&source)
            .walk(["a".to_string(), "b".to_string()], &mut sink)
            .await;

        drop(sink);
        let paths: Vec<&str> = rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["shared", "shared/a.rs"]);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.directories, 1);
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn prefix_roots_collapse_to_the_deepest_path() {
        // A frontier holding both "src" and "src/lib" only expands the
        // deeper path; re-expanding "src" would duplicate work.
        let source = ScriptedTree::default().respond(
            "src/lib",
            QueryDepth::Level3,
            Ok(vec![file("src/lib/walk.rs")]),
        );

        let mut rows = Vec::new();
        let mut sink = collect_sink(&mut rows);
        TreeWalker::new(&source)
            .walk(["src".to_string(), "src/lib".to_string()], &mut sink)
            .await;

        drop(sink);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            source.calls(),
            vec![("src/lib".to_string(), QueryDepth::Level3)]
        );
    }

    #[tokio::test]
    async fn budget_stops_the_walk_between_calls() {
        let source = ScriptedTree::default()
            .respond(
                "",
                QueryDepth::Level3,
                Ok(vec![file("a.rs"), file("b.rs"), dir("sub", vec![])]),
            )
            .respond("sub", QueryDepth::Level3, Ok(vec![file("sub/c.rs")]));

        let mut rows = Vec::new();
        let mut sink = FnSink::new(RowBudget::limited(2), |entry: TreeEntry| rows.push(entry));
        TreeWalker::new(&source).walk([String::new()], &mut sink).await;

        drop(sink);
        assert_eq!(rows.len(), 2);
        // Budget spent mid-response: "sub" is never expanded.
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_call() {
        let cancel = CancelFlag::new();
        let cancel_inside = cancel.clone();

        let source = ScriptedTree::default()
            .respond(
                "",
                QueryDepth::Level3,
                Ok(vec![file("a.rs"), dir("sub", vec![])]),
            )
            .respond("sub", QueryDepth::Level3, Ok(vec![file("sub/c.rs")]));

        let mut rows = Vec::new();
        let mut sink = FnSink::new(RowBudget::unbounded(), |entry: TreeEntry| {
            rows.push(entry);
            cancel_inside.cancel();
        });

        let walker = TreeWalker::new(&source);
        let stats = walker
            .with_cancel(&cancel)
            .walk([String::new()], &mut sink)
            .await;

        drop(sink);
        // The flag was raised on the first emission; "sub" is neither
        // delivered nor expanded.
        assert_eq!(rows.len(), 1);
        assert_eq!(stats.calls, 1);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn content_pass_fetches_file_bodies_per_directory() {
        let mut with_content = file("src/lib.rs");
        with_content.content = Some("pub fn answer() -> u32 { 42 }".to_string());
        with_content.size = Some(29);

        let source = ScriptedTree::default()
            .respond(
                "src",
                QueryDepth::Level1,
                Ok(vec![with_content, dir("src/walk", vec![])]),
            )
            .respond("docs", QueryDepth::Level1, Err("bad credentials"));

        let mut rows = Vec::new();
        let mut sink = collect_sink(&mut rows);
        let stats = TreeWalker::new(&source)
            .fetch_contents(["src".to_string(), "docs".to_string()], &mut sink)
            .await;

        drop(sink);
        // Directories are not rows in the content pass, and the failed
        // directory is skipped rather than fatal.
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "src/lib.rs");
        assert!(rows[0].content.as_deref().unwrap().contains("answer"));
        assert_eq!(stats.files, 1);
        assert_eq!(stats.skipped_subtrees, 1);

        // Content calls are always single-level.
        assert!(
            source
                .calls()
                .iter()
                .all(|(_, depth)| *depth == QueryDepth::Level1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limits_inside_a_tree_call_are_retried() {
        // A source that rate-limits once, then succeeds.
        struct FlakyTree {
            calls: Mutex<u32>,
        }

        #[async_trait]
        impl TreeSource for FlakyTree {
            async fn fetch_level(
                &self,
                _path: &str,
                _depth: QueryDepth,
            ) -> crate::Result<Vec<TreeNode>> {
                let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
                *calls += 1;
                if *calls == 1 {
                    Err(FetchError::RateLimited {
                        reset_at: Utc::now(),
                    })
                } else {
                    Ok(vec![node("f.rs", EntryKind::File, vec![])])
                }
            }
        }

        let source = FlakyTree {
            calls: Mutex::new(0),
        };

        let mut rows = Vec::new();
        let mut sink = collect_sink(&mut rows);
        let stats = TreeWalker::new(&source).walk([String::new()], &mut sink).await;

        drop(sink);
        assert_eq!(rows.len(), 1);
        // One logical call, two attempts underneath.
        assert_eq!(stats.calls, 1);
        assert_eq!(*source.calls.lock().unwrap(), 2);
    }
}
