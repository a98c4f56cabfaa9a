//! Generic paginated walking.
//!
//! One loop serves both pagination styles the forge APIs use: numeric
//! 1-based page numbers (REST) and opaque cursors (GraphQL). The loop is
//! generic over the continuation token; the two realizations differ only
//! in how the fetch closure builds its request and decodes the
//! continuation (see [`Page::numbered`] and [`Page::cursored`]).

use std::future::Future;

use crate::remote::{FetchError, Page};
use crate::retry;
use crate::walk::progress::{FetchProgress, ProgressCallback, emit};
use crate::walk::types::{CancelFlag, RowSink};

/// Page size to request when the consumer wants at most `limit` rows:
/// never more than the server maximum, and never more than the limit.
#[must_use]
pub fn effective_page_size(server_max: u32, limit: Option<u64>) -> u32 {
    match limit {
        Some(limit) => server_max.min(limit.min(u64::from(u32::MAX)) as u32),
        None => server_max,
    }
}

/// Drive a paginated listing to exhaustion, feeding every item to `sink`.
///
/// `fetch` is invoked with `None` for the first page and afterwards with
/// the token the previous page returned, verbatim. Every call goes through
/// the rate-limit retry policy. Pages are emitted strictly in sequence:
/// page *k* is fully delivered before page *k+1* is requested.
///
/// The loop stops when a page reports no continuation, when the sink's
/// budget is spent (mid-page if need be - at most the requested count is
/// ever delivered), or when `cancel` is raised. A fatal error aborts the
/// whole walk: a flat listing has no meaningful way to skip a page without
/// silently losing records.
///
/// Returns the number of rows delivered.
pub async fn for_each_page<T, K, F, Fut, S>(
    mut fetch: F,
    sink: &mut S,
    cancel: Option<&CancelFlag>,
    on_progress: Option<&ProgressCallback>,
) -> Result<usize, FetchError>
where
    K: Clone,
    F: FnMut(Option<K>) -> Fut,
    Fut: Future<Output = Result<Page<T, K>, FetchError>>,
    S: RowSink<T> + ?Sized,
{
    let mut token: Option<K> = None;
    let mut delivered = 0usize;
    let mut page_no = 0u32;

    loop {
        if sink.remaining() == Some(0) || cancel.is_some_and(CancelFlag::is_cancelled) {
            break;
        }

        let page = retry::execute(|| fetch(token.clone()), "page walk", on_progress).await?;
        page_no += 1;
        let count = page.items.len();

        let mut stop = false;
        for item in page.items {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                stop = true;
                break;
            }
            sink.emit(item);
            delivered += 1;
            if sink.remaining() == Some(0) {
                stop = true;
                break;
            }
        }

        emit(
            on_progress,
            FetchProgress::FetchedPage {
                page: page_no,
                count,
                total_so_far: delivered,
            },
        );

        if stop {
            break;
        }

        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    emit(
        on_progress,
        FetchProgress::PageWalkComplete { total: delivered },
    );

    Ok(delivered)
}
