//! Sequential page accumulation.
//!
//! Pages are requested one at a time; the next request is only issued after
//! the previous page has been handed to the sink, so appends always land in
//! request order.

use crate::github::client::{GithubError, Page, PageItems};
use std::future::Future;
use std::ops::ControlFlow;

/// How a pagination run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A short page (or the reported total) ended the listing
    Complete { pages: u32 },
    /// A request failed; earlier pages were already delivered
    Failed { page: u32, reason: String },
    /// Stopped at the configured page ceiling
    PageLimit { pages: u32 },
    /// The sink asked to stop
    Abandoned { pages: u32 },
}

/// Drive `fetch` from page 1 until a page shorter than `per_page` comes back.
///
/// Every successful page is passed to `sink` before the next request. Errors
/// end the run without retry.
pub async fn paginate<F, Fut, S>(per_page: u32, max_pages: u32, mut fetch: F, mut sink: S) -> FetchOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page, GithubError>>,
    S: FnMut(u32, PageItems) -> ControlFlow<()>,
{
    let mut seen: u64 = 0;
    let mut page = 1;

    while page <= max_pages {
        let Page { items, total_count } = match fetch(page).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(page, error = %e, "page request failed, stopping");
                return FetchOutcome::Failed { page, reason: e.to_string() };
            }
        };

        let len = items.len();
        seen += len as u64;
        tracing::debug!(page, len, seen, "page received");

        if sink(page, items).is_break() {
            return FetchOutcome::Abandoned { pages: page };
        }

        if len < per_page as usize {
            return FetchOutcome::Complete { pages: page };
        }
        if total_count.is_some_and(|total| seen >= total) {
            return FetchOutcome::Complete { pages: page };
        }
        page += 1;
    }

    FetchOutcome::PageLimit { pages: max_pages }
}
