/// Forum expansion.
///
/// A forum is a set of threads, each of which is scanned as its own
/// surface. Active threads are enumerated in full; archived threads only
/// for one bounded page, so older archives fall out of scope by design.
use chrono::{DateTime, Utc};
use tracing::debug;

use super::pagination::scan_surface;
use super::types::{LocationKey, StatMap};
use super::ScanSession;
use crate::error::ScanError;
use crate::platform::{ChannelId, ThreadInfo};

/// Expand a forum into per-thread scan results.
///
/// Returns one `(location, result)` entry per surviving thread so the
/// caller's fold treats threads exactly like top-level channels. Failing
/// to list the forum's threads at all yields a single failed entry for the
/// forum itself.
pub async fn expand_forum(
    session: &mut ScanSession<'_>,
    forum: ChannelId,
    since: DateTime<Utc>,
) -> Vec<(LocationKey, Result<StatMap, ScanError>)> {
    let threads = match list_threads(session, forum).await {
        Ok(threads) => threads,
        Err(e) => return vec![(LocationKey::Channel(forum), Err(e))],
    };

    let mut results = Vec::new();
    let mut first = true;
    for thread in threads {
        // Threads are atomic units: created before the window means the
        // whole thread is skipped, created in-window means it is scanned
        // even if no message qualifies.
        if let Some(created) = thread.created_at {
            if created < since {
                continue;
            }
        }

        if !first {
            session.pace_surface().await;
        }
        first = false;

        let location = LocationKey::ForumThread {
            forum,
            thread: thread.id,
        };
        let result = scan_surface(session, location, since).await;
        session.finish_surface();
        results.push((location, result));
    }

    debug!(forum = %forum, threads = results.len(), "forum expansion finished");
    results
}

/// Active threads plus one page of archived ones, deduplicated by id.
async fn list_threads(
    session: &mut ScanSession<'_>,
    forum: ChannelId,
) -> Result<Vec<ThreadInfo>, ScanError> {
    let mut threads = session.platform.active_threads(forum).await?;
    let archived = session
        .platform
        .archived_threads(forum, session.tunables.archived_thread_page_size)
        .await?;

    for thread in archived {
        if threads.iter().all(|t| t.id != thread.id) {
            threads.push(thread);
        }
    }
    Ok(threads)
}
