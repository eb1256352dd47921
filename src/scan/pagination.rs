/// Backward pagination over a single surface.
///
/// Pages through a channel or forum thread newest-first, applying the
/// authorization and media filters to every message, until the since-date
/// cutoff, the end of history, or the per-surface message ceiling is hit.
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::authorizer::authorized;
use super::classifier::media_count;
use super::types::{LocationKey, StatMap, UserStatistic};
use super::ScanSession;
use crate::error::ScanError;

/// Scan one surface and return its per-user statistic map.
///
/// The first message older than `since` terminates the whole surface:
/// pages are newest-first, so everything after it is older still. The
/// pagination cursor always advances to the oldest message of a batch,
/// whether or not that message contributed.
pub async fn scan_surface(
    session: &mut ScanSession<'_>,
    location: LocationKey,
    since: DateTime<Utc>,
) -> Result<StatMap, ScanError> {
    let channel = location.surface_id();
    let tunables = session.tunables;
    let mut stats = StatMap::new();
    let mut cursor = None;
    let mut processed: usize = 0;
    let mut fetches: u32 = 0;

    'pages: loop {
        let page = session
            .platform
            .message_page(channel, cursor, tunables.page_size)
            .await?;
        if page.is_empty() {
            break;
        }
        fetches += 1;

        for message in &page {
            // Sole termination-by-date rule: one out-of-window message ends
            // the surface, rest of batch included.
            if message.timestamp < since {
                break 'pages;
            }

            processed += 1;
            if processed > tunables.max_messages_per_surface {
                warn!(
                    surface = %location,
                    ceiling = tunables.max_messages_per_surface,
                    "message ceiling reached, truncating surface"
                );
                break 'pages;
            }

            if message.author_is_bot {
                continue;
            }

            let Some(member) = session.cache.resolve(session.platform, message.author_id).await
            else {
                continue;
            };

            if !authorized(&member.roles, session.tracked) {
                continue;
            }

            let count = media_count(message);
            if count == 0 {
                continue;
            }

            stats
                .entry(message.author_id)
                .or_insert_with(|| {
                    UserStatistic::new(
                        member.id,
                        member.display_name.clone(),
                        member.roles.iter().copied().collect(),
                    )
                })
                .record(location, count);
        }

        // Pages are newest-first, so the last entry is the oldest.
        cursor = page.last().map(|m| m.id);

        if page.len() < tunables.page_size as usize {
            break;
        }

        session.pace_batch(fetches).await;
    }

    debug!(
        surface = %location,
        processed,
        contributors = stats.len(),
        "surface scan finished"
    );
    Ok(stats)
}
