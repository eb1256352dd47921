/// Scan-and-aggregate engine.
///
/// # Architecture
///
/// The engine is organized into focused submodules:
/// - **types**: statistic maps, location keys, scan results
/// - **resolver**: category expansion into the flat channel set
/// - **authorizer**: role-based inclusion filtering
/// - **classifier**: per-message media counting
/// - **pagination**: backward pagination over one surface
/// - **forum**: expansion of forum containers into thread surfaces
/// - **member_cache**: bounded author-resolution cache
///
/// Surfaces are processed one at a time, in resolver order; there is no
/// parallel fan-out, to respect platform rate limits.
use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

pub mod authorizer;
pub mod classifier;
pub mod forum;
pub mod member_cache;
pub mod pagination;
pub mod resolver;
pub mod types;

use member_cache::MemberCache;
use types::{LocationKey, ScanOutcome, ScanResult, StatMap, SurfaceFailure};

use crate::aggregate;
use crate::config::ScanTunables;
use crate::error::ScanError;
use crate::platform::{ChannelInfo, ChannelKind, ChatPlatform, RoleId};
use crate::window::ReportType;

/// Shared state for one scan pass: the platform handle, the filter inputs,
/// the member cache, and the pacing/ceiling bookkeeping.
pub struct ScanSession<'a> {
    pub(crate) platform: &'a dyn ChatPlatform,
    pub(crate) tracked: &'a BTreeSet<RoleId>,
    pub(crate) tunables: &'a ScanTunables,
    pub(crate) cache: MemberCache,
    surfaces_done: usize,
}

impl<'a> ScanSession<'a> {
    pub fn new(
        platform: &'a dyn ChatPlatform,
        tracked: &'a BTreeSet<RoleId>,
        tunables: &'a ScanTunables,
    ) -> Self {
        Self {
            platform,
            tracked,
            tunables,
            cache: MemberCache::new(),
            surfaces_done: 0,
        }
    }

    /// Delay between page fetches, escalating after a run of consecutive
    /// fetches on the same surface.
    pub(crate) async fn pace_batch(&self, fetches: u32) {
        let ms = if fetches >= self.tunables.batches_before_slowdown {
            self.tunables.batch_delay_slow_ms
        } else {
            self.tunables.batch_delay_ms
        };
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Delay between surfaces (channels and threads alike).
    pub(crate) async fn pace_surface(&self) {
        if self.tunables.surface_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.tunables.surface_delay_ms)).await;
        }
    }

    /// Bookkeeping after each surface; clears the member cache every
    /// `surfaces_per_cache_clear` surfaces to bound its growth.
    pub(crate) fn finish_surface(&mut self) {
        self.surfaces_done += 1;
        if self.tunables.surfaces_per_cache_clear > 0
            && self.surfaces_done % self.tunables.surfaces_per_cache_clear == 0
        {
            self.cache.clear();
        }
    }

    pub fn surfaces_done(&self) -> usize {
        self.surfaces_done
    }
}

/// Scan every resolved channel (expanding forums into threads) and fold the
/// per-surface results into one [`ScanOutcome`].
///
/// Failures are isolated per surface: a channel that cannot be fetched is
/// recorded as a diagnostic and contributes nothing, while the scan keeps
/// going and still terminates successfully.
pub async fn run_scan(
    platform: &dyn ChatPlatform,
    channels: &[ChannelInfo],
    tracked: &BTreeSet<RoleId>,
    tunables: &ScanTunables,
    report_type: ReportType,
    since: DateTime<Utc>,
) -> ScanOutcome {
    let mut session = ScanSession::new(platform, tracked, tunables);
    let mut collected: Vec<(LocationKey, Result<StatMap, ScanError>)> = Vec::new();

    for (index, channel) in channels.iter().enumerate() {
        if index > 0 {
            session.pace_surface().await;
        }
        match channel.kind {
            ChannelKind::Text => {
                let location = LocationKey::Channel(channel.id);
                let result = pagination::scan_surface(&mut session, location, since).await;
                session.finish_surface();
                collected.push((location, result));
            }
            ChannelKind::Forum => {
                collected.extend(forum::expand_forum(&mut session, channel.id, since).await);
            }
            _ => {}
        }
    }

    let surfaces_scanned = session.surfaces_done();

    // Fold: merge successes, record failures.
    let mut result = ScanResult::new(report_type, since);
    let mut failures = Vec::new();
    for (location, surface) in collected {
        match surface {
            Ok(map) => aggregate::merge(&mut result.users, map),
            Err(error) => {
                warn!(surface = %location, error = %error, "surface failed, treated as empty");
                failures.push(SurfaceFailure { location, error });
            }
        }
    }

    info!(
        report_type = %report_type,
        surfaces = surfaces_scanned,
        failed = failures.len(),
        contributors = result.users.len(),
        total_media = result.total_media(),
        "scan pass complete"
    );

    ScanOutcome {
        result,
        failures,
        surfaces_scanned,
    }
}
