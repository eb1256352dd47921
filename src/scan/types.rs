/// Data structures for the scan engine.
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::error::ScanError;
use crate::platform::{ChannelId, RoleId, UserId};
use crate::window::ReportType;

/// Where a contribution was recorded.
///
/// Forum threads carry their parent forum so downstream breakdowns can
/// group all threads of one forum without parsing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKey {
    Channel(ChannelId),
    ForumThread { forum: ChannelId, thread: ChannelId },
}

impl LocationKey {
    /// The channel messages are actually fetched from.
    pub fn surface_id(&self) -> ChannelId {
        match self {
            LocationKey::Channel(id) => *id,
            LocationKey::ForumThread { thread, .. } => *thread,
        }
    }

    /// The id breakdowns group by: the forum for threads, the channel
    /// itself otherwise.
    pub fn group_id(&self) -> ChannelId {
        match self {
            LocationKey::Channel(id) => *id,
            LocationKey::ForumThread { forum, .. } => *forum,
        }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationKey::Channel(id) => write!(f, "{}", id),
            LocationKey::ForumThread { forum, thread } => {
                write!(f, "forum-{}-{}", forum, thread)
            }
        }
    }
}

/// Media counts for one user within a single scan pass.
///
/// Created lazily on the first qualifying message, mutated additively, and
/// discarded when the pass ends. Invariant: `total` always equals the sum
/// of `channel_counts` values.
#[derive(Debug, Clone)]
pub struct UserStatistic {
    pub user_id: UserId,
    pub display_name: String,
    pub total: u64,
    pub channel_counts: IndexMap<LocationKey, u64>,
    /// Roles held at the time of the contributing message. Diagnostics
    /// only; never consulted for filtering after creation.
    pub role_snapshot: Vec<RoleId>,
}

impl UserStatistic {
    pub fn new(user_id: UserId, display_name: String, role_snapshot: Vec<RoleId>) -> Self {
        Self {
            user_id,
            display_name,
            total: 0,
            channel_counts: IndexMap::new(),
            role_snapshot,
        }
    }

    /// Record `count` media units under `location`.
    pub fn record(&mut self, location: LocationKey, count: u64) {
        self.total += count;
        *self.channel_counts.entry(location).or_insert(0) += count;
    }
}

/// Per-user statistics for one surface or for the whole scan.
pub type StatMap = IndexMap<UserId, UserStatistic>;

/// The sole artifact of a scan pass and the sole input of the report
/// assembler.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub report_type: ReportType,
    pub since: DateTime<Utc>,
    pub users: StatMap,
}

impl ScanResult {
    pub fn new(report_type: ReportType, since: DateTime<Utc>) -> Self {
        Self {
            report_type,
            since,
            users: StatMap::new(),
        }
    }

    pub fn total_media(&self) -> u64 {
        self.users.values().map(|u| u.total).sum()
    }

    /// Users sorted by descending total, capped at `limit`.
    pub fn top_users(&self, limit: usize) -> Vec<&UserStatistic> {
        let mut users: Vec<&UserStatistic> = self.users.values().collect();
        users.sort_by(|a, b| b.total.cmp(&a.total));
        users.truncate(limit);
        users
    }

    /// Per-channel totals with forum threads grouped under their forum.
    /// This is the derived view; location keys themselves stay exact.
    pub fn channel_breakdown(&self) -> IndexMap<ChannelId, u64> {
        let mut breakdown = IndexMap::new();
        for user in self.users.values() {
            for (location, count) in &user.channel_counts {
                *breakdown.entry(location.group_id()).or_insert(0) += count;
            }
        }
        breakdown
    }
}

/// A surface that could not be scanned, kept for diagnostics. The scan
/// itself continues past these.
#[derive(Debug)]
pub struct SurfaceFailure {
    pub location: LocationKey,
    pub error: ScanError,
}

/// Final product of a multi-surface scan: merged statistics plus the list
/// of surfaces that failed.
#[derive(Debug)]
pub struct ScanOutcome {
    pub result: ScanResult,
    pub failures: Vec<SurfaceFailure>,
    pub surfaces_scanned: usize,
}
