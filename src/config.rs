/// Bot configuration.
///
/// Loaded once at startup from a JSON file. IDs are raw snowflakes; typed
/// wrappers are produced on demand so the scan engine never sees bare u64s.
use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::platform::{ChannelId, RoleId};
use crate::window::ReportType;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Guild the bot operates in.
    pub guild_id: u64,
    /// Channels to scan (text channels and forum containers).
    #[serde(default)]
    pub channels: Vec<u64>,
    /// Categories whose text children are scanned.
    #[serde(default)]
    pub categories: Vec<u64>,
    /// Only media from holders of these roles is counted.
    pub tracked_roles: Vec<u64>,
    /// Role required to invoke the manual report commands. `None` means
    /// anyone may.
    #[serde(default)]
    pub command_role: Option<u64>,
    /// Weekly report schedule and destination.
    pub weekly: ReportConfig,
    /// Monthly report schedule and destination.
    pub monthly: ReportConfig,
    /// Timezone the schedules and the monthly window are evaluated in,
    /// e.g. "Asia/Riyadh".
    pub timezone: String,
    /// Port for the health endpoint.
    #[serde(default = "default_health_port")]
    pub health_port: u16,
    #[serde(default)]
    pub tunables: ScanTunables,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Cron expression (seconds-resolution, six or seven fields).
    pub schedule: String,
    /// Channel the report is posted to.
    pub destination: u64,
}

/// Scan safety ceilings and pacing knobs.
///
/// All of these have conservative defaults; they exist so operators can
/// tune rate-limit pressure and memory bounds without a rebuild.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ScanTunables {
    /// Messages per page; 100 is the platform maximum.
    pub page_size: u8,
    /// Hard ceiling on messages processed for one surface.
    pub max_messages_per_surface: usize,
    /// Member cache is cleared after this many surfaces.
    pub surfaces_per_cache_clear: usize,
    /// How many archived threads of a forum are considered, one page only.
    pub archived_thread_page_size: u8,
    /// Delay between successive page fetches within one surface.
    pub batch_delay_ms: u64,
    /// Escalated delay once `batches_before_slowdown` consecutive fetches
    /// have happened on one surface.
    pub batch_delay_slow_ms: u64,
    pub batches_before_slowdown: u32,
    /// Delay between surfaces (channel-to-channel and thread-to-thread).
    pub surface_delay_ms: u64,
}

impl Default for ScanTunables {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_messages_per_surface: 10_000,
            surfaces_per_cache_clear: 25,
            archived_thread_page_size: 50,
            batch_delay_ms: 500,
            batch_delay_slow_ms: 1500,
            batches_before_slowdown: 10,
            surface_delay_ms: 1000,
        }
    }
}

fn default_health_port() -> u16 {
    10000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tracked_roles.is_empty() {
            return Err(anyhow!("tracked_roles must not be empty"));
        }
        if self.channels.is_empty() && self.categories.is_empty() {
            return Err(anyhow!("at least one channel or category is required"));
        }
        self.tz()?;
        Ok(())
    }

    /// Parse the configured timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Invalid timezone '{}': {}", self.timezone, e))
    }

    pub fn tracked_role_set(&self) -> BTreeSet<RoleId> {
        self.tracked_roles.iter().copied().map(RoleId).collect()
    }

    pub fn explicit_channels(&self) -> Vec<ChannelId> {
        self.channels.iter().copied().map(ChannelId).collect()
    }

    pub fn category_ids(&self) -> Vec<ChannelId> {
        self.categories.iter().copied().map(ChannelId).collect()
    }

    pub fn report(&self, report_type: ReportType) -> &ReportConfig {
        match report_type {
            ReportType::Weekly => &self.weekly,
            ReportType::Monthly => &self.monthly,
        }
    }

    pub fn destination(&self, report_type: ReportType) -> ChannelId {
        ChannelId(self.report(report_type).destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_json() -> &'static str {
        r#"{
            "guild_id": 100,
            "channels": [1, 2],
            "categories": [10],
            "tracked_roles": [7],
            "weekly": { "schedule": "0 0 11 * * Fri", "destination": 99 },
            "monthly": { "schedule": "0 0 11 1 * *", "destination": 98 },
            "timezone": "Asia/Riyadh"
        }"#
    }

    #[test]
    fn load_applies_tunable_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_json().as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.tunables.page_size, 100);
        assert_eq!(config.tunables.max_messages_per_surface, 10_000);
        assert_eq!(config.health_port, 10000);
        assert_eq!(config.destination(ReportType::Weekly), ChannelId(99));
        assert_eq!(config.destination(ReportType::Monthly), ChannelId(98));
    }

    #[test]
    fn rejects_empty_tracked_roles() {
        let json = sample_json().replace("[7]", "[]");
        let config: Config = serde_json::from_str(&json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_timezone() {
        let json = sample_json().replace("Asia/Riyadh", "Mars/Olympus");
        let config: Config = serde_json::from_str(&json).unwrap();
        assert!(config.validate().is_err());
    }
}
