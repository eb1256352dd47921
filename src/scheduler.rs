/// Scan scheduling and mutual exclusion.
///
/// Two independent state machines (weekly, monthly), each a plain
/// `Idle → Running → Idle` guard. Scheduled and manual triggers share the
/// same entry point and the same guard; a trigger that loses the race is
/// rejected, never queued. The guard is released by RAII, so `Running` can
/// never outlive the scan that owns it.
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::platform::ChatPlatform;
use crate::report;
use crate::scan::resolver::ChannelSetResolver;
use crate::scan::{self, types::ScanOutcome};
use crate::window::{self, ReportType};

/// Pause between successive report messages, to avoid tripping send rate
/// limits when many per-user reports go out.
const DELIVERY_DELAY: Duration = Duration::from_millis(300);

/// Per-report-type run flag. `try_acquire` and the handle's `Drop` are the
/// only mutation points.
#[derive(Clone, Default)]
pub struct RunGuard {
    in_progress: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt the `Idle → Running` transition. Returns `None` when a scan
    /// of this type is already running.
    pub fn try_acquire(&self) -> Option<GuardHandle> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GuardHandle {
                flag: Arc::clone(&self.in_progress),
            })
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }
}

/// Releases the guard unconditionally on drop — success, failure, or
/// panic all transition back to `Idle`.
pub struct GuardHandle {
    flag: Arc<AtomicBool>,
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// What a trigger source is told about its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A scan of this report type is already running; the request is
    /// rejected, not queued.
    AlreadyRunning,
    /// The guard was acquired and the scan is underway.
    Started,
    /// The scan finished and the report was handed to delivery.
    Completed,
    /// The scan aborted; the guard has been released and nothing was sent.
    Failed(String),
}

pub struct Scheduler {
    platform: Arc<dyn ChatPlatform>,
    config: Arc<Config>,
    tz: Tz,
    weekly_schedule: Schedule,
    monthly_schedule: Schedule,
    resolver: ChannelSetResolver,
    weekly_guard: RunGuard,
    monthly_guard: RunGuard,
}

/// An acquired scan: the guard is held from `begin` until `run` finishes.
pub struct ScanJob {
    scheduler: Arc<Scheduler>,
    report_type: ReportType,
    _guard: GuardHandle,
}

impl ScanJob {
    /// Drive the scan to its terminal state. The guard is released when
    /// this returns, whatever the outcome.
    pub async fn run(self) -> TriggerOutcome {
        let report_type = self.report_type;
        match self.scheduler.run_pipeline(report_type).await {
            Ok(outcome) => {
                info!(
                    report_type = %report_type,
                    contributors = outcome.result.users.len(),
                    failed_surfaces = outcome.failures.len(),
                    "scan completed"
                );
                TriggerOutcome::Completed
            }
            Err(e) => {
                error!(report_type = %report_type, error = %e, "scan failed");
                TriggerOutcome::Failed(e.to_string())
            }
        }
    }
}

impl Scheduler {
    pub fn new(platform: Arc<dyn ChatPlatform>, config: Arc<Config>) -> Result<Self> {
        let tz = config.tz()?;
        let weekly_schedule = Schedule::from_str(&config.weekly.schedule)
            .with_context(|| format!("Invalid weekly schedule: {}", config.weekly.schedule))?;
        let monthly_schedule = Schedule::from_str(&config.monthly.schedule)
            .with_context(|| format!("Invalid monthly schedule: {}", config.monthly.schedule))?;

        Ok(Self {
            platform,
            config,
            tz,
            weekly_schedule,
            monthly_schedule,
            resolver: ChannelSetResolver::new(),
            weekly_guard: RunGuard::new(),
            monthly_guard: RunGuard::new(),
        })
    }

    pub fn guard(&self, report_type: ReportType) -> &RunGuard {
        match report_type {
            ReportType::Weekly => &self.weekly_guard,
            ReportType::Monthly => &self.monthly_guard,
        }
    }

    fn schedule(&self, report_type: ReportType) -> &Schedule {
        match report_type {
            ReportType::Weekly => &self.weekly_schedule,
            ReportType::Monthly => &self.monthly_schedule,
        }
    }

    /// Try the `Idle → Running` transition. `None` means another scan of
    /// this type holds the guard and the caller should report
    /// `already-running`.
    pub fn begin(self: &Arc<Self>, report_type: ReportType) -> Option<ScanJob> {
        let guard = self.guard(report_type).try_acquire()?;
        info!(report_type = %report_type, "scan started");
        Some(ScanJob {
            scheduler: Arc::clone(self),
            report_type,
            _guard: guard,
        })
    }

    /// Single entry point shared by cron ticks and manual commands.
    pub async fn trigger(self: &Arc<Self>, report_type: ReportType) -> TriggerOutcome {
        match self.begin(report_type) {
            None => {
                warn!(report_type = %report_type, "scan already in progress, trigger rejected");
                TriggerOutcome::AlreadyRunning
            }
            Some(job) => job.run().await,
        }
    }

    /// Next scheduled occurrence for a report type, in the configured
    /// timezone.
    pub fn next_occurrence(&self, report_type: ReportType) -> Option<DateTime<Utc>> {
        self.schedule(report_type)
            .upcoming(self.tz)
            .next()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Spawn one timer task per report type. Each loop sleeps until the
    /// next cron occurrence and fires the shared trigger entry point.
    pub fn spawn_schedules(self: &Arc<Self>) {
        for report_type in [ReportType::Weekly, ReportType::Monthly] {
            let scheduler = Arc::clone(self);
            info!(
                report_type = %report_type,
                schedule = %scheduler.config.report(report_type).schedule,
                timezone = %scheduler.config.timezone,
                "report scheduled"
            );
            tokio::spawn(async move {
                loop {
                    let Some(next) = scheduler.next_occurrence(report_type) else {
                        warn!(report_type = %report_type, "schedule has no future occurrences");
                        break;
                    };
                    let delay = (next - Utc::now()).to_std().unwrap_or_default();
                    tokio::time::sleep(delay).await;

                    match scheduler.trigger(report_type).await {
                        TriggerOutcome::Completed => {}
                        TriggerOutcome::AlreadyRunning => {
                            warn!(report_type = %report_type, "scheduled scan skipped, already running");
                        }
                        TriggerOutcome::Failed(reason) => {
                            error!(report_type = %report_type, reason, "scheduled scan failed");
                        }
                        TriggerOutcome::Started => unreachable!("trigger is terminal"),
                    }
                }
            });
        }
    }

    /// The full pipeline: resolve the channel set, scan every surface,
    /// assemble the report, and deliver it. Delivery failures are logged
    /// only; the scan still counts as completed because the aggregation
    /// itself succeeded.
    async fn run_pipeline(&self, report_type: ReportType) -> Result<ScanOutcome> {
        let since = window::since_date(report_type, Utc::now(), self.tz);
        let tracked = self.config.tracked_role_set();
        let explicit = self.config.explicit_channels();
        let categories = self.config.category_ids();

        let channels = self
            .resolver
            .resolve(self.platform.as_ref(), &explicit, &categories)
            .await;

        let outcome = scan::run_scan(
            self.platform.as_ref(),
            channels,
            &tracked,
            &self.config.tunables,
            report_type,
            since,
        )
        .await;

        let messages = report::assemble(&outcome.result, self.next_occurrence(report_type));
        let destination = self.config.destination(report_type);
        for (index, message) in messages.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(DELIVERY_DELAY).await;
            }
            if let Err(e) = self.platform.send_message(destination, message).await {
                warn!(destination = %destination, error = %e, "report delivery failed");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejects_second_acquire_until_release() {
        let guard = RunGuard::new();
        let handle = guard.try_acquire().expect("first acquire");
        assert!(guard.is_running());
        assert!(guard.try_acquire().is_none());

        drop(handle);
        assert!(!guard.is_running());
        assert!(guard.try_acquire().is_some());
    }

    #[test]
    fn guards_for_different_report_types_are_independent() {
        let weekly = RunGuard::new();
        let monthly = RunGuard::new();
        let _w = weekly.try_acquire().unwrap();
        assert!(monthly.try_acquire().is_some());
    }
}
