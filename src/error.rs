//! Error types for the scan engine.
//!
//! Every variant is surface-local: the multi-surface scan folds these into
//! per-surface diagnostics and keeps going. Scheduler-level failures use
//! `anyhow` at the orchestration layer instead.

use thiserror::Error;

use crate::platform::ChannelId;

#[derive(Error, Debug)]
pub enum ScanError {
    /// The channel or thread could not be found.
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    /// The bot lacks permission to read the channel or thread.
    #[error("permission denied for channel {0}")]
    PermissionDenied(ChannelId),

    /// Transient transport failure talking to the platform.
    #[error("platform error: {0}")]
    Platform(String),

    /// The assembled report could not be delivered. Logged only; the scan
    /// that produced it still counts as completed.
    #[error("report delivery failed: {0}")]
    Delivery(String),
}
