/// Chat platform boundary.
///
/// The scan engine only ever talks to the platform through [`ChatPlatform`],
/// so the whole pipeline can be exercised against an in-memory fake. The
/// production implementation lives in `discord.rs`.
use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ScanError;
use crate::report::OutboundMessage;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype!(
    /// Opaque channel, thread, or category identifier.
    ChannelId
);
id_newtype!(
    /// Opaque user identifier.
    UserId
);
id_newtype!(
    /// Opaque role identifier.
    RoleId
);
id_newtype!(
    /// Opaque message identifier, also used as the pagination cursor.
    MessageId
);

/// What a channel can be used for, as far as scanning is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Hosts text messages directly; scanned as a single surface.
    Text,
    /// A forum container; expanded into per-thread surfaces.
    Forum,
    /// A category; only useful as a parent for channel set resolution.
    Category,
    /// Anything else (voice, stage, ...); never scanned.
    Other,
}

/// Channel metadata needed by the resolver and the scan loop.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
}

/// A forum thread as reported by the platform's thread listings.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub id: ChannelId,
    pub parent: ChannelId,
    pub name: String,
    /// When the thread was created. Threads created before the scan window
    /// are skipped wholesale.
    pub created_at: Option<DateTime<Utc>>,
}

/// The slice of a message the scan engine looks at. Content is never
/// retained; only media presence matters.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    pub author_id: UserId,
    pub author_is_bot: bool,
    pub timestamp: DateTime<Utc>,
    pub attachment_count: usize,
    pub embeds: Vec<EmbedPreview>,
}

/// Media-relevant slice of an embed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedPreview {
    pub image: bool,
    pub video: bool,
    pub thumbnail: bool,
}

impl EmbedPreview {
    /// True when the embed carries a visual preview. Text/link-only embeds
    /// do not count as media.
    pub fn is_media(&self) -> bool {
        self.image || self.video || self.thumbnail
    }
}

/// A guild member with their current role set.
#[derive(Debug, Clone)]
pub struct Member {
    pub id: UserId,
    pub display_name: String,
    pub roles: BTreeSet<RoleId>,
}

/// Everything the scan engine needs from the chat platform.
///
/// Message pages are returned newest-first; `before` excludes the cursor
/// message itself. All calls are surface-local: an error never means the
/// whole scan must stop, only that the affected surface yields nothing.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Fetch metadata for a single channel by id.
    async fn channel_info(&self, id: ChannelId) -> Result<ChannelInfo, ScanError>;

    /// List the direct, non-thread children of a category.
    async fn category_channels(&self, category: ChannelId) -> Result<Vec<ChannelInfo>, ScanError>;

    /// Fetch one page of messages older than `before` (newest page when
    /// `before` is `None`), newest-first, at most `limit` entries.
    async fn message_page(
        &self,
        channel: ChannelId,
        before: Option<MessageId>,
        limit: u8,
    ) -> Result<Vec<Message>, ScanError>;

    /// Resolve a user to their current membership. `Ok(None)` means the
    /// user is no longer a member (left the guild).
    async fn member(&self, user: UserId) -> Result<Option<Member>, ScanError>;

    /// List the currently active threads under a forum.
    async fn active_threads(&self, forum: ChannelId) -> Result<Vec<ThreadInfo>, ScanError>;

    /// List one page of archived threads under a forum, most recent first.
    async fn archived_threads(
        &self,
        forum: ChannelId,
        limit: u8,
    ) -> Result<Vec<ThreadInfo>, ScanError>;

    /// Deliver an assembled report message to a destination channel.
    async fn send_message(
        &self,
        destination: ChannelId,
        message: &OutboundMessage,
    ) -> Result<(), ScanError>;
}
