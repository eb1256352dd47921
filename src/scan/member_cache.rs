/// Bounded member-resolution cache.
///
/// One scan pass resolves the same authors over and over; the cache keeps
/// those lookups cheap. It is cleared every `surfaces_per_cache_clear`
/// surfaces to bound memory, and discarded with the pass. Access is
/// single-task, so no locking.
use std::collections::HashMap;

use tracing::debug;

use crate::error::ScanError;
use crate::platform::{ChatPlatform, Member, UserId};

#[derive(Default)]
pub struct MemberCache {
    entries: HashMap<UserId, Option<Member>>,
}

impl MemberCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a user to their current membership, consulting the cache
    /// first. `None` means the author does not count: either they left the
    /// guild (cached) or the lookup failed transiently (not cached, so a
    /// later message may retry).
    pub async fn resolve(
        &mut self,
        platform: &dyn ChatPlatform,
        user: UserId,
    ) -> Option<Member> {
        if let Some(cached) = self.entries.get(&user) {
            return cached.clone();
        }
        match platform.member(user).await {
            Ok(member) => {
                self.entries.insert(user, member.clone());
                member
            }
            Err(e) => {
                debug!(user = %user, error = %e, "member lookup failed, skipping message");
                None
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::platform::{ChannelId, ChannelInfo, Message, MessageId, ThreadInfo};
    use crate::report::OutboundMessage;

    /// Counts member lookups; user 1 exists, user 2 left, user 3 errors.
    #[derive(Default)]
    struct CountingPlatform {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl ChatPlatform for CountingPlatform {
        async fn channel_info(&self, id: ChannelId) -> Result<ChannelInfo, ScanError> {
            Err(ScanError::ChannelNotFound(id))
        }

        async fn category_channels(
            &self,
            _category: ChannelId,
        ) -> Result<Vec<ChannelInfo>, ScanError> {
            Ok(vec![])
        }

        async fn message_page(
            &self,
            _channel: ChannelId,
            _before: Option<MessageId>,
            _limit: u8,
        ) -> Result<Vec<Message>, ScanError> {
            Ok(vec![])
        }

        async fn member(&self, user: UserId) -> Result<Option<Member>, ScanError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            match user.0 {
                1 => Ok(Some(Member {
                    id: user,
                    display_name: "ada".into(),
                    roles: BTreeSet::new(),
                })),
                2 => Ok(None),
                _ => Err(ScanError::Platform("lookup failed".into())),
            }
        }

        async fn active_threads(&self, _forum: ChannelId) -> Result<Vec<ThreadInfo>, ScanError> {
            Ok(vec![])
        }

        async fn archived_threads(
            &self,
            _forum: ChannelId,
            _limit: u8,
        ) -> Result<Vec<ThreadInfo>, ScanError> {
            Ok(vec![])
        }

        async fn send_message(
            &self,
            _destination: ChannelId,
            _message: &OutboundMessage,
        ) -> Result<(), ScanError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn caches_hits_and_departures_but_not_errors() {
        let platform = CountingPlatform::default();
        let mut cache = MemberCache::new();

        assert!(cache.resolve(&platform, UserId(1)).await.is_some());
        assert!(cache.resolve(&platform, UserId(1)).await.is_some());
        assert_eq!(platform.lookups.load(Ordering::SeqCst), 1);

        assert!(cache.resolve(&platform, UserId(2)).await.is_none());
        assert!(cache.resolve(&platform, UserId(2)).await.is_none());
        assert_eq!(platform.lookups.load(Ordering::SeqCst), 2);

        // Transient failures are retried on the next message.
        assert!(cache.resolve(&platform, UserId(3)).await.is_none());
        assert!(cache.resolve(&platform, UserId(3)).await.is_none());
        assert_eq!(platform.lookups.load(Ordering::SeqCst), 4);

        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
