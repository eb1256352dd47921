/// Channel set resolution.
///
/// Expands the configured categories into their text children, unions them
/// with the explicitly configured channels, and deduplicates while keeping
/// configuration order. The result is computed once and cached for the
/// process lifetime; a restart is the only invalidation path.
use std::collections::HashSet;

use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::platform::{ChannelId, ChannelInfo, ChannelKind, ChatPlatform};

#[derive(Default)]
pub struct ChannelSetResolver {
    cache: OnceCell<Vec<ChannelInfo>>,
}

impl ChannelSetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the full, deduplicated list of scannable channels.
    ///
    /// Unresolvable channels and categories are skipped with a log line,
    /// never an error. Only text-capable channels and forum containers
    /// survive; categories and anything else are filtered out.
    pub async fn resolve(
        &self,
        platform: &dyn ChatPlatform,
        explicit: &[ChannelId],
        categories: &[ChannelId],
    ) -> &[ChannelInfo] {
        self.cache
            .get_or_init(|| async {
                let channels = resolve_uncached(platform, explicit, categories).await;
                info!(
                    total = channels.len(),
                    explicit = explicit.len(),
                    categories = categories.len(),
                    "channel set resolved"
                );
                channels
            })
            .await
    }
}

async fn resolve_uncached(
    platform: &dyn ChatPlatform,
    explicit: &[ChannelId],
    categories: &[ChannelId],
) -> Vec<ChannelInfo> {
    let mut seen: HashSet<ChannelId> = HashSet::new();
    let mut channels: Vec<ChannelInfo> = Vec::new();

    for &id in explicit {
        let info = match platform.channel_info(id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(channel = %id, error = %e, "configured channel unresolvable, skipping");
                continue;
            }
        };
        match info.kind {
            ChannelKind::Text | ChannelKind::Forum => {
                if seen.insert(info.id) {
                    channels.push(info);
                }
            }
            _ => {
                warn!(channel = %id, "configured channel does not host messages, skipping");
            }
        }
    }

    for &category in categories {
        let children = match platform.category_channels(category).await {
            Ok(children) => children,
            Err(e) => {
                warn!(category = %category, error = %e, "category unresolvable, skipping");
                continue;
            }
        };
        for child in children {
            // Category expansion only picks up plain text channels; forums
            // must be listed explicitly.
            if child.kind == ChannelKind::Text && seen.insert(child.id) {
                channels.push(child);
            }
        }
    }

    channels
}
