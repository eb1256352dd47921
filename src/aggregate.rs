/// Statistic merging.
///
/// Folds per-surface statistic maps into a global one. The merge is
/// associative and commutative in the per-user totals, so surfaces can be
/// partitioned and combined in any order.
use crate::scan::types::{StatMap, UserStatistic};

/// Merge `source` into `target`: users absent from `target` are created
/// (copying display name and role snapshot), then every location count is
/// union-added. Preserves `total == sum(channel_counts)` for every user.
pub fn merge(target: &mut StatMap, source: StatMap) {
    for (user_id, incoming) in source {
        match target.get_mut(&user_id) {
            Some(existing) => {
                existing.total += incoming.total;
                for (location, count) in incoming.channel_counts {
                    *existing.channel_counts.entry(location).or_insert(0) += count;
                }
            }
            None => {
                target.insert(user_id, incoming);
            }
        }
    }
}
