/// Report assembly.
///
/// Turns a [`ScanResult`] into platform-neutral outbound messages: one main
/// report plus one detail message per contributor. The Discord layer maps
/// these onto real embeds; tests inspect them directly.
use chrono::{DateTime, Utc};

use crate::scan::types::{LocationKey, ScanResult, UserStatistic};
use crate::window::ReportType;

const WEEKLY_COLOR: u32 = 0x00AE86;
const MONTHLY_COLOR: u32 = 0x9B59B6;

/// Contributors shown in the main report's ranking.
const TOP_USER_LIMIT: usize = 15;
/// Channels shown in the main report's breakdown.
const TOP_CHANNEL_LIMIT: usize = 8;

#[derive(Debug, Clone)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone)]
pub struct ReportEmbed {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A message ready for delivery: plain content plus rich embeds.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub content: Option<String>,
    pub embeds: Vec<ReportEmbed>,
}

fn color_for(report_type: ReportType) -> u32 {
    match report_type {
        ReportType::Weekly => WEEKLY_COLOR,
        ReportType::Monthly => MONTHLY_COLOR,
    }
}

fn title_for(report_type: ReportType) -> &'static str {
    match report_type {
        ReportType::Weekly => "📊 WEEKLY MEDIA REPORT",
        ReportType::Monthly => "📅 MONTHLY MEDIA REPORT",
    }
}

fn user_mention(user: &UserStatistic) -> String {
    format!("<@{}>", user.user_id)
}

fn channel_mention(location: &LocationKey) -> String {
    format!("<#{}>", location.surface_id())
}

/// Short notice for a scan that found nothing; still delivered so the
/// destination knows the scan ran.
pub fn empty_notice(report_type: ReportType) -> OutboundMessage {
    OutboundMessage {
        content: Some(format!(
            "{}\n\nNo media found from tracked roles this {}. 📭",
            title_for(report_type),
            report_type
        )),
        embeds: vec![],
    }
}

/// Assemble the full report: the main summary message followed by one
/// detail message per contributor. Empty results yield the notice only.
pub fn assemble(result: &ScanResult, next_report: Option<DateTime<Utc>>) -> Vec<OutboundMessage> {
    if result.users.is_empty() {
        return vec![empty_notice(result.report_type)];
    }

    let mut messages = vec![main_report(result, next_report)];
    for user in result.top_users(usize::MAX) {
        messages.push(user_report(result.report_type, user));
    }
    messages
}

fn main_report(result: &ScanResult, next_report: Option<DateTime<Utc>>) -> OutboundMessage {
    let total = result.total_media();
    let top_users = result.top_users(TOP_USER_LIMIT);

    let mentions: Vec<String> = result.users.values().map(user_mention).collect();
    let content = format!(
        "{}\n\n**All Contributors:** {}\n\n**Total Media:** {} items from {} users",
        title_for(result.report_type),
        mentions.join(" "),
        total,
        result.users.len()
    );

    let ranking = top_users
        .iter()
        .enumerate()
        .map(|(index, user)| {
            let medal = match index {
                0 => "🥇".to_string(),
                1 => "🥈".to_string(),
                2 => "🥉".to_string(),
                n => format!("{}.", n + 1),
            };
            format!("{} {} - **{}** media items", medal, user_mention(user), user.total)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let mut breakdown: Vec<(String, u64)> = result
        .channel_breakdown()
        .into_iter()
        .map(|(channel, count)| (format!("<#{}>", channel), count))
        .collect();
    breakdown.sort_by(|a, b| b.1.cmp(&a.1));
    breakdown.truncate(TOP_CHANNEL_LIMIT);
    let channel_lines = breakdown
        .iter()
        .map(|(mention, count)| format!("• {} - **{}** items", mention, count))
        .collect::<Vec<_>>()
        .join("\n");

    let mut fields = vec![
        EmbedField {
            name: "🏆 TOP CONTRIBUTORS".into(),
            value: ranking,
            inline: false,
        },
        EmbedField {
            name: "📁 TOP CHANNELS".into(),
            value: channel_lines,
            inline: false,
        },
        EmbedField {
            name: "📈 MEDIA SUMMARY".into(),
            value: format!(
                "**Total Media:** {}\n**Contributors:** {}\n**Window start:** <t:{}:F>",
                total,
                result.users.len(),
                result.since.timestamp()
            ),
            inline: true,
        },
    ];

    if let Some(next) = next_report {
        fields.push(EmbedField {
            name: "⏰ NEXT REPORT".into(),
            value: format!("<t:{}:F>", next.timestamp()),
            inline: true,
        });
    }

    OutboundMessage {
        content: Some(content),
        embeds: vec![ReportEmbed {
            title: title_for(result.report_type).to_string(),
            description: None,
            color: color_for(result.report_type),
            fields,
            footer: Some(format!("{} media report", result.report_type)),
            timestamp: Utc::now(),
        }],
    }
}

fn user_report(report_type: ReportType, user: &UserStatistic) -> OutboundMessage {
    // Group forum threads under their forum for readability; the keys
    // themselves stay exact, one line per location.
    let mut lines = Vec::new();
    for (location, count) in &user.channel_counts {
        let line = match location {
            LocationKey::Channel(_) => {
                format!("• {} - **{}**", channel_mention(location), count)
            }
            LocationKey::ForumThread { forum, .. } => {
                format!("• <#{}> → {} - **{}**", forum, channel_mention(location), count)
            }
        };
        lines.push(line);
    }

    OutboundMessage {
        content: Some(format!("**User Report:** {}", user_mention(user))),
        embeds: vec![ReportEmbed {
            title: format!("Media by {}", user.display_name),
            description: Some(format!("**Total:** {} media items", user.total)),
            color: color_for(report_type),
            fields: vec![EmbedField {
                name: "Per channel".into(),
                value: lines.join("\n"),
                inline: false,
            }],
            footer: None,
            timestamp: Utc::now(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{ChannelId, UserId};
    use crate::scan::types::UserStatistic;
    use chrono::TimeZone;

    fn sample_result() -> ScanResult {
        let since = Utc.with_ymd_and_hms(2025, 6, 8, 0, 0, 0).unwrap();
        let mut result = ScanResult::new(ReportType::Weekly, since);
        for (id, count) in [(1u64, 5u64), (2, 3), (3, 8)] {
            let mut stat = UserStatistic::new(UserId(id), format!("user-{id}"), vec![]);
            stat.record(LocationKey::Channel(ChannelId(10)), count);
            result.users.insert(UserId(id), stat);
        }
        result
    }

    #[test]
    fn empty_result_yields_only_the_notice() {
        let result = ScanResult::new(ReportType::Monthly, Utc::now());
        let messages = assemble(&result, None);
        assert_eq!(messages.len(), 1);
        let content = messages[0].content.as_deref().unwrap();
        assert!(content.contains("No media found"));
        assert!(content.contains("MONTHLY"));
    }

    #[test]
    fn main_report_ranks_by_descending_total() {
        let messages = assemble(&sample_result(), None);
        // main + one per contributor
        assert_eq!(messages.len(), 4);

        let ranking = &messages[0].embeds[0].fields[0].value;
        let gold = ranking.lines().next().unwrap();
        assert!(gold.starts_with("🥇"));
        assert!(gold.contains("<@3>"), "highest total should rank first: {gold}");
    }

    #[test]
    fn user_reports_mention_each_contributor() {
        let messages = assemble(&sample_result(), None);
        let mentions: Vec<&str> = messages[1..]
            .iter()
            .filter_map(|m| m.content.as_deref())
            .collect();
        assert_eq!(mentions.len(), 3);
        assert!(mentions.iter().any(|m| m.contains("<@1>")));
    }

    #[test]
    fn forum_contributions_render_thread_and_forum() {
        let mut result = ScanResult::new(ReportType::Weekly, Utc::now());
        let mut stat = UserStatistic::new(UserId(1), "ada".into(), vec![]);
        stat.record(
            LocationKey::ForumThread {
                forum: ChannelId(7),
                thread: ChannelId(42),
            },
            2,
        );
        result.users.insert(UserId(1), stat);

        let messages = assemble(&result, None);
        let detail = &messages[1].embeds[0].fields[0].value;
        assert!(detail.contains("<#7>"));
        assert!(detail.contains("<#42>"));
    }
}
