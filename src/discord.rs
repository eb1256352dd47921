/// Discord integration using serenity.
///
/// [`DiscordPlatform`] maps the REST API onto the [`ChatPlatform`] boundary;
/// [`Handler`] wires gateway events and the `/stats`, `/statsm` and
/// `/status` slash commands onto the scheduler.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::all::{
    ChannelType, CommandInteraction, Context, CreateCommand, CreateEmbed, CreateEmbedFooter,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage,
    EditInteractionResponse, EventHandler, GetMessages, GuildChannel, GuildId, Interaction, Ready,
    Timestamp,
};
use serenity::http::{Http, HttpError};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ScanError;
use crate::health::HealthState;
use crate::platform::{
    ChannelId, ChannelInfo, ChannelKind, ChatPlatform, EmbedPreview, Member, Message, MessageId,
    RoleId, ThreadInfo, UserId,
};
use crate::report::{OutboundMessage, ReportEmbed};
use crate::scheduler::{Scheduler, TriggerOutcome};
use crate::window::ReportType;

pub struct DiscordPlatform {
    http: Arc<Http>,
    guild: GuildId,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>, guild: GuildId) -> Self {
        Self { http, guild }
    }
}

fn http_status(e: &serenity::Error) -> Option<u16> {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)) = e {
        Some(resp.status_code.as_u16())
    } else {
        None
    }
}

fn surface_error(channel: ChannelId, e: serenity::Error) -> ScanError {
    match http_status(&e) {
        Some(404) => ScanError::ChannelNotFound(channel),
        Some(403) => ScanError::PermissionDenied(channel),
        _ => ScanError::Platform(e.to_string()),
    }
}

fn map_kind(kind: ChannelType) -> ChannelKind {
    match kind {
        ChannelType::Text | ChannelType::News => ChannelKind::Text,
        ChannelType::Forum => ChannelKind::Forum,
        ChannelType::Category => ChannelKind::Category,
        _ => ChannelKind::Other,
    }
}

fn to_utc(ts: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0).unwrap_or_default()
}

fn thread_info(thread: &GuildChannel) -> ThreadInfo {
    let created_at = thread
        .thread_metadata
        .and_then(|md| md.create_timestamp)
        // Snowflake ids encode the creation instant, which serves as a
        // fallback for threads predating the create_timestamp field.
        .unwrap_or_else(|| thread.id.created_at());
    ThreadInfo {
        id: ChannelId(thread.id.get()),
        parent: thread.parent_id.map(|p| ChannelId(p.get())).unwrap_or(ChannelId(0)),
        name: thread.name.clone(),
        created_at: Some(to_utc(created_at)),
    }
}

fn build_embed(embed: &ReportEmbed) -> CreateEmbed {
    let mut builder = CreateEmbed::new().title(embed.title.clone()).colour(embed.color);
    if let Some(ref description) = embed.description {
        builder = builder.description(description.clone());
    }
    for field in &embed.fields {
        builder = builder.field(field.name.clone(), field.value.clone(), field.inline);
    }
    if let Some(ref footer) = embed.footer {
        builder = builder.footer(CreateEmbedFooter::new(footer.clone()));
    }
    let timestamp = Timestamp::from_unix_timestamp(embed.timestamp.timestamp())
        .unwrap_or_else(|_| Timestamp::now());
    builder.timestamp(timestamp)
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn channel_info(&self, id: ChannelId) -> Result<ChannelInfo, ScanError> {
        let channel = self
            .http
            .get_channel(serenity::all::ChannelId::new(id.0))
            .await
            .map_err(|e| surface_error(id, e))?;
        match channel.guild() {
            Some(guild_channel) => Ok(ChannelInfo {
                id,
                name: guild_channel.name.clone(),
                kind: map_kind(guild_channel.kind),
            }),
            None => Ok(ChannelInfo {
                id,
                name: id.to_string(),
                kind: ChannelKind::Other,
            }),
        }
    }

    async fn category_channels(&self, category: ChannelId) -> Result<Vec<ChannelInfo>, ScanError> {
        let channels = self
            .guild
            .channels(&self.http)
            .await
            .map_err(|e| surface_error(category, e))?;

        let mut children: Vec<&GuildChannel> = channels
            .values()
            .filter(|c| c.parent_id.map(|p| p.get()) == Some(category.0))
            .collect();
        children.sort_by_key(|c| c.position);

        Ok(children
            .into_iter()
            .map(|c| ChannelInfo {
                id: ChannelId(c.id.get()),
                name: c.name.clone(),
                kind: map_kind(c.kind),
            })
            .collect())
    }

    async fn message_page(
        &self,
        channel: ChannelId,
        before: Option<MessageId>,
        limit: u8,
    ) -> Result<Vec<Message>, ScanError> {
        let mut builder = GetMessages::new().limit(limit);
        if let Some(cursor) = before {
            builder = builder.before(serenity::all::MessageId::new(cursor.0));
        }

        let page = serenity::all::ChannelId::new(channel.0)
            .messages(&self.http, builder)
            .await
            .map_err(|e| surface_error(channel, e))?;

        Ok(page
            .into_iter()
            .map(|m| Message {
                id: MessageId(m.id.get()),
                author_id: UserId(m.author.id.get()),
                author_is_bot: m.author.bot,
                timestamp: to_utc(m.timestamp),
                attachment_count: m.attachments.len(),
                embeds: m
                    .embeds
                    .iter()
                    .map(|e| EmbedPreview {
                        image: e.image.is_some(),
                        video: e.video.is_some(),
                        thumbnail: e.thumbnail.is_some(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn member(&self, user: UserId) -> Result<Option<Member>, ScanError> {
        match self
            .guild
            .member(&self.http, serenity::all::UserId::new(user.0))
            .await
        {
            Ok(member) => {
                let display_name = member
                    .nick
                    .clone()
                    .or_else(|| member.user.global_name.clone())
                    .unwrap_or_else(|| member.user.name.clone());
                Ok(Some(Member {
                    id: user,
                    display_name,
                    roles: member.roles.iter().map(|r| RoleId(r.get())).collect(),
                }))
            }
            // Unknown member: the author left the guild.
            Err(e) if http_status(&e) == Some(404) => Ok(None),
            Err(e) => Err(ScanError::Platform(e.to_string())),
        }
    }

    async fn active_threads(&self, forum: ChannelId) -> Result<Vec<ThreadInfo>, ScanError> {
        let data = self
            .guild
            .get_active_threads(&self.http)
            .await
            .map_err(|e| surface_error(forum, e))?;
        Ok(data
            .threads
            .iter()
            .filter(|t| t.parent_id.map(|p| p.get()) == Some(forum.0))
            .map(thread_info)
            .collect())
    }

    async fn archived_threads(
        &self,
        forum: ChannelId,
        limit: u8,
    ) -> Result<Vec<ThreadInfo>, ScanError> {
        let data = serenity::all::ChannelId::new(forum.0)
            .get_archived_public_threads(&self.http, None, Some(limit as u64))
            .await
            .map_err(|e| surface_error(forum, e))?;
        Ok(data.threads.iter().map(thread_info).collect())
    }

    async fn send_message(
        &self,
        destination: ChannelId,
        message: &OutboundMessage,
    ) -> Result<(), ScanError> {
        let mut builder = CreateMessage::new();
        if let Some(ref content) = message.content {
            builder = builder.content(content.clone());
        }
        builder = builder.add_embeds(message.embeds.iter().map(build_embed).collect());

        serenity::all::ChannelId::new(destination.0)
            .send_message(&self.http, builder)
            .await
            .map_err(|e| ScanError::Delivery(e.to_string()))?;
        Ok(())
    }
}

/// Gateway event handler: registers slash commands on ready and dispatches
/// them to the scheduler. The scheduler itself is handed over through a
/// cell because it is only constructed once the client (and its HTTP
/// handle) exists.
pub struct Handler {
    config: Arc<Config>,
    scheduler: Arc<OnceCell<Arc<Scheduler>>>,
    health: HealthState,
}

impl Handler {
    pub fn new(
        config: Arc<Config>,
        scheduler: Arc<OnceCell<Arc<Scheduler>>>,
        health: HealthState,
    ) -> Self {
        Self {
            config,
            scheduler,
            health,
        }
    }

    fn member_may_run_commands(&self, interaction: &CommandInteraction) -> bool {
        let Some(required) = self.config.command_role else {
            return true;
        };
        interaction
            .member
            .as_ref()
            .map(|m| m.roles.iter().any(|r| r.get() == required))
            .unwrap_or(false)
    }

    async fn handle_report_command(
        &self,
        ctx: &Context,
        interaction: &CommandInteraction,
        report_type: ReportType,
    ) {
        let Some(scheduler) = self.scheduler.get() else {
            respond(ctx, interaction, "❌ The scheduler is not ready yet, try again shortly.")
                .await;
            return;
        };

        match scheduler.begin(report_type) {
            None => {
                respond(
                    ctx,
                    interaction,
                    &outcome_message(report_type, &TriggerOutcome::AlreadyRunning),
                )
                .await;
            }
            Some(job) => {
                respond(
                    ctx,
                    interaction,
                    &outcome_message(report_type, &TriggerOutcome::Started),
                )
                .await;
                let outcome = job.run().await;
                edit_response(ctx, interaction, &outcome_message(report_type, &outcome)).await;
            }
        }
    }

    async fn handle_status_command(&self, ctx: &Context, interaction: &CommandInteraction) {
        let Some(scheduler) = self.scheduler.get() else {
            respond(ctx, interaction, "❌ The scheduler is not ready yet, try again shortly.")
                .await;
            return;
        };

        let mut embed = CreateEmbed::new()
            .title("🤖 Media Recap Status")
            .colour(0x00AE86u32)
            .field("🟢 Bot", "Operational", true)
            .field(
                "📁 Monitored",
                format!(
                    "{} channels + {} categories",
                    self.config.channels.len(),
                    self.config.categories.len()
                ),
                true,
            )
            .field(
                "👥 Tracked Roles",
                self.config.tracked_roles.len().to_string(),
                true,
            );

        for report_type in [ReportType::Weekly, ReportType::Monthly] {
            let value = match scheduler.next_occurrence(report_type) {
                Some(next) if scheduler.guard(report_type).is_running() => {
                    format!("running now, next <t:{}:F>", next.timestamp())
                }
                Some(next) => format!("<t:{}:F>", next.timestamp()),
                None => "not scheduled".to_string(),
            };
            let name = match report_type {
                ReportType::Weekly => "📊 Next Weekly Report",
                ReportType::Monthly => "📅 Next Monthly Report",
            };
            embed = embed.field(name, value, true);
        }

        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new().embed(embed).ephemeral(true),
        );
        if let Err(e) = interaction.create_response(&ctx.http, response).await {
            warn!(error = %e, "failed to respond to status command");
        }
    }
}

fn outcome_message(report_type: ReportType, outcome: &TriggerOutcome) -> String {
    match outcome {
        TriggerOutcome::AlreadyRunning => {
            format!("⚠️ A {report_type} report is already being generated!")
        }
        TriggerOutcome::Started => {
            format!("🔄 Generating {report_type} report... This may take a few minutes.")
        }
        TriggerOutcome::Completed => {
            format!("✅ {report_type} report generated! Check the reports channel.")
        }
        TriggerOutcome::Failed(reason) => {
            format!("❌ Error generating {report_type} report: {reason}")
        }
    }
}

async fn respond(ctx: &Context, interaction: &CommandInteraction, text: &str) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(text)
            .ephemeral(true),
    );
    if let Err(e) = interaction.create_response(&ctx.http, response).await {
        warn!(error = %e, "failed to respond to command");
    }
}

async fn edit_response(ctx: &Context, interaction: &CommandInteraction, text: &str) {
    if let Err(e) = interaction
        .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
        .await
    {
        warn!(error = %e, "failed to edit command response");
    }
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(bot = %ready.user.name, "connected to Discord");
        self.health.set_connected(true);

        let commands = vec![
            CreateCommand::new("stats").description("Generate the weekly media report now"),
            CreateCommand::new("statsm").description("Generate the monthly media report now"),
            CreateCommand::new("status").description("Show bot status and next report times"),
        ];
        if let Err(e) = GuildId::new(self.config.guild_id)
            .set_commands(&ctx.http, commands)
            .await
        {
            error!(error = %e, "failed to register slash commands");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        if !self.member_may_run_commands(&command) {
            respond(&ctx, &command, "❌ You do not have permission to use this command!").await;
            return;
        }

        match command.data.name.as_str() {
            "stats" => self.handle_report_command(&ctx, &command, ReportType::Weekly).await,
            "statsm" => {
                self.handle_report_command(&ctx, &command, ReportType::Monthly)
                    .await
            }
            "status" => self.handle_status_command(&ctx, &command).await,
            other => {
                warn!(command = other, "unknown command");
            }
        }
    }
}
