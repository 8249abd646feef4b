use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use serenity::Client;
use serenity::all::{
    Command, CommandInteraction, CommandOptionType, Context, CreateCommand, CreateCommandOption,
    CreateInteractionResponse, CreateInteractionResponseMessage, EventHandler, GatewayIntents,
    Interaction, Reaction, ReactionType, Ready,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::lifecycle::LifecycleComponent;
use crate::discord::messages;
use crate::discord::reminders::{RegisterOutcome, ReminderService};
use crate::storage::Database;

const DEFAULT_UPCOMING_WINDOW_MINUTES: i64 = 15;

struct Handler {
    db: Database,
    reminders: Arc<ReminderService>,
    display_tz: Tz,
    recheck_minutes: i64,
}

impl Handler {
    async fn command_reply(&self, command: &CommandInteraction) -> Result<String> {
        match command.data.name.as_str() {
            "live" => {
                let videos = self.db.get_live_videos().await?;
                Ok(messages::live_reply(&videos))
            }
            "upcoming" => {
                let minutes = command
                    .data
                    .options
                    .iter()
                    .find(|o| o.name == "minutes")
                    .and_then(|o| o.value.as_i64())
                    .unwrap_or(DEFAULT_UPCOMING_WINDOW_MINUTES);
                let videos = self.db.get_upcoming_videos(Utc::now(), minutes).await?;
                Ok(messages::upcoming_reply(minutes, &videos, self.display_tz))
            }
            "reminderlist" => {
                let user_id = command.user.id.get().to_string();
                let reminders = self.db.get_reminders_for_user(&user_id).await?;
                Ok(messages::reminder_list_reply(&reminders, self.display_tz))
            }
            other => Ok(format!("未対応のコマンドです: /{}", other)),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        let commands = vec![
            CreateCommand::new("live").description("現在配信中のライブ一覧を表示します"),
            CreateCommand::new("upcoming")
                .description("まもなく始まる配信予定を表示します")
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Integer,
                        "minutes",
                        "何分先までの配信予定を表示するか",
                    )
                    .required(false),
                ),
            CreateCommand::new("reminderlist").description("設定済みのリマインダーを表示します"),
        ];
        if let Err(e) = Command::set_global_commands(&ctx.http, commands).await {
            error!("Failed to register slash commands: {}", e);
        }

        // Timers armed before the last shutdown no longer exist, so
        // pick the imminent ones back up.
        if let Err(e) = self.reminders.rearm_pending(self.recheck_minutes).await {
            error!("Reminder re-arm on connect failed: {}", e);
        }
    }

    async fn reaction_add(&self, ctx: Context, reaction: Reaction) {
        let is_remind = matches!(
            &reaction.emoji,
            ReactionType::Custom { name: Some(name), .. } if name == "remind"
        );
        if !is_remind {
            return;
        }

        let user = match reaction.user(&ctx.http).await {
            Ok(user) => user,
            Err(e) => {
                error!("Failed to fetch reacting user: {}", e);
                return;
            }
        };
        if user.bot {
            return;
        }

        let message = match reaction.message(&ctx.http).await {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to fetch reacted message: {}", e);
                return;
            }
        };

        let Some(request) =
            messages::parse_reminder_request(&message.content, self.display_tz, Utc::now())
        else {
            warn!("Remind reaction on a message with no parseable schedule; ignoring");
            return;
        };

        let user_id = user.id.get().to_string();
        match self
            .reminders
            .register_reminder(
                &user_id,
                &request.video_id,
                &message.content,
                request.target_start,
            )
            .await
        {
            Ok(RegisterOutcome::Registered(id)) => {
                info!("Reminder {} registered via reaction by {}", id, user.name);
            }
            Ok(RegisterOutcome::AlreadyExists) => {
                info!(
                    "User {} already holds a reminder for {}",
                    user.name, request.video_id
                );
            }
            Ok(RegisterOutcome::TooSoon) => {
                info!(
                    "Reminder for {} dropped; stream starts too soon",
                    request.video_id
                );
            }
            Err(e) => error!("Reminder registration failed: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let content = match self.command_reply(&command).await {
            Ok(content) => content,
            Err(e) => {
                error!("Slash command /{} failed: {}", command.data.name, e);
                messages::INTERACTION_ERROR_REPLY.to_string()
            }
        };

        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(content)
                .ephemeral(true),
        );
        if let Err(e) = command.create_response(&ctx.http, response).await {
            error!("Failed to respond to /{}: {}", command.data.name, e);
        }
    }
}

/// Gateway connection as a lifecycle component. Without a bot token the
/// rest of the system still runs; only reactions, slash commands, and
/// DM delivery are lost.
pub struct DiscordBot {
    token: String,
    db: Database,
    reminders: Arc<ReminderService>,
    display_tz: Tz,
    recheck_minutes: i64,
}

impl DiscordBot {
    pub fn new(
        token: String,
        db: Database,
        reminders: Arc<ReminderService>,
        display_tz: Tz,
        recheck_minutes: i64,
    ) -> Self {
        Self {
            token,
            db,
            reminders,
            display_tz,
            recheck_minutes,
        }
    }
}

#[async_trait]
impl LifecycleComponent for DiscordBot {
    async fn on_init(&mut self) -> Result<()> {
        info!("Discord gateway initializing...");
        Ok(())
    }

    async fn on_start(&mut self) -> Result<()> {
        if self.token.is_empty() {
            warn!("No DISCORD_BOT_TOKEN set. Reminders and slash commands disabled.");
            return Ok(());
        }

        let handler = Handler {
            db: self.db.clone(),
            reminders: self.reminders.clone(),
            display_tz: self.display_tz,
            recheck_minutes: self.recheck_minutes,
        };

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS;

        match Client::builder(&self.token, intents)
            .event_handler(handler)
            .await
        {
            Ok(mut client) => {
                tokio::spawn(async move {
                    if let Err(why) = client.start().await {
                        error!("Discord client error: {:?}", why);
                    }
                });
            }
            Err(e) => {
                error!("Failed to create Discord client: {}. Gateway disabled.", e);
            }
        }
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<()> {
        info!("Discord gateway shutting down...");
        Ok(())
    }
}
