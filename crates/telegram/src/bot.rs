use std::{sync::Arc, time::Duration};

use {
    herald_commands::{
        CommandOutcome, CommandProcessor, InboundCommand, Principal, parse_command_text,
    },
    secrecy::{ExposeSecret, Secret},
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand, Chat, UpdateKind},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use herald_metrics::{counter, telegram as telegram_metrics};

use crate::{
    Error, Result,
    sender::{TelegramSender, parse_recipient},
};

/// Reply sent when a command could not be applied because of a storage error.
pub const STORAGE_FAILURE_REPLY: &str = "Something went wrong, please try again later.";

/// What the polling loop does with inbound messages.
#[derive(Clone)]
pub enum PollMode {
    /// Route slash commands to the processor and reply.
    Commands(Arc<CommandProcessor>),
    /// Log `Chat ID | Chat Title` for every message and never reply.
    ChatIds,
}

/// A connected bot: verified credentials, webhook cleared.
#[derive(Clone)]
pub struct TelegramBot {
    bot: Bot,
    username: Option<String>,
}

impl TelegramBot {
    pub async fn connect(token: &Secret<String>) -> Result<Self> {
        // Client timeout must outlive the 30s long-poll.
        let client = teloxide::net::default_reqwest_settings()
            .timeout(Duration::from_secs(45))
            .build()
            .map_err(|e| Error::message(format!("failed to build telegram client: {e}")))?;
        let bot = Bot::with_client(token.expose_secret(), client);

        let me = bot.get_me().await?;
        bot.delete_webhook().send().await?;
        let username = me.username.clone();
        info!(username = ?username, "telegram bot connected (webhook cleared)");

        Ok(Self { bot, username })
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn sender(&self) -> TelegramSender {
        TelegramSender::new(self.bot.clone())
    }

    /// Register slash commands for autocomplete in Telegram clients.
    pub async fn register_commands(&self) {
        let commands = vec![
            BotCommand::new("subscribe", "Subscribe this chat: <frequency> <source>"),
            BotCommand::new("unsubscribe", "Remove this chat's subscriptions"),
            BotCommand::new("status", "Show this chat's subscriptions"),
            BotCommand::new("help", "Show available commands"),
        ];
        if let Err(e) = self.bot.set_my_commands(commands).await {
            warn!("failed to register bot commands: {e}");
        }
    }

    /// Long-poll until `cancel` fires or another instance takes over the token.
    pub async fn poll(&self, mode: PollMode, cancel: CancellationToken) -> Result<()> {
        info!("starting telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let result = tokio::select! {
                () = cancel.cancelled() => {
                    info!("telegram polling stopped");
                    return Ok(());
                },
                result = self
                    .bot
                    .get_updates()
                    .offset(offset)
                    .timeout(30)
                    .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::ChannelPost])
                    .send() => result,
            };

            match result {
                Ok(updates) => {
                    debug!(count = updates.len(), "got telegram updates");
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::Message(msg) | UpdateKind::ChannelPost(msg) => {
                                #[cfg(feature = "metrics")]
                                counter!(telegram_metrics::MESSAGES_RECEIVED_TOTAL).increment(1);
                                self.handle_message(&mode, &msg).await;
                            },
                            other => {
                                debug!("ignoring non-message update: {other:?}");
                            },
                        }
                    }
                },
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    warn!("telegram polling disabled: another instance is already running with this token");
                    return Err(Error::message(
                        "another bot instance is already polling with this token",
                    ));
                },
                Err(e) => {
                    warn!(error = %e, "telegram getUpdates failed");
                    tokio::select! {
                        () = cancel.cancelled() => return Ok(()),
                        () = tokio::time::sleep(Duration::from_secs(5)) => {},
                    }
                },
            }
        }
    }

    async fn handle_message(&self, mode: &PollMode, msg: &Message) {
        match mode {
            PollMode::ChatIds => {
                info!(
                    "Chat ID: {} | Chat Title: {}",
                    msg.chat.id.0,
                    msg.chat.title().unwrap_or("None")
                );
            },
            PollMode::Commands(processor) => {
                let Some(command) = inbound_command(msg, self.username()) else {
                    return;
                };
                if let Err(e) = self.dispatch(processor, &command).await {
                    error!(
                        chat_id = %command.destination_id,
                        command = %command.command_name,
                        error = %e,
                        "error handling telegram command"
                    );
                }
            },
        }
    }

    async fn dispatch(&self, processor: &CommandProcessor, command: &InboundCommand) -> Result<()> {
        let reply = match processor.handle(command).await {
            Ok(CommandOutcome::Reply(text)) => text,
            Ok(CommandOutcome::Denied(_) | CommandOutcome::Ignored) => return Ok(()),
            Err(e) => {
                if let Err(reply_err) = self.reply(&command.destination_id, STORAGE_FAILURE_REPLY).await {
                    warn!(error = %reply_err, "failed to send failure reply");
                }
                return Err(e.into());
            },
        };
        self.reply(&command.destination_id, &reply).await
    }

    async fn reply(&self, destination_id: &str, text: &str) -> Result<()> {
        let recipient = parse_recipient(destination_id)
            .map_err(|e| Error::message(e.to_string()))?;
        self.bot.send_message(recipient, text).await?;
        Ok(())
    }
}

/// Extract a command addressed to us from an inbound message.
///
/// Channel posts have no `from`; the channel itself is the principal there.
pub(crate) fn inbound_command(msg: &Message, bot_username: Option<&str>) -> Option<InboundCommand> {
    let parsed = parse_command_text(msg.text()?, bot_username)?;
    let principal = match &msg.from {
        Some(user) => Principal {
            id: user.id.0.to_string(),
            username: user.username.clone(),
        },
        None => Principal {
            id: msg.chat.id.0.to_string(),
            username: msg.chat.username().map(str::to_string),
        },
    };
    Some(InboundCommand {
        destination_id: msg.chat.id.0.to_string(),
        destination_label: chat_label(&msg.chat),
        principal,
        command_name: parsed.name,
        args: parsed.args,
    })
}

fn chat_label(chat: &Chat) -> String {
    chat.title()
        .or_else(|| chat.username())
        .or_else(|| chat.first_name())
        .unwrap_or_default()
        .to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn group_message(text: &str) -> Message {
        serde_json::from_value(json!({
            "message_id": 7,
            "date": 1,
            "chat": { "id": -100123, "type": "supergroup", "title": "Deals Hub" },
            "from": {
                "id": 1001,
                "is_bot": false,
                "first_name": "Alice",
                "username": "alice"
            },
            "text": text
        }))
        .expect("deserialize group message")
    }

    #[test]
    fn extracts_command_from_group_message() {
        let msg = group_message("/subscribe@herald_bot daily 7");
        let cmd = inbound_command(&msg, Some("herald_bot")).unwrap();
        assert_eq!(cmd.destination_id, "-100123");
        assert_eq!(cmd.destination_label, "Deals Hub");
        assert_eq!(cmd.principal, Principal {
            id: "1001".into(),
            username: Some("alice".into())
        });
        assert_eq!(cmd.command_name, "subscribe");
        assert_eq!(cmd.args, vec!["daily", "7"]);
    }

    #[test]
    fn ignores_plain_text_and_other_bots() {
        assert!(inbound_command(&group_message("hello there"), Some("herald_bot")).is_none());
        assert!(inbound_command(&group_message("/status@other_bot"), Some("herald_bot")).is_none());
    }

    #[test]
    fn private_chat_label_falls_back_to_first_name() {
        let msg: Message = serde_json::from_value(json!({
            "message_id": 1,
            "date": 1,
            "chat": { "id": 42, "type": "private", "first_name": "Alice" },
            "from": { "id": 42, "is_bot": false, "first_name": "Alice" },
            "text": "/status"
        }))
        .unwrap();
        let cmd = inbound_command(&msg, None).unwrap();
        assert_eq!(cmd.destination_label, "Alice");
        assert_eq!(cmd.principal.username, None);
    }

    #[test]
    fn channel_post_uses_channel_as_principal() {
        let msg: Message = serde_json::from_value(json!({
            "message_id": 3,
            "date": 1,
            "chat": {
                "id": -100555,
                "type": "channel",
                "title": "Daily Drops",
                "username": "dailydrops"
            },
            "text": "/status"
        }))
        .unwrap();
        let cmd = inbound_command(&msg, None).unwrap();
        assert_eq!(cmd.principal.id, "-100555");
        assert_eq!(cmd.principal.username.as_deref(), Some("dailydrops"));
        assert_eq!(cmd.destination_label, "Daily Drops");
    }
}
