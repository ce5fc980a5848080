//! Discord event handler for serenity.

use std::sync::Arc;

use serenity::{
    all::{Context, EventHandler, GatewayIntents, Message, Ready},
    async_trait,
};
use tracing::{debug, info, warn};

use super::command::parse_command;
use super::handler::CommandHandler;

/// Discord rejects messages longer than this many characters.
const MAX_REPLY_CHARS: usize = 2000;

/// Handler for Discord gateway events.
pub struct DiscordHandler {
    commands: Arc<CommandHandler>,
}

impl DiscordHandler {
    /// Create a new handler dispatching to `commands`.
    pub fn new(commands: Arc<CommandHandler>) -> Self {
        Self { commands }
    }

    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages to prevent loops
        if msg.author.bot {
            return;
        }

        let Some(command) = parse_command(self.commands.prefix(), &msg.content) else {
            return;
        };

        info!(
            user = %msg.author.name,
            channel_id = %msg.channel_id,
            command = ?command,
            "command received"
        );

        let reply = self.commands.handle(command).await;
        for chunk in split_message(&reply, MAX_REPLY_CHARS) {
            if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
                warn!(channel_id = %msg.channel_id, error = %e, "failed to send command reply");
                break;
            }
        }
        debug!(channel_id = %msg.channel_id, "command reply sent");
    }
}

/// Split `text` into chunks of at most `max` characters, preferring line
/// boundaries.
pub(crate) fn split_message(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();

        if current_len > 0 && current_len + 1 + line_len > max {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > max {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if current_len > 0 || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}
