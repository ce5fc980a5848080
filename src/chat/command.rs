//! Operator command parser.
//!
//! Commands are prefixed messages such as `!monitor add youtube UC...`.

/// Add or remove a monitored channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// Start monitoring.
    Add,
    /// Stop monitoring.
    Remove,
}

impl MonitorAction {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "add" => Some(MonitorAction::Add),
            "remove" | "rm" | "del" => Some(MonitorAction::Remove),
            _ => None,
        }
    }
}

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// Add or remove a monitored channel.
    Monitor {
        /// What to do.
        action: MonitorAction,
        /// Platform kind as typed by the operator.
        platform: String,
        /// Upstream channel id.
        channel_id: String,
    },
    /// Connectivity check.
    Ping,
    /// List monitored channels and re-issue subscriptions.
    Status,
    /// Run a synthetic payload through the relay.
    TestWebhook,
    /// Show command help.
    Help,
    /// Known command with wrong arguments; carries the usage line.
    Usage(&'static str),
    /// Unknown command.
    Unknown(String),
}

/// Command information for help display.
pub struct CommandInfo {
    /// Command name.
    pub name: &'static str,
    /// Command syntax without prefix.
    pub syntax: &'static str,
    /// Command description.
    pub description: &'static str,
}

const MONITOR_USAGE: &str = "monitor <add|remove> youtube <channel_id>";

/// Get all available command information.
pub fn get_command_help() -> Vec<CommandInfo> {
    vec![
        CommandInfo {
            name: "monitor",
            syntax: MONITOR_USAGE,
            description: "Add or remove a monitored channel",
        },
        CommandInfo {
            name: "ping",
            syntax: "ping",
            description: "Check that the bot is alive",
        },
        CommandInfo {
            name: "status",
            syntax: "status",
            description: "List monitored channels and renew their subscriptions",
        },
        CommandInfo {
            name: "testwebhook",
            syntax: "testwebhook",
            description: "Send a synthetic notification through the relay",
        },
        CommandInfo {
            name: "help",
            syntax: "help",
            description: "Show this help",
        },
    ]
}

/// Format the help message for display.
pub fn format_help(prefix: &str) -> String {
    let mut lines = vec!["Commands:".to_string()];
    for info in get_command_help() {
        lines.push(format!("`{prefix}{}` - {}", info.syntax, info.description));
    }
    lines.join("\n")
}

/// Parse a chat message into a command.
///
/// Returns `None` when the message does not start with `prefix`.
pub fn parse_command(prefix: &str, input: &str) -> Option<BotCommand> {
    let trimmed = input.trim();
    let rest = trimmed.strip_prefix(prefix)?;

    let mut parts = rest.split_whitespace();
    let name = parts.next()?.to_lowercase();
    let args: Vec<&str> = parts.collect();

    let command = match name.as_str() {
        "monitor" => match args.as_slice() {
            [action, platform, channel_id] => match MonitorAction::parse(action) {
                Some(action) => BotCommand::Monitor {
                    action,
                    platform: platform.to_string(),
                    channel_id: channel_id.to_string(),
                },
                None => BotCommand::Usage(MONITOR_USAGE),
            },
            _ => BotCommand::Usage(MONITOR_USAGE),
        },
        "ping" => BotCommand::Ping,
        "status" | "list" => BotCommand::Status,
        "testwebhook" => BotCommand::TestWebhook,
        "help" => BotCommand::Help,
        _ => BotCommand::Unknown(name),
    };

    Some(command)
}
