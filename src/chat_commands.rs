use crate::runtime::AppState;
use chatlog_channels::channel_adapter::OutboundReply;

pub const START_TEXT: &str = "✅ Hello! I am the chat logger bot.\n\n\
⚠️ I log every message in this chat.\n\
📌 Commands:\n\
/get_history <number> - show the last N messages (owners only)\n\
/myid - show your Telegram ID\n\n\
❗ Only authorized users can read the history.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    MyId,
    GetHistory { argument: Option<String> },
}

/// Recognize one of the bot's commands. `/cmd@name` only counts when `name`
/// is this bot; anything unrecognized is an ordinary message.
pub fn parse_command(text: &str, bot_username: &str) -> Option<ChatCommand> {
    let mut parts = text.trim_start().split_whitespace();
    let head = parts.next()?.strip_prefix('/')?;
    let name = match head.split_once('@') {
        Some((name, target)) => {
            if !target.eq_ignore_ascii_case(bot_username) {
                return None;
            }
            name
        }
        None => head,
    };

    match name.to_ascii_lowercase().as_str() {
        "start" => Some(ChatCommand::Start),
        "myid" => Some(ChatCommand::MyId),
        "get_history" => Some(ChatCommand::GetHistory {
            argument: parts.next().map(str::to_string),
        }),
        _ => None,
    }
}

pub fn myid_response(user_id: i64) -> String {
    format!("Your Telegram ID: {user_id}")
}

pub async fn handle_chat_command(
    state: &AppState,
    command: &ChatCommand,
    requester_id: Option<i64>,
    chat_id: i64,
) -> OutboundReply {
    match command {
        ChatCommand::Start => OutboundReply::text(START_TEXT),
        ChatCommand::MyId => match requester_id {
            Some(id) => OutboundReply::text(myid_response(id)),
            None => OutboundReply::text("Could not determine your Telegram ID."),
        },
        ChatCommand::GetHistory { argument } => {
            // Anonymous senders (channel posts, anonymous admins) are never owners.
            let requester_id = requester_id.unwrap_or(i64::MIN);
            state
                .history
                .respond(requester_id, chat_id, argument.as_deref())
                .await
        }
    }
}
