use serde::{Deserialize, Serialize};

/// Identity of whoever issued a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A management command as delivered by a chat adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundCommand {
    pub destination_id: String,
    #[serde(default)]
    pub destination_label: String,
    pub principal: Principal,
    /// Lowercase command name without the leading `/`.
    pub command_name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Name and arguments split out of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Parse `/name[@bot] arg1 arg2` out of message text.
///
/// Returns `None` for plain text and for commands explicitly addressed to a
/// different bot (`/subscribe@other_bot`).
pub fn parse_command_text(text: &str, bot_username: Option<&str>) -> Option<ParsedCommand> {
    let body = text.trim().strip_prefix('/')?;
    let mut words = body.split_whitespace();
    let head = words.next()?;

    let name = match head.split_once('@') {
        Some((name, addressee)) => {
            let ours = bot_username.is_some_and(|u| u.eq_ignore_ascii_case(addressee));
            if !ours {
                return None;
            }
            name
        },
        None => head,
    };
    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name: name.to_ascii_lowercase(),
        args: words.map(str::to_string).collect(),
    })
}
