use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// One queued broadcast.
///
/// Serialized with the queue file's `chat_id` / `message` keys; the
/// `destination_id` / `body` spellings are accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessage {
    #[serde(rename = "chat_id", alias = "destination_id")]
    pub destination_id: String,
    #[serde(rename = "message", alias = "body")]
    pub body: String,
}

impl PendingMessage {
    pub fn new(destination_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            destination_id: destination_id.into(),
            body: body.into(),
        }
    }

    /// Lenient conversion from a queue entry written by hand or by another
    /// tool. Chat ids may be JSON numbers. Returns `None` when the id or the
    /// body is missing or empty.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let field = |names: [&str; 2]| names.iter().find_map(|n| entry.get(*n));
        let destination_id = match field(["chat_id", "destination_id"])? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let body = field(["message", "body"])?.as_str()?.to_string();
        if destination_id.is_empty() || body.trim().is_empty() {
            return None;
        }
        Some(Self {
            destination_id,
            body,
        })
    }

    /// First 50 characters of the body, for logs.
    pub fn preview(&self) -> String {
        let mut preview: String = self.body.chars().take(50).collect();
        if preview.len() < self.body.len() {
            preview.push_str("...");
        }
        preview
    }
}

#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn numeric_chat_id_is_accepted() {
        let entry = json!({"chat_id": -1001234567890_i64, "message": "hi"});
        assert_eq!(
            PendingMessage::from_entry(&entry),
            Some(PendingMessage::new("-1001234567890", "hi"))
        );
    }

    #[test]
    fn alternate_keys_are_accepted() {
        let entry = json!({"destination_id": "g1", "body": "hello"});
        assert_eq!(
            PendingMessage::from_entry(&entry),
            Some(PendingMessage::new("g1", "hello"))
        );
    }

    #[test]
    fn incomplete_entries_are_rejected() {
        assert_eq!(PendingMessage::from_entry(&json!({"chat_id": "g1"})), None);
        assert_eq!(
            PendingMessage::from_entry(&json!({"chat_id": "", "message": "x"})),
            None
        );
        assert_eq!(
            PendingMessage::from_entry(&json!({"chat_id": "g1", "message": "  "})),
            None
        );
        assert_eq!(PendingMessage::from_entry(&json!("g1")), None);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let msg = PendingMessage::new("g1", "é".repeat(60));
        assert_eq!(msg.preview().chars().count(), 53);
        assert_eq!(PendingMessage::new("g1", "short").preview(), "short");
    }
}
