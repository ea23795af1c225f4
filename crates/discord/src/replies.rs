use noteit_core::Note;
use serde::Serialize;

use crate::{
    commands::{CommandError, CommandUsage, COMMANDS},
    rest::split_message,
};

const FENCE_OPEN: &str = "```json\n";
const FENCE_CLOSE: &str = "\n```";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HelpEntry {
    pub command: String,
    pub syntax: String,
    pub description: String,
}

impl From<&CommandUsage> for HelpEntry {
    fn from(usage: &CommandUsage) -> Self {
        Self {
            command: usage.command.to_owned(),
            syntax: usage.syntax.to_owned(),
            description: usage.description.to_owned(),
        }
    }
}

/// Payload of a private reply. Serialized as a bare JSON object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Note(Note),
    Updated { updated: u64 },
    Deleted { deleted: u64 },
    Help { commands: Vec<HelpEntry> },
    Error { error: String },
}

impl Reply {
    pub fn help() -> Self {
        Self::Help { commands: COMMANDS.iter().map(HelpEntry::from).collect() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|error| {
            serde_json::json!({ "error": format!("failed to render reply: {error}") }).to_string()
        })
    }

    /// Message text sent to the user: the JSON payload in a code fence.
    pub fn render(&self) -> String {
        fence(&self.to_json())
    }

    /// Renders the reply as one or more messages of at most `limit`
    /// characters. The payload is split before fencing so every message
    /// carries its own opening and closing fence.
    pub fn render_messages(&self, limit: usize) -> Vec<String> {
        let overhead = FENCE_OPEN.chars().count() + FENCE_CLOSE.chars().count();
        let payload_limit = limit.saturating_sub(overhead).max(1);

        split_message(&self.to_json(), payload_limit).iter().map(|chunk| fence(chunk)).collect()
    }
}

fn fence(payload: &str) -> String {
    format!("{FENCE_OPEN}{payload}{FENCE_CLOSE}")
}

impl From<&CommandError> for Reply {
    fn from(error: &CommandError) -> Self {
        Self::error(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use noteit_core::{NewNote, NoteId};
    use serde_json::{json, Value};

    use super::Reply;
    use crate::commands::CommandError;
    use crate::rest::MESSAGE_CHAR_LIMIT;

    fn payload(reply: &Reply) -> Value {
        serde_json::from_str(&reply.to_json()).expect("reply is valid json")
    }

    #[test]
    fn note_reply_exposes_all_fields() {
        let date = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid date");
        let note = NewNote::new("Groceries", "Buy milk", vec!["food".into(), "home".into()], "alice")
            .into_note(NoteId::from("abc123"), date);

        let value = payload(&Reply::Note(note));

        assert_eq!(value["id"], "abc123");
        assert_eq!(value["title"], "Groceries");
        assert_eq!(value["body"], "Buy milk");
        assert_eq!(value["tags"], json!(["food", "home"]));
        assert_eq!(value["author"], "alice");
        assert!(value["date"].as_str().is_some_and(|date| date.starts_with("2026-03-01T12:00:00")));
    }

    #[test]
    fn count_replies_are_single_field_objects() {
        assert_eq!(payload(&Reply::Updated { updated: 1 }), json!({ "updated": 1 }));
        assert_eq!(payload(&Reply::Deleted { deleted: 0 }), json!({ "deleted": 0 }));
    }

    #[test]
    fn help_lists_every_command_with_syntax() {
        let value = payload(&Reply::help());
        let commands = value["commands"].as_array().expect("commands array");

        let names: Vec<&str> =
            commands.iter().filter_map(|entry| entry["command"].as_str()).collect();
        assert_eq!(names, vec!["help", "add", "delete", "patch"]);
        assert_eq!(commands[1]["syntax"], "!ni:add:{title}:{body}:{tag1,tag2,...}");
    }

    #[test]
    fn errors_render_in_json_fence() {
        let reply = Reply::from(&CommandError::InvalidParameters);
        let rendered = reply.render();

        assert!(reply.is_error());
        assert!(rendered.starts_with("```json\n"));
        assert!(rendered.ends_with("\n```"));
        assert!(rendered.contains("invalid parameters"));
    }

    #[test]
    fn short_replies_render_as_a_single_message() {
        let reply = Reply::Updated { updated: 1 };

        assert_eq!(reply.render_messages(MESSAGE_CHAR_LIMIT), vec![reply.render()]);
    }

    #[test]
    fn long_replies_keep_a_fence_on_every_message() {
        let reply = Reply::error("x".repeat(1_990));
        assert!(reply.render().chars().count() > MESSAGE_CHAR_LIMIT);

        let messages = reply.render_messages(MESSAGE_CHAR_LIMIT);

        assert_eq!(messages.len(), 2);
        for message in &messages {
            assert!(message.starts_with("```json\n"), "missing opening fence: {message:?}");
            assert!(message.ends_with("\n```"), "missing closing fence: {message:?}");
            assert!(message.chars().count() <= MESSAGE_CHAR_LIMIT);
        }
        let payload: String = messages
            .iter()
            .map(|message| &message["```json\n".len()..message.len() - "\n```".len()])
            .collect();
        assert_eq!(payload, reply.to_json());
    }
}
