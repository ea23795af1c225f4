use std::sync::Arc;

use noteit_core::domain::note::{NewNote, Note, NoteId};
use noteit_core::DomainError;
use noteit_db::{NoteFilter, NoteRepository, NoteUpdate, RepositoryError};
use thiserror::Error;

use crate::replies::Reply;

pub const COMMAND_PREFIX: &str = "!ni";
const PARAMETER_DELIMITER: char = ':';
const TAG_DELIMITER: char = ',';

/// One entry of the help catalogue. `arity` counts every `:`-separated
/// parameter, including the empty one before the keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandUsage {
    pub command: &'static str,
    pub syntax: &'static str,
    pub description: &'static str,
    pub arity: Option<usize>,
}

pub const HELP: CommandUsage = CommandUsage {
    command: "help",
    syntax: "!ni:help",
    description: "list the supported commands",
    arity: None,
};

pub const ADD: CommandUsage = CommandUsage {
    command: "add",
    syntax: "!ni:add:{title}:{body}:{tag1,tag2,...}",
    description: "create a note",
    arity: Some(5),
};

pub const DELETE: CommandUsage = CommandUsage {
    command: "delete",
    syntax: "!ni:delete:{id}",
    description: "delete one of your notes",
    arity: Some(3),
};

pub const PATCH: CommandUsage = CommandUsage {
    command: "patch",
    syntax: "!ni:patch:{id}:{title}:{body}:{tag1,tag2,...}",
    description: "replace the title, body and tags of one of your notes",
    arity: Some(6),
};

pub const COMMANDS: [CommandUsage; 4] = [HELP, ADD, DELETE, PATCH];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoteCommand {
    Add { title: String, body: String, tags: Vec<String> },
    Patch { id: NoteId, title: String, body: String, tags: Vec<String> },
    Delete { id: NoteId },
    Help,
}

impl NoteCommand {
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Add { .. } => ADD.command,
            Self::Patch { .. } => PATCH.command,
            Self::Delete { .. } => DELETE.command,
            Self::Help => HELP.command,
        }
    }
}

/// The chat user a command acts on behalf of. `name` is what gets recorded
/// as a note's author and compared on patch and delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester {
    pub user_id: String,
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid parameters, see `!ni:help`")]
    InvalidParameters,
    #[error("wrong parameter count for `{command}`, usage: {usage}")]
    WrongParameterCount { command: &'static str, usage: &'static str, expected: usize, actual: usize },
    #[error("command `{keyword}` not found, see `!ni:help`")]
    UnknownCommand { keyword: String },
    #[error("note `{id}` belongs to another user, only its author may change it")]
    Unauthorized { id: NoteId },
    #[error("note `{id}` not found")]
    NotFound { id: NoteId },
    #[error(transparent)]
    InvalidNote(#[from] DomainError),
    #[error("note storage is unavailable, please retry shortly")]
    Persistence(String),
}

impl From<RepositoryError> for CommandError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Validation(error) => Self::InvalidNote(error),
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Recognizes a command message.
///
/// Returns `None` when the content is not addressed to the bot: it does not
/// start with `!ni`, or the prefix is followed by something other than `:`.
pub fn parse_note_command(content: &str) -> Option<Result<NoteCommand, CommandError>> {
    let remainder = content.strip_prefix(COMMAND_PREFIX)?;
    if !remainder.is_empty() && !remainder.starts_with(PARAMETER_DELIMITER) {
        return None;
    }

    let parameters: Vec<&str> = remainder.split(PARAMETER_DELIMITER).collect();
    Some(classify_note_command(&parameters))
}

fn classify_note_command(parameters: &[&str]) -> Result<NoteCommand, CommandError> {
    match parameters {
        [_, "add", title, body, tags] => Ok(NoteCommand::Add {
            title: (*title).to_owned(),
            body: (*body).to_owned(),
            tags: split_tags(tags),
        }),
        [_, "patch", id, title, body, tags] => Ok(NoteCommand::Patch {
            id: NoteId::from(*id),
            title: (*title).to_owned(),
            body: (*body).to_owned(),
            tags: split_tags(tags),
        }),
        [_, "delete", id] => Ok(NoteCommand::Delete { id: NoteId::from(*id) }),
        [_, "help", ..] => Ok(NoteCommand::Help),
        [_, "add", ..] => Err(wrong_parameter_count(&ADD, parameters.len())),
        [_, "patch", ..] => Err(wrong_parameter_count(&PATCH, parameters.len())),
        [_, "delete", ..] => Err(wrong_parameter_count(&DELETE, parameters.len())),
        [_, keyword, ..] => Err(CommandError::UnknownCommand { keyword: (*keyword).to_owned() }),
        _ => Err(CommandError::InvalidParameters),
    }
}

fn wrong_parameter_count(usage: &CommandUsage, actual: usize) -> CommandError {
    CommandError::WrongParameterCount {
        command: usage.command,
        usage: usage.syntax,
        expected: usage.arity.unwrap_or_default(),
        actual,
    }
}

/// Splits the comma-joined tag parameter. An empty parameter yields no tags.
pub fn split_tags(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(TAG_DELIMITER).map(str::to_owned).collect()
}

pub struct CommandRouter {
    notes: Arc<dyn NoteRepository>,
}

impl CommandRouter {
    pub fn new(notes: Arc<dyn NoteRepository>) -> Self {
        Self { notes }
    }

    /// Parses and executes a message. `None` means the message was not a
    /// command and gets no reply.
    pub async fn respond(
        &self,
        content: &str,
        requester: &Requester,
    ) -> Option<Result<Reply, CommandError>> {
        let outcome = match parse_note_command(content)? {
            Ok(command) => self.route(command, requester).await,
            Err(error) => Err(error),
        };
        Some(outcome)
    }

    pub async fn route(
        &self,
        command: NoteCommand,
        requester: &Requester,
    ) -> Result<Reply, CommandError> {
        match command {
            NoteCommand::Add { title, body, tags } => {
                let note =
                    self.notes.create(NewNote::new(title, body, tags, requester.name.clone())).await?;
                Ok(Reply::Note(note))
            }
            NoteCommand::Patch { id, title, body, tags } => {
                self.authorize(&id, requester).await?;
                let updated =
                    self.notes.update(&id, &NoteUpdate::replace_content(title, body, tags)).await?;
                Ok(Reply::Updated { updated })
            }
            NoteCommand::Delete { id } => {
                self.authorize(&id, requester).await?;
                let deleted = self.notes.delete(&NoteFilter::by_id(id)).await?;
                Ok(Reply::Deleted { deleted })
            }
            NoteCommand::Help => Ok(Reply::help()),
        }
    }

    /// Only the recorded author may act on a note. The read and the following
    /// write are separate store calls.
    async fn authorize(&self, id: &NoteId, requester: &Requester) -> Result<Note, CommandError> {
        let note = self
            .notes
            .get(&NoteFilter::by_id(id.clone()))
            .await?
            .ok_or_else(|| CommandError::NotFound { id: id.clone() })?;

        if note.author != requester.name {
            return Err(CommandError::Unauthorized { id: id.clone() });
        }
        Ok(note)
    }
}
