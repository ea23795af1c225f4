use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

pub const TITLE_MAX_CHARS: usize = 64;
pub const AUTHOR_MAX_CHARS: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub String);

impl NoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// A persisted note. `id` and `date` are assigned by the repository on
/// creation and never change afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub author: String,
    pub date: DateTime<Utc>,
}

/// A note that has not been stored yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewNote {
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub author: String,
}

impl NewNote {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        tags: Vec<String>,
        author: impl Into<String>,
    ) -> Self {
        Self { title: title.into(), body: body.into(), tags, author: author.into() }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        validate_title(&self.title)?;
        validate_author(&self.author)
    }

    pub fn into_note(self, id: NoteId, date: DateTime<Utc>) -> Note {
        Note {
            id,
            title: self.title,
            body: self.body,
            tags: self.tags,
            author: self.author,
            date,
        }
    }
}

pub fn validate_title(title: &str) -> Result<(), DomainError> {
    let length = title.chars().count();
    if length > TITLE_MAX_CHARS {
        return Err(DomainError::TitleTooLong { length, max: TITLE_MAX_CHARS });
    }
    Ok(())
}

pub fn validate_author(author: &str) -> Result<(), DomainError> {
    let length = author.chars().count();
    if length > AUTHOR_MAX_CHARS {
        return Err(DomainError::AuthorTooLong { length, max: AUTHOR_MAX_CHARS });
    }
    Ok(())
}

/// Creation time truncated to microseconds, the precision the store keeps.
pub fn creation_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::{creation_timestamp, NewNote, NoteId, TITLE_MAX_CHARS};
    use crate::errors::DomainError;

    #[test]
    fn generated_ids_are_unique() {
        let first = NoteId::generate();
        let second = NoteId::generate();

        assert_ne!(first, second);
        assert_eq!(first.as_str().len(), 32);
    }

    #[test]
    fn title_limit_counts_characters_not_bytes() {
        let at_limit = NewNote::new("é".repeat(TITLE_MAX_CHARS), "", Vec::new(), "alice");
        assert!(at_limit.validate().is_ok());

        let over_limit = NewNote::new("a".repeat(TITLE_MAX_CHARS + 1), "", Vec::new(), "alice");
        assert_eq!(
            over_limit.validate(),
            Err(DomainError::TitleTooLong { length: TITLE_MAX_CHARS + 1, max: TITLE_MAX_CHARS })
        );
    }

    #[test]
    fn empty_fields_are_allowed() {
        let note = NewNote::new("", "", Vec::new(), "");
        assert!(note.validate().is_ok());
    }

    #[test]
    fn into_note_keeps_content_and_assigns_identity() {
        let date = creation_timestamp();
        let note = NewNote::new("Groceries", "Buy milk", vec!["food".to_owned()], "alice")
            .into_note(NoteId::from("n-1"), date);

        assert_eq!(note.id.as_str(), "n-1");
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.tags, vec!["food"]);
        assert_eq!(note.author, "alice");
        assert_eq!(note.date.nanosecond() % 1_000, 0);
    }

    #[test]
    fn note_id_serializes_as_plain_string() {
        let encoded = serde_json::to_string(&NoteId::from("abc")).expect("serialize id");
        assert_eq!(encoded, "\"abc\"");
    }
}
