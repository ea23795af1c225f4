//! Typed query and update descriptors for the note collection.
//!
//! A [`NoteFilter`] is a conjunction of equality tests; an empty filter
//! matches every note. A [`NoteUpdate`] replaces the fields it carries and
//! leaves the rest untouched.

use std::cmp::Ordering;
use std::str::FromStr;

use noteit_core::domain::note::{validate_title, Note, NoteId};
use noteit_core::DomainError;
use thiserror::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub id: Option<NoteId>,
    pub author: Option<String>,
    pub title: Option<String>,
    /// Matches notes whose tag list contains this value.
    pub tag: Option<String>,
}

impl NoteFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: NoteId) -> Self {
        Self { id: Some(id), ..Self::default() }
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn matches(&self, note: &Note) -> bool {
        self.id.as_ref().map_or(true, |id| &note.id == id)
            && self.author.as_ref().map_or(true, |author| &note.author == author)
            && self.title.as_ref().map_or(true, |title| &note.title == title)
            && self.tag.as_ref().map_or(true, |tag| note.tags.contains(tag))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl NoteUpdate {
    /// Replaces title, body and tags in a single update.
    pub fn replace_content(
        title: impl Into<String>,
        body: impl Into<String>,
        tags: Vec<String>,
    ) -> Self {
        Self { title: Some(title.into()), body: Some(body.into()), tags: Some(tags) }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.tags.is_none()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    pub fn apply(&self, note: &mut Note) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(body) = &self.body {
            note.body = body.clone();
        }
        if let Some(tags) = &self.tags {
            note.tags = tags.clone();
        }
    }
}

/// Skip `skip` notes, then take at most `limit`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(skip: Option<u32>, limit: Option<u32>) -> Self {
        Self { skip, limit }
    }

    pub fn apply<T>(self, items: Vec<T>) -> Vec<T> {
        let skip = self.skip.map_or(0, |skip| skip as usize);
        let limit = self.limit.map_or(usize::MAX, |limit| limit as usize);
        items.into_iter().skip(skip).take(limit).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortField {
    Title,
    Body,
    Author,
    Date,
}

impl SortField {
    pub fn column(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Body => "body",
            Self::Author => "author",
            Self::Date => "date",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SortKeyParseError {
    #[error("unknown sort field `{0}` (expected title|body|author|date)")]
    UnknownField(String),
}

impl SortKey {
    pub fn ascending(field: SortField) -> Self {
        Self { field, direction: SortDirection::Ascending }
    }

    pub fn descending(field: SortField) -> Self {
        Self { field, direction: SortDirection::Descending }
    }

    pub fn compare(&self, left: &Note, right: &Note) -> Ordering {
        let ordering = match self.field {
            SortField::Title => left.title.cmp(&right.title),
            SortField::Body => left.body.cmp(&right.body),
            SortField::Author => left.author.cmp(&right.author),
            SortField::Date => left.date.cmp(&right.date),
        };

        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Parses `date` as ascending and `-date` as descending. A leading `+` is
/// accepted for symmetry.
impl FromStr for SortKey {
    type Err = SortKeyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let (direction, name) = match value.strip_prefix('-') {
            Some(name) => (SortDirection::Descending, name),
            None => (SortDirection::Ascending, value.strip_prefix('+').unwrap_or(value)),
        };

        let field = match name.to_ascii_lowercase().as_str() {
            "title" => SortField::Title,
            "body" => SortField::Body,
            "author" => SortField::Author,
            "date" => SortField::Date,
            _ => return Err(SortKeyParseError::UnknownField(name.to_owned())),
        };

        Ok(Self { field, direction })
    }
}

pub fn compare_notes(keys: &[SortKey], left: &Note, right: &Note) -> Ordering {
    keys.iter()
        .map(|key| key.compare(left, right))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use noteit_core::domain::note::{NewNote, Note, NoteId};

    use super::{compare_notes, NoteFilter, NoteUpdate, Page, SortField, SortKey};

    fn note(id: &str, title: &str, author: &str, tags: &[&str], age_minutes: i64) -> Note {
        NewNote::new(title, "body", tags.iter().map(|tag| tag.to_string()).collect(), author)
            .into_note(NoteId::from(id), Utc::now() - Duration::minutes(age_minutes))
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(NoteFilter::all().matches(&note("n-1", "a", "alice", &[], 0)));
    }

    #[test]
    fn filter_fields_are_conjunctive() {
        let groceries = note("n-1", "Groceries", "alice", &["food", "home"], 0);

        assert!(NoteFilter::all().author("alice").tag("food").matches(&groceries));
        assert!(!NoteFilter::all().author("alice").tag("work").matches(&groceries));
        assert!(!NoteFilter::by_id(NoteId::from("n-2")).author("alice").matches(&groceries));
        assert!(NoteFilter::by_id(NoteId::from("n-1")).title("Groceries").matches(&groceries));
    }

    #[test]
    fn sort_keys_parse_direction_prefix() {
        assert_eq!("date".parse::<SortKey>(), Ok(SortKey::ascending(SortField::Date)));
        assert_eq!("-date".parse::<SortKey>(), Ok(SortKey::descending(SortField::Date)));
        assert_eq!("+Title".parse::<SortKey>(), Ok(SortKey::ascending(SortField::Title)));
        assert!("-color".parse::<SortKey>().is_err());
    }

    #[test]
    fn compare_notes_falls_through_to_later_keys() {
        let older = note("n-1", "same", "alice", &[], 10);
        let newer = note("n-2", "same", "alice", &[], 1);
        let keys = [SortKey::ascending(SortField::Title), SortKey::descending(SortField::Date)];

        let mut notes = vec![older.clone(), newer.clone()];
        notes.sort_by(|left, right| compare_notes(&keys, left, right));

        assert_eq!(notes, vec![newer, older]);
    }

    #[test]
    fn page_skips_then_limits() {
        let items: Vec<u32> = (0..10).collect();

        assert_eq!(Page::new(Some(2), Some(3)).apply(items.clone()), vec![2, 3, 4]);
        assert_eq!(Page::new(Some(8), None).apply(items.clone()), vec![8, 9]);
        assert_eq!(Page::all().apply(items).len(), 10);
    }

    #[test]
    fn update_only_touches_present_fields() {
        let mut target = note("n-1", "Groceries", "alice", &["food"], 0);
        let update = NoteUpdate { body: Some("Buy bread".to_string()), ..NoteUpdate::default() };

        update.apply(&mut target);

        assert_eq!(target.title, "Groceries");
        assert_eq!(target.body, "Buy bread");
        assert_eq!(target.tags, vec!["food"]);
        assert!(NoteUpdate::default().is_empty());
        assert!(NoteUpdate::replace_content("a".repeat(65), "", Vec::new()).validate().is_err());
    }
}
