use async_trait::async_trait;
use thiserror::Error;

use noteit_core::domain::note::{NewNote, Note, NoteId};
use noteit_core::DomainError;

use crate::query::{NoteFilter, NoteUpdate, Page, SortKey};

pub mod memory;
pub mod note;

pub use memory::InMemoryNoteRepository;
pub use note::SqlNoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] DomainError),
}

/// Data access over the single note collection. Implementations forward the
/// descriptors to the store and perform no checks beyond field limits.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Stores a new note, assigning its id and creation date.
    async fn create(&self, note: NewNote) -> Result<Note, RepositoryError>;

    async fn get(&self, filter: &NoteFilter) -> Result<Option<Note>, RepositoryError>;

    async fn get_many(
        &self,
        filter: &NoteFilter,
        page: Page,
    ) -> Result<Vec<Note>, RepositoryError>;

    async fn get_many_sorted(
        &self,
        filter: &NoteFilter,
        page: Page,
        sort: &[SortKey],
    ) -> Result<Vec<Note>, RepositoryError>;

    /// Returns the number of notes modified, 0 or 1.
    async fn update(&self, id: &NoteId, update: &NoteUpdate) -> Result<u64, RepositoryError>;

    async fn update_many(
        &self,
        filter: &NoteFilter,
        update: &NoteUpdate,
    ) -> Result<u64, RepositoryError>;

    /// Removes the first matching note. Returns 0 or 1.
    async fn delete(&self, filter: &NoteFilter) -> Result<u64, RepositoryError>;

    async fn delete_many(&self, filter: &NoteFilter) -> Result<u64, RepositoryError>;
}
