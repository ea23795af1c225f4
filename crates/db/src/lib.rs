pub mod connection;
pub mod migrations;
pub mod query;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use query::{NoteFilter, NoteUpdate, Page, SortDirection, SortField, SortKey};
pub use repositories::{
    InMemoryNoteRepository, NoteRepository, RepositoryError, SqlNoteRepository,
};
