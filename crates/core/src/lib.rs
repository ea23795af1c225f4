pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, LoadOptions, Settings};
pub use domain::note::{NewNote, Note, NoteId};
pub use errors::DomainError;
