use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("note title is {length} characters long, the limit is {max}")]
    TitleTooLong { length: usize, max: usize },
    #[error("note author is {length} characters long, the limit is {max}")]
    AuthorTooLong { length: usize, max: usize },
}
