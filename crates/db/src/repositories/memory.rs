use tokio::sync::RwLock;

use noteit_core::domain::note::{creation_timestamp, NewNote, Note, NoteId};

use super::{NoteRepository, RepositoryError};
use crate::query::{compare_notes, NoteFilter, NoteUpdate, Page, SortKey};

/// Note store kept in insertion order.
#[derive(Default)]
pub struct InMemoryNoteRepository {
    notes: RwLock<Vec<Note>>,
}

impl InMemoryNoteRepository {
    pub async fn len(&self) -> usize {
        self.notes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notes.read().await.is_empty()
    }
}

#[async_trait::async_trait]
impl NoteRepository for InMemoryNoteRepository {
    async fn create(&self, note: NewNote) -> Result<Note, RepositoryError> {
        note.validate()?;
        let note = note.into_note(NoteId::generate(), creation_timestamp());

        let mut notes = self.notes.write().await;
        notes.push(note.clone());
        Ok(note)
    }

    async fn get(&self, filter: &NoteFilter) -> Result<Option<Note>, RepositoryError> {
        let notes = self.notes.read().await;
        Ok(notes.iter().find(|note| filter.matches(note)).cloned())
    }

    async fn get_many(
        &self,
        filter: &NoteFilter,
        page: Page,
    ) -> Result<Vec<Note>, RepositoryError> {
        self.get_many_sorted(filter, page, &[]).await
    }

    async fn get_many_sorted(
        &self,
        filter: &NoteFilter,
        page: Page,
        sort: &[SortKey],
    ) -> Result<Vec<Note>, RepositoryError> {
        let notes = self.notes.read().await;
        let mut matched: Vec<Note> =
            notes.iter().filter(|note| filter.matches(note)).cloned().collect();
        if !sort.is_empty() {
            matched.sort_by(|left, right| compare_notes(sort, left, right));
        }
        Ok(page.apply(matched))
    }

    async fn update(&self, id: &NoteId, update: &NoteUpdate) -> Result<u64, RepositoryError> {
        update.validate()?;
        if update.is_empty() {
            return Ok(0);
        }

        let mut notes = self.notes.write().await;
        match notes.iter_mut().find(|note| &note.id == id) {
            Some(note) => {
                update.apply(note);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_many(
        &self,
        filter: &NoteFilter,
        update: &NoteUpdate,
    ) -> Result<u64, RepositoryError> {
        update.validate()?;
        if update.is_empty() {
            return Ok(0);
        }

        let mut notes = self.notes.write().await;
        let mut modified = 0;
        for note in notes.iter_mut().filter(|note| filter.matches(note)) {
            update.apply(note);
            modified += 1;
        }
        Ok(modified)
    }

    async fn delete(&self, filter: &NoteFilter) -> Result<u64, RepositoryError> {
        let mut notes = self.notes.write().await;
        match notes.iter().position(|note| filter.matches(note)) {
            Some(index) => {
                notes.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, filter: &NoteFilter) -> Result<u64, RepositoryError> {
        let mut notes = self.notes.write().await;
        let before = notes.len();
        notes.retain(|note| !filter.matches(note));
        Ok((before - notes.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use noteit_core::domain::note::{NewNote, NoteId};

    use crate::query::{NoteFilter, NoteUpdate, Page, SortField, SortKey};
    use crate::repositories::{InMemoryNoteRepository, NoteRepository, RepositoryError};

    fn new_note(title: &str, author: &str, tags: &[&str]) -> NewNote {
        NewNote::new(title, "body", tags.iter().map(|tag| tag.to_string()).collect(), author)
    }

    #[tokio::test]
    async fn in_memory_note_repo_round_trip() {
        let repo = InMemoryNoteRepository::default();

        let created = repo.create(new_note("Groceries", "alice", &["food"])).await.expect("create");
        let found = repo.get(&NoteFilter::by_id(created.id.clone())).await.expect("get");

        assert_eq!(found, Some(created));
    }

    #[tokio::test]
    async fn create_rejects_overlong_title() {
        let repo = InMemoryNoteRepository::default();

        let result = repo.create(new_note(&"t".repeat(65), "alice", &[])).await;

        assert!(matches!(result, Err(RepositoryError::Validation(_))));
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn get_many_sorted_pages_after_sorting() {
        let repo = InMemoryNoteRepository::default();
        for title in ["c", "a", "d", "b"] {
            repo.create(new_note(title, "alice", &[])).await.expect("create");
        }

        let notes = repo
            .get_many_sorted(
                &NoteFilter::all(),
                Page::new(Some(1), Some(2)),
                &[SortKey::ascending(SortField::Title)],
            )
            .await
            .expect("list");

        let titles: Vec<&str> = notes.iter().map(|note| note.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn update_and_delete_report_counts() {
        let repo = InMemoryNoteRepository::default();
        let first = repo.create(new_note("one", "alice", &["x"])).await.expect("create");
        repo.create(new_note("two", "alice", &["x"])).await.expect("create");
        repo.create(new_note("three", "bob", &["x"])).await.expect("create");

        let update = NoteUpdate { body: Some("edited".to_string()), ..NoteUpdate::default() };
        assert_eq!(repo.update(&first.id, &update).await.expect("update"), 1);
        assert_eq!(repo.update(&NoteId::from("missing"), &update).await.expect("update"), 0);
        assert_eq!(
            repo.update_many(&NoteFilter::all().author("alice"), &update).await.expect("many"),
            2
        );

        assert_eq!(repo.delete(&NoteFilter::all().tag("x")).await.expect("delete"), 1);
        assert_eq!(repo.delete_many(&NoteFilter::all().tag("x")).await.expect("delete"), 2);
        assert_eq!(repo.delete(&NoteFilter::all()).await.expect("delete"), 0);
    }
}
