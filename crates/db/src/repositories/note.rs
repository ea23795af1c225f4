use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Row, Sqlite};

use noteit_core::domain::note::{creation_timestamp, NewNote, Note, NoteId};

use super::{NoteRepository, RepositoryError};
use crate::query::{NoteFilter, NoteUpdate, Page, SortDirection, SortKey};
use crate::DbPool;

const SELECT_NOTE: &str = "SELECT id, title, body, tags, author, date FROM note";

pub struct SqlNoteRepository {
    pool: DbPool,
}

impl SqlNoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Fixed-width RFC 3339 so that text order in the `date` column is
/// chronological order.
fn format_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_note(row: &sqlx::sqlite::SqliteRow) -> Result<Note, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let body: String = row.try_get("body").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tags_json: String =
        row.try_get("tags").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let author: String =
        row.try_get("author").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let date_str: String =
        row.try_get("date").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let tags = serde_json::from_str::<Vec<String>>(&tags_json)
        .map_err(|e| RepositoryError::Decode(format!("note `{id}` has malformed tags: {e}")))?;
    let date = DateTime::parse_from_rfc3339(&date_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("note `{id}` has malformed date: {e}")))?;

    Ok(Note { id: NoteId(id), title, body, tags, author, date })
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &NoteFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(id) = &filter.id {
        builder.push(" AND id = ").push_bind(id.0.clone());
    }
    if let Some(author) = &filter.author {
        builder.push(" AND author = ").push_bind(author.clone());
    }
    if let Some(title) = &filter.title {
        builder.push(" AND title = ").push_bind(title.clone());
    }
    if let Some(tag) = &filter.tag {
        builder
            .push(" AND EXISTS (SELECT 1 FROM json_each(note.tags) WHERE json_each.value = ")
            .push_bind(tag.clone())
            .push(")");
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Sqlite>, sort: &[SortKey]) {
    builder.push(" ORDER BY ");
    for key in sort {
        let direction = match key.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        builder.push(key.field.column()).push(" ").push(direction).push(", ");
    }
    builder.push("rowid ASC");
}

fn push_page(builder: &mut QueryBuilder<'_, Sqlite>, page: Page) {
    match (page.skip, page.limit) {
        (_, Some(limit)) => {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }
        (Some(_), None) => {
            builder.push(" LIMIT -1");
        }
        (None, None) => return,
    }
    if let Some(skip) = page.skip {
        builder.push(" OFFSET ").push_bind(i64::from(skip));
    }
}

fn push_assignments(
    builder: &mut QueryBuilder<'_, Sqlite>,
    update: &NoteUpdate,
) -> Result<(), RepositoryError> {
    let tags = update.tags.as_ref().map(serde_json::to_string).transpose()?;

    let mut assignments = builder.separated(", ");
    if let Some(title) = &update.title {
        assignments.push("title = ").push_bind_unseparated(title.clone());
    }
    if let Some(body) = &update.body {
        assignments.push("body = ").push_bind_unseparated(body.clone());
    }
    if let Some(tags) = tags {
        assignments.push("tags = ").push_bind_unseparated(tags);
    }
    Ok(())
}

#[async_trait::async_trait]
impl NoteRepository for SqlNoteRepository {
    async fn create(&self, note: NewNote) -> Result<Note, RepositoryError> {
        note.validate()?;
        let note = note.into_note(NoteId::generate(), creation_timestamp());
        let tags = serde_json::to_string(&note.tags)?;

        sqlx::query(
            "INSERT INTO note (id, title, body, tags, author, date)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&note.id.0)
        .bind(&note.title)
        .bind(&note.body)
        .bind(&tags)
        .bind(&note.author)
        .bind(format_date(note.date))
        .execute(&self.pool)
        .await?;

        Ok(note)
    }

    async fn get(&self, filter: &NoteFilter) -> Result<Option<Note>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_NOTE);
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY rowid ASC LIMIT 1");

        let row = builder.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_note).transpose()
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
        let mut builder = QueryBuilder::<Sqlite>::new(SELECT_NOTE);
        push_filter(&mut builder, filter);
        push_order(&mut builder, sort);
        push_page(&mut builder, page);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_note).collect::<Result<Vec<_>, _>>()
    }

    async fn update(&self, id: &NoteId, update: &NoteUpdate) -> Result<u64, RepositoryError> {
        self.update_many(&NoteFilter::by_id(id.clone()), update).await
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

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE note SET ");
        push_assignments(&mut builder, update)?;
        push_filter(&mut builder, filter);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, filter: &NoteFilter) -> Result<u64, RepositoryError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("DELETE FROM note WHERE rowid = (SELECT rowid FROM note");
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY rowid ASC LIMIT 1)");

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, filter: &NoteFilter) -> Result<u64, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM note");
        push_filter(&mut builder, filter);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use noteit_core::domain::note::{NewNote, NoteId};

    use super::SqlNoteRepository;
    use crate::query::{NoteFilter, NoteUpdate, Page, SortField, SortKey};
    use crate::repositories::{NoteRepository, RepositoryError};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlNoteRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlNoteRepository::new(pool)
    }

    fn new_note(title: &str, author: &str, tags: &[&str]) -> NewNote {
        NewNote::new(title, "Buy milk", tags.iter().map(|tag| tag.to_string()).collect(), author)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = setup().await;

        let created =
            repo.create(new_note("Groceries", "alice", &["food", "home"])).await.expect("create");
        let found = repo
            .get(&NoteFilter::by_id(created.id.clone()))
            .await
            .expect("get")
            .expect("note should exist");

        assert_eq!(found, created);
        assert_eq!(found.tags, vec!["food", "home"]);
    }

    #[tokio::test]
    async fn get_returns_none_for_unknown_id() {
        let repo = setup().await;

        let found = repo.get(&NoteFilter::by_id(NoteId::from("missing"))).await.expect("get");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn create_rejects_overlong_author() {
        let repo = setup().await;

        let result = repo.create(new_note("t", &"a".repeat(257), &[])).await;

        assert!(matches!(result, Err(RepositoryError::Validation(_))));
    }

    #[tokio::test]
    async fn tag_filter_matches_list_membership() {
        let repo = setup().await;
        repo.create(new_note("one", "alice", &["food", "home"])).await.expect("create");
        repo.create(new_note("two", "alice", &["work"])).await.expect("create");
        repo.create(new_note("three", "bob", &["food"])).await.expect("create");

        let food = repo.get_many(&NoteFilter::all().tag("food"), Page::all()).await.expect("list");
        let alice_food = repo
            .get_many(&NoteFilter::all().author("alice").tag("food"), Page::all())
            .await
            .expect("list");

        assert_eq!(food.len(), 2);
        assert_eq!(alice_food.len(), 1);
        assert_eq!(alice_food[0].title, "one");
    }

    #[tokio::test]
    async fn get_many_sorted_orders_and_pages() {
        let repo = setup().await;
        for (title, author) in [("c", "bob"), ("a", "alice"), ("d", "alice"), ("b", "bob")] {
            repo.create(new_note(title, author, &[])).await.expect("create");
        }

        let by_title_desc = repo
            .get_many_sorted(
                &NoteFilter::all(),
                Page::new(Some(1), Some(2)),
                &[SortKey::descending(SortField::Title)],
            )
            .await
            .expect("list");
        let titles: Vec<&str> = by_title_desc.iter().map(|note| note.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "b"]);

        let by_author_then_title = repo
            .get_many_sorted(
                &NoteFilter::all(),
                Page::all(),
                &[SortKey::ascending(SortField::Author), SortKey::descending(SortField::Title)],
            )
            .await
            .expect("list");
        let titles: Vec<&str> =
            by_author_then_title.iter().map(|note| note.title.as_str()).collect();
        assert_eq!(titles, vec!["d", "a", "c", "b"]);

        let skipped_only =
            repo.get_many(&NoteFilter::all(), Page::new(Some(3), None)).await.expect("list");
        assert_eq!(skipped_only.len(), 1);
    }

    #[tokio::test]
    async fn update_replaces_fields_for_one_note() {
        let repo = setup().await;
        let note = repo.create(new_note("Groceries", "alice", &["food"])).await.expect("create");
        let other = repo.create(new_note("Other", "alice", &["food"])).await.expect("create");

        let modified = repo
            .update(
                &note.id,
                &NoteUpdate::replace_content("Shopping", "Buy bread", vec!["home".to_string()]),
            )
            .await
            .expect("update");
        assert_eq!(modified, 1);

        let updated =
            repo.get(&NoteFilter::by_id(note.id.clone())).await.expect("get").expect("exists");
        assert_eq!(updated.title, "Shopping");
        assert_eq!(updated.body, "Buy bread");
        assert_eq!(updated.tags, vec!["home"]);
        assert_eq!(updated.date, note.date);

        let untouched = repo.get(&NoteFilter::by_id(other.id)).await.expect("get").expect("exists");
        assert_eq!(untouched.title, "Other");

        let missing = repo
            .update(&NoteId::from("missing"), &NoteUpdate::replace_content("x", "y", Vec::new()))
            .await
            .expect("update");
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn update_many_applies_to_all_matches() {
        let repo = setup().await;
        repo.create(new_note("one", "alice", &[])).await.expect("create");
        repo.create(new_note("two", "alice", &[])).await.expect("create");
        repo.create(new_note("three", "bob", &[])).await.expect("create");

        let update = NoteUpdate { tags: Some(vec!["archived".to_string()]), ..NoteUpdate::default() };
        let modified =
            repo.update_many(&NoteFilter::all().author("alice"), &update).await.expect("update");
        assert_eq!(modified, 2);

        let archived =
            repo.get_many(&NoteFilter::all().tag("archived"), Page::all()).await.expect("list");
        assert_eq!(archived.len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_only_first_match() {
        let repo = setup().await;
        let first = repo.create(new_note("one", "alice", &[])).await.expect("create");
        repo.create(new_note("two", "alice", &[])).await.expect("create");

        let removed = repo.delete(&NoteFilter::all().author("alice")).await.expect("delete");
        assert_eq!(removed, 1);
        assert!(repo.get(&NoteFilter::by_id(first.id.clone())).await.expect("get").is_none());

        let again = repo.delete(&NoteFilter::by_id(first.id)).await.expect("delete");
        assert_eq!(again, 0);

        let remaining = repo.get_many(&NoteFilter::all(), Page::all()).await.expect("list");
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn delete_many_reports_removed_count() {
        let repo = setup().await;
        repo.create(new_note("one", "alice", &["x"])).await.expect("create");
        repo.create(new_note("two", "bob", &["x"])).await.expect("create");
        repo.create(new_note("three", "bob", &["y"])).await.expect("create");

        let removed = repo.delete_many(&NoteFilter::all().tag("x")).await.expect("delete");

        assert_eq!(removed, 2);
        assert_eq!(repo.get_many(&NoteFilter::all(), Page::all()).await.expect("list").len(), 1);
    }
}
