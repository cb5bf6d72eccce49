//! Round-robin serving of reference content.
//!
//! Every content table is read through the same "next row after the cursor,
//! wrap to the first row" query. The cursor lives in `content_cursors`, keyed
//! by stream and category, and is only touched inside a transaction that holds
//! a transaction-scoped advisory lock for that key. Concurrent callers for the
//! same key are therefore totally ordered, and a failed serve rolls back
//! without moving the cursor.

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};

use crate::core::time::primitive_now_utc;
use crate::db::models::{LabeledImage, Myth, ReadingPassage, Sentence};

/// A content table served through `content_cursors`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ContentStream {
    pub(crate) name: &'static str,
    table: &'static str,
    id_column: &'static str,
    category_column: Option<&'static str>,
    columns: &'static str,
}

pub(crate) const SENTENCES: ContentStream = ContentStream {
    name: "sentences",
    table: "sentence_jumbling",
    id_column: "sentence_id",
    category_column: Some("difficulty_level"),
    columns: "sentence_id, original_sentence, jumbled_sentence, difficulty_level",
};

pub(crate) const LABELED_IMAGES: ContentStream = ContentStream {
    name: "image_labeling",
    table: "image_labeling",
    id_column: "image_id",
    category_column: None,
    columns: "image_id, image_byte, image_label",
};

pub(crate) const MYTHS: ContentStream = ContentStream {
    name: "dyslexia_myths",
    table: "dyslexia_myths",
    id_column: "id",
    category_column: None,
    columns: "id, myth, truth",
};

pub(crate) const READING_PASSAGES: ContentStream = ContentStream {
    name: "reading_speed",
    table: "reading_speed",
    id_column: "id",
    category_column: Some("level"),
    columns: "id, text, level, word_count",
};

/// Category key used for streams without a category column.
pub(crate) const SINGLETON: &str = "";

pub(crate) trait CursorRow: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    fn cursor_id(&self) -> i32;
}

impl CursorRow for Sentence {
    fn cursor_id(&self) -> i32 {
        self.sentence_id
    }
}

impl CursorRow for LabeledImage {
    fn cursor_id(&self) -> i32 {
        self.image_id
    }
}

impl CursorRow for Myth {
    fn cursor_id(&self) -> i32 {
        self.id
    }
}

impl CursorRow for ReadingPassage {
    fn cursor_id(&self) -> i32 {
        self.id
    }
}

impl ContentStream {
    fn category_key<'a>(&self, category: &'a str) -> &'a str {
        if self.category_column.is_some() {
            category
        } else {
            SINGLETON
        }
    }

    fn lock_key(&self, category: &str) -> String {
        format!("{}:{}", self.name, category)
    }

    /// Rows strictly after the cursor when `after` is true, otherwise rows up
    /// to and including it (the wrap-around part).
    fn select_sql(&self, after: bool) -> String {
        let (category_filter, cursor_param) = match self.category_column {
            Some(column) => (format!("{column} = $1 AND "), 2),
            None => (String::new(), 1),
        };
        let comparison = if after { ">" } else { "<=" };
        format!(
            "SELECT {columns}
             FROM {table}
             WHERE {category_filter}{id} {comparison} ${cursor_param}
             ORDER BY {id} ASC
             LIMIT ${limit_param}",
            columns = self.columns,
            table = self.table,
            id = self.id_column,
            limit_param = cursor_param + 1,
        )
    }
}

pub(crate) async fn next_row<T: CursorRow>(
    pool: &PgPool,
    stream: &ContentStream,
    category: &str,
) -> Result<Option<T>, sqlx::Error> {
    Ok(next_rows::<T>(pool, stream, category, 1).await?.into_iter().next())
}

/// Serve up to `limit` rows after the stored cursor, continuing from the
/// first row of the category when the end is reached. A row is never served
/// twice in one batch. Returns an empty vector, leaving the cursor untouched,
/// when the category has no rows.
pub(crate) async fn next_rows<T: CursorRow>(
    pool: &PgPool,
    stream: &ContentStream,
    category: &str,
    limit: i64,
) -> Result<Vec<T>, sqlx::Error> {
    let category = stream.category_key(category);
    let limit = limit.max(1);

    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(stream.lock_key(category))
        .execute(&mut *tx)
        .await?;

    let cursor = sqlx::query_scalar::<_, i32>(
        "SELECT last_served_id
         FROM content_cursors
         WHERE stream = $1 AND category = $2",
    )
    .bind(stream.name)
    .bind(category)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(0);

    let after_sql = stream.select_sql(true);
    let mut query = sqlx::query_as::<_, T>(&after_sql);
    if stream.category_column.is_some() {
        query = query.bind(category);
    }
    let mut rows = query.bind(cursor).bind(limit).fetch_all(&mut *tx).await?;

    let remaining = limit - rows.len() as i64;
    if remaining > 0 {
        let wrap_sql = stream.select_sql(false);
        let mut query = sqlx::query_as::<_, T>(&wrap_sql);
        if stream.category_column.is_some() {
            query = query.bind(category);
        }
        let wrapped = query.bind(cursor).bind(remaining).fetch_all(&mut *tx).await?;
        rows.extend(wrapped);
    }

    let Some(last_id) = rows.last().map(CursorRow::cursor_id) else {
        tx.rollback().await?;
        tracing::debug!(stream = stream.name, category, "content category is empty");
        return Ok(Vec::new());
    };

    sqlx::query(
        "INSERT INTO content_cursors (stream, category, last_served_id, updated_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (stream, category) DO UPDATE
         SET last_served_id = EXCLUDED.last_served_id,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(stream.name)
    .bind(category)
    .bind(last_id)
    .bind(primitive_now_utc())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        stream = stream.name,
        category,
        previous_cursor = cursor,
        last_served_id = last_id,
        served = rows.len(),
        "served content rows"
    );

    Ok(rows)
}
