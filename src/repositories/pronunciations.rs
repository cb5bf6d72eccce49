use std::collections::HashMap;

use sqlx::PgPool;

/// First listed pronunciation for each of `words` that has one. Words are
/// matched lower-cased.
pub(crate) async fn lookup(
    pool: &PgPool,
    words: &[String],
) -> Result<HashMap<String, String>, sqlx::Error> {
    if words.is_empty() {
        return Ok(HashMap::new());
    }

    let lowered: Vec<String> = words.iter().map(|word| word.to_lowercase()).collect();
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT DISTINCT ON (word) word, phones
         FROM word_pronunciations
         WHERE word = ANY($1)
         ORDER BY word, variant ASC",
    )
    .bind(&lowered)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
