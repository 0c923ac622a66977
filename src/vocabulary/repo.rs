use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{Word, WordFields};
use crate::error::AppResult;

const WORD_COLUMNS: &str =
    "id, user_id, word, definition, user_example, ai_example, created_at, updated_at";

/// Per-user word list. Every operation is scoped by `user_id`; a word owned
/// by someone else behaves as if it did not exist.
#[async_trait]
pub trait VocabularyStore: Send + Sync {
    /// Newest first.
    async fn list(&self, user_id: i64) -> AppResult<Vec<Word>>;
    async fn create(&self, user_id: i64, fields: &WordFields) -> AppResult<Word>;
    async fn update(&self, user_id: i64, id: i64, fields: &WordFields) -> AppResult<Option<Word>>;
    async fn update_definition(
        &self,
        user_id: i64,
        id: i64,
        definition: &str,
    ) -> AppResult<Option<Word>>;
    async fn set_ai_example(&self, user_id: i64, id: i64, example: &str) -> AppResult<bool>;
    async fn delete(&self, user_id: i64, id: i64) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgVocabularyStore {
    db: PgPool,
}

impl PgVocabularyStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VocabularyStore for PgVocabularyStore {
    async fn list(&self, user_id: i64) -> AppResult<Vec<Word>> {
        let sql = format!(
            "SELECT {WORD_COLUMNS} FROM vocabulary WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, Word>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn create(&self, user_id: i64, fields: &WordFields) -> AppResult<Word> {
        let sql = format!(
            "INSERT INTO vocabulary (user_id, word, definition, user_example, ai_example) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {WORD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Word>(&sql)
            .bind(user_id)
            .bind(&fields.word)
            .bind(&fields.definition)
            .bind(&fields.user_example)
            .bind(&fields.ai_example)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn update(&self, user_id: i64, id: i64, fields: &WordFields) -> AppResult<Option<Word>> {
        let sql = format!(
            "UPDATE vocabulary \
                SET word = $3, definition = $4, user_example = $5, ai_example = $6, \
                    updated_at = now() \
              WHERE id = $1 AND user_id = $2 \
              RETURNING {WORD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Word>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(&fields.word)
            .bind(&fields.definition)
            .bind(&fields.user_example)
            .bind(&fields.ai_example)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn update_definition(
        &self,
        user_id: i64,
        id: i64,
        definition: &str,
    ) -> AppResult<Option<Word>> {
        let sql = format!(
            "UPDATE vocabulary SET definition = $3, updated_at = now() \
              WHERE id = $1 AND user_id = $2 \
              RETURNING {WORD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Word>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(definition)
            .fetch_optional(&self.db)
            .await?;
        Ok(row)
    }

    async fn set_ai_example(&self, user_id: i64, id: i64, example: &str) -> AppResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE vocabulary
               SET ai_example = $3, updated_at = now()
             WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(example)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn delete(&self, user_id: i64, id: i64) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM vocabulary WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[cfg(test)]
pub(crate) use memory::MemoryVocabularyStore;
