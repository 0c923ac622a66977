use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Word {
    pub id: i64,
    pub user_id: i64,
    pub word: String,
    pub definition: String,
    pub user_example: Option<String>,
    pub ai_example: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Editable fields of a word, already normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordFields {
    pub word: String,
    pub definition: String,
    pub user_example: Option<String>,
    pub ai_example: Option<String>,
}
