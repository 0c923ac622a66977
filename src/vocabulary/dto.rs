use serde::{Deserialize, Serialize};

use super::repo_types::WordFields;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct WordRequest {
    pub word: Option<String>,
    pub definition: Option<String>,
    pub user_example: Option<String>,
    pub ai_example: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

impl WordRequest {
    /// `word` is required; a missing definition becomes `""` and empty
    /// examples become `None`.
    pub fn into_fields(self) -> AppResult<WordFields> {
        let word = non_empty(self.word).ok_or_else(|| AppError::missing("Word is required"))?;
        Ok(WordFields {
            word,
            definition: self.definition.unwrap_or_default(),
            user_example: non_empty(self.user_example),
            ai_example: non_empty(self.ai_example),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateDefinitionRequest {
    pub word: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DefinitionResponse {
    pub definition: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDefinitionRequest {
    pub definition: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateExampleRequest {
    pub word: Option<String>,
    pub definition: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiExampleResponse {
    pub ai_example: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
