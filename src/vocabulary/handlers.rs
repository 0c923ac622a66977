use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{
    AiExampleResponse, DefinitionResponse, GenerateDefinitionRequest, GenerateExampleRequest,
    MessageResponse, UpdateDefinitionRequest, WordRequest,
};
use super::repo_types::Word;
use crate::{
    auth::extractors::AuthUser,
    error::{AppError, AppResult},
    extract::JsonBody,
    state::AppState,
};

const NOT_FOUND: &str = "Word not found or unauthorized";

pub fn vocabulary_routes() -> Router<AppState> {
    Router::new()
        .route("/vocabulary", get(list_words).post(add_word))
        .route("/vocabulary/:id", put(update_word).delete(delete_word))
        .route("/vocabulary/generate-definition", post(generate_definition))
        .route("/vocabulary/:id/definition", put(update_definition))
        .route("/vocabulary/:id/generate-example", post(generate_example))
}

fn not_found() -> AppError {
    AppError::NotFound(NOT_FOUND.into())
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn list_words(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<Word>>> {
    Ok(Json(state.vocabulary.list(user.id).await?))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn add_word(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(body): JsonBody<WordRequest>,
) -> AppResult<(StatusCode, Json<Word>)> {
    let fields = body.into_fields()?;
    let word = state.vocabulary.create(user.id, &fields).await?;
    info!(word_id = word.id, "word added");
    Ok((StatusCode::CREATED, Json(word)))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_word(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<WordRequest>,
) -> AppResult<Json<Word>> {
    let fields = body.into_fields()?;
    let word = state
        .vocabulary
        .update(user.id, id, &fields)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(word))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn delete_word(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    if !state.vocabulary.delete(user.id, id).await? {
        return Err(not_found());
    }
    Ok(Json(MessageResponse {
        message: "Word deleted successfully",
    }))
}

#[instrument(skip_all)]
pub async fn generate_definition(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    JsonBody(body): JsonBody<GenerateDefinitionRequest>,
) -> AppResult<Json<DefinitionResponse>> {
    let word = body
        .word
        .filter(|w| !w.is_empty())
        .ok_or_else(|| AppError::missing("Word is required"))?;
    let definition = state.generator.generate_definition(&word).await?;
    Ok(Json(DefinitionResponse { definition }))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_definition(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<UpdateDefinitionRequest>,
) -> AppResult<Json<Word>> {
    let definition = body
        .definition
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::missing("Definition is required"))?;
    let word = state
        .vocabulary
        .update_definition(user.id, id, &definition)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(word))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn generate_example(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    JsonBody(body): JsonBody<GenerateExampleRequest>,
) -> AppResult<Json<AiExampleResponse>> {
    let (Some(word), Some(definition)) = (
        body.word.filter(|w| !w.is_empty()),
        body.definition.filter(|d| !d.is_empty()),
    ) else {
        return Err(AppError::missing("Word and definition are required"));
    };

    let ai_example = state.generator.generate_example(&word, &definition).await?;
    if !state.vocabulary.set_ai_example(user.id, id, &ai_example).await? {
        return Err(AppError::NotFound("Word not found".into()));
    }
    Ok(Json(AiExampleResponse { ai_example }))
}
