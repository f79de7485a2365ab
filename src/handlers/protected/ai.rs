use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;

use crate::error::ApiError;
use crate::middleware::{Actor, ApiResponse, ApiResult};
use crate::services::{ChatCompletion, ChatMessage, ChatRequest};
use crate::state::AppState;

const MAX_PROMPT_CHARS: usize = 32_000;

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub model: Option<String>,
}

/// POST /api/ai/complete - Ad-hoc text generation through the LLM gateway
///
/// Body: `{ "prompt": "...", "system": "...", "model": "..." }`; only `prompt` is required.
pub async fn complete(
    State(state): State<AppState>,
    actor: Actor,
    payload: Result<Json<CompleteRequest>, JsonRejection>,
) -> ApiResult<ChatCompletion> {
    state.rate_limiter.enforce(&actor)?;
    let Json(request) = payload?;

    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(ApiError::field_error("prompt", "is required"));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(ApiError::field_error(
            "prompt",
            format!("must be at most {} characters", MAX_PROMPT_CHARS),
        ));
    }

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = request.system.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));

    let completion = state
        .llm
        .chat_completion(ChatRequest {
            model: request.model.filter(|m| !m.trim().is_empty()),
            messages,
            ..Default::default()
        })
        .await?;

    Ok(ApiResponse::success(completion))
}
