use super::types::{ChatRequest, ChatResponse, ErrorResponse};
use crate::{
    chat::ChatService,
    llm::{GenerationParams, TextGenerator},
};
use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Body of every 500 response; the underlying error stays in the logs.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>, params: GenerationParams) -> Self {
        Self {
            chat: Arc::new(ChatService::new(generator, params)),
        }
    }
}

pub async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let request_id = Uuid::new_v4();
    let request = ChatRequest::from_body(&body);

    info!(%request_id, "Received chat request");
    debug!(%request_id, "Message: {:?}", request.message);

    match state.chat.reply(request.message.as_deref()).await {
        Ok(reply) => {
            info!(%request_id, "Reply ready ({} chars)", reply.len());
            Ok(Json(ChatResponse { reply }))
        }
        Err(e) => {
            error!(%request_id, "Failed to generate reply: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: INTERNAL_ERROR_MESSAGE.to_string(),
                }),
            ))
        }
    }
}
