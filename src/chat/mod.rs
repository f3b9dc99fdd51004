mod prompt;

pub use prompt::*;

use crate::{
    Result,
    llm::{GenerationParams, TextGenerator},
};
use std::sync::Arc;
use tracing::debug;

/// Reply sent when the request carries no usable message.
pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a message.";

/// Strips Unicode whitespace and the ASCII information separators
/// (U+001C..=U+001F) from both ends.
pub fn trim_message(message: &str) -> &str {
    message.trim_matches(|c: char| c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c))
}

/// Single-turn question answering over a shared text generator.
pub struct ChatService {
    generator: Arc<dyn TextGenerator>,
    params: GenerationParams,
}

impl ChatService {
    pub fn new(generator: Arc<dyn TextGenerator>, params: GenerationParams) -> Self {
        Self { generator, params }
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub async fn reply(&self, message: Option<&str>) -> Result<String> {
        let Some(question) = message.map(trim_message).filter(|m| !m.is_empty()) else {
            debug!("Empty message, skipping generation");
            return Ok(EMPTY_MESSAGE_REPLY.to_string());
        };

        let prompt = build_prompt(question);
        let decoded = self.generator.generate(&prompt, &self.params).await?;

        Ok(extract_reply(&decoded).to_string())
    }
}
