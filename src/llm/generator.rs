use super::GenerationParams;
use crate::Result;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Text-generation capability behind the chat endpoint.
///
/// Implementations return the decoded text of the whole sequence, prompt
/// included, with special tokens removed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}
