use async_trait::async_trait;
use plantbuddy_rust::{
    Error, Result,
    llm::{GenerationParams, TextGenerator},
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
enum SpyOutput {
    /// Return this text verbatim.
    Fixed(String),
    /// Return the prompt followed by the question it contains, like a model
    /// that repeats the question as its answer.
    EchoQuestion,
    /// Fail with a generation error carrying this message.
    Fail(String),
}

/// Spy text generator recording every call
#[derive(Debug)]
pub struct SpyGenerator {
    output: SpyOutput,
    delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<(String, GenerationParams)>>>,
}

impl SpyGenerator {
    fn with_output(output: SpyOutput) -> Self {
        Self {
            output,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fixed(text: impl Into<String>) -> Self {
        Self::with_output(SpyOutput::Fixed(text.into()))
    }

    pub fn echo_question() -> Self {
        Self::with_output(SpyOutput::EchoQuestion)
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self::with_output(SpyOutput::Fail(error.into()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, GenerationParams)> {
        self.calls.lock().unwrap().clone()
    }
}

fn question_in(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Question: "))
        .unwrap_or_default()
}

#[async_trait]
impl TextGenerator for SpyGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), params.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.output {
            SpyOutput::Fixed(text) => Ok(text.clone()),
            SpyOutput::EchoQuestion => Ok(format!("{} {}", prompt, question_in(prompt))),
            SpyOutput::Fail(error) => Err(Error::generation(error.clone())),
        }
    }
}
