/// Marker the prompt ends with; the reply is whatever follows its last occurrence.
pub const ANSWER_MARKER: &str = "Answer:";

pub fn build_prompt(message: &str) -> String {
    format!(
        "
You are PlantBuddy, a friendly and knowledgeable plant assistant.
Answer the user's question clearly and concisely in a warm, approachable, and conversational style.

Question: {message}
{ANSWER_MARKER}"
    )
}

/// Text after the last `Answer:` in `decoded`, trimmed.
///
/// Without a marker the whole decoded text is returned, so a model that never
/// emits one echoes its input back to the user.
pub fn extract_reply(decoded: &str) -> &str {
    decoded
        .rsplit_once(ANSWER_MARKER)
        .map_or(decoded, |(_, after)| after)
        .trim()
}
