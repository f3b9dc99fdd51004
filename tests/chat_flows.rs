use axum::http::StatusCode;
use axum_test::TestServer;
use plantbuddy_rust::chat::{EMPTY_MESSAGE_REPLY, build_prompt};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

mod common;

use common::{mocks::SpyGenerator, test_utils::create_test_app};

fn test_server(spy: Arc<SpyGenerator>) -> TestServer {
    TestServer::new(create_test_app(spy)).unwrap()
}

#[test_log::test(tokio::test)]
async fn test_reply_after_echoed_prompt() {
    let prompt = build_prompt("Why are my pothos leaves curling?");
    let spy = Arc::new(SpyGenerator::fixed(format!(
        "{} Curling usually means thirst. Water when the top inch is dry.",
        prompt
    )));
    let server = test_server(spy.clone());

    let response = server
        .post("/chat")
        .json(&json!({ "message": "Why are my pothos leaves curling?" }))
        .await;

    response.assert_status_ok();
    response.assert_json(&json!({
        "reply": "Curling usually means thirst. Water when the top inch is dry."
    }));
    assert_eq!(spy.calls()[0].0, prompt);
}

#[test_log::test(tokio::test)]
async fn test_preamble_is_stripped() {
    let spy = Arc::new(SpyGenerator::fixed("...preamble... Answer: The answer is 42."));
    let server = test_server(spy);

    let response = server
        .post("/chat")
        .json(&json!({ "message": "What is the answer?" }))
        .await;

    response.assert_json(&json!({ "reply": "The answer is 42." }));
}

#[test_log::test(tokio::test)]
async fn test_whitespace_message_matches_empty_message() {
    let spy = Arc::new(SpyGenerator::fixed("Answer: unused"));
    let server = test_server(spy.clone());

    let blank = server.post("/chat").json(&json!({ "message": "  " })).await;
    let empty = server.post("/chat").json(&json!({ "message": "" })).await;

    blank.assert_status_ok();
    empty.assert_status_ok();
    assert_eq!(
        blank.json::<serde_json::Value>(),
        empty.json::<serde_json::Value>()
    );
    blank.assert_json(&json!({ "reply": EMPTY_MESSAGE_REPLY }));
    assert_eq!(spy.call_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_each_request_is_independent() {
    let spy = Arc::new(SpyGenerator::echo_question());
    let server = test_server(spy.clone());

    for question in ["Is basil edible?", "Do ferns like sun?"] {
        server
            .post("/chat")
            .json(&json!({ "message": question }))
            .await
            .assert_json(&json!({ "reply": question }));
    }

    let prompts: Vec<String> = spy.calls().into_iter().map(|(prompt, _)| prompt).collect();
    assert_eq!(prompts.len(), 2);
    assert!(!prompts[1].contains("Is basil edible?"));
}

#[test_log::test(tokio::test)]
async fn test_failure_hides_internal_details() {
    let spy = Arc::new(SpyGenerator::failing("tensor shape mismatch [1, 32] vs [1, 64]"));
    let server = test_server(spy);

    let response = server
        .post("/chat")
        .json(&json!({ "message": "hello" }))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.text().contains("tensor shape"));
}
