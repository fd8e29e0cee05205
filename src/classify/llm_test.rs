use super::*;

fn completion(content: &str) -> String {
    serde_json::json!({
        "model": "llama3.2",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

#[test]
fn parses_content_of_first_choice() {
    assert_eq!(parse_chat_completions_content(&completion("food")).unwrap(), "food");
}

#[test]
fn missing_choices_is_parse_error() {
    let json = serde_json::json!({ "choices": [] }).to_string();
    assert!(matches!(parse_chat_completions_content(&json), Err(ClassifyError::Parse(_))));
    assert!(matches!(parse_chat_completions_content("not json"), Err(ClassifyError::Parse(_))));
}

#[test]
fn null_content_reads_as_empty() {
    let json = serde_json::json!({ "choices": [{ "message": { "content": null } }] }).to_string();
    assert_eq!(parse_chat_completions_content(&json).unwrap(), "");
}

#[test]
fn category_reply_tolerates_noise() {
    assert_eq!(parse_category_reply("food"), Some(Category::Food));
    assert_eq!(parse_category_reply("  Location.\n"), Some(Category::Location));
    assert_eq!(parse_category_reply("Category: activity"), Some(Category::Activity));
    assert_eq!(parse_category_reply("\"time\""), Some(Category::Time));
}

#[test]
fn category_reply_without_category_is_none() {
    assert_eq!(parse_category_reply(""), None);
    assert_eq!(parse_category_reply("I am not sure"), None);
}

#[test]
fn request_body_shape() {
    let messages = [CcMessage { role: "system", content: "s" }, CcMessage { role: "user", content: "brunch" }];
    let body = CcRequest { model: "llama3.2", max_tokens: MAX_TOKENS, temperature: 0.0, messages: &messages };
    let json = serde_json::to_value(&body).unwrap();
    assert_eq!(json["model"], "llama3.2");
    assert_eq!(json["messages"][1]["role"], "user");
    assert_eq!(json["messages"][1]["content"], "brunch");
}

#[test]
fn new_trims_trailing_slash() {
    let config = ClassifierConfig {
        base_url: "http://localhost:11434/v1/".into(),
        model: DEFAULT_CLASSIFIER_MODEL.into(),
        api_key: None,
        timeout: Duration::from_secs(DEFAULT_CLASSIFIER_TIMEOUT_SECS),
    };
    let classifier = LlmClassifier::new(&config).unwrap();
    assert_eq!(classifier.base_url, "http://localhost:11434/v1");
}

#[tokio::test]
async fn unreachable_endpoint_is_request_error() {
    let config = ClassifierConfig {
        // Port 9 (discard) on loopback: nothing listens in test environments.
        base_url: "http://127.0.0.1:9".into(),
        model: DEFAULT_CLASSIFIER_MODEL.into(),
        api_key: None,
        timeout: Duration::from_secs(2),
    };
    let classifier = LlmClassifier::new(&config).unwrap();
    let err = classifier.classify("brunch").await.unwrap_err();
    assert!(matches!(err, ClassifyError::Request(_)));
}
