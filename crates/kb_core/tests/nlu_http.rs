use std::time::Duration;

use kb_core::{
    AnswerResolver, ClassificationResult, IntentClassifier, JsonlKnowledgeStore, KbError,
    NewKnowledge, NluClassifier, ResolutionOutcome,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn classifier_for(server: &MockServer, timeout: Duration) -> NluClassifier {
    NluClassifier::new(format!("{}/model/parse", server.uri()), timeout).expect("client")
}

#[tokio::test]
async fn posts_text_and_reads_intent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/model/parse"))
        .and(body_json(json!({"text": "map usage?"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "map usage?",
            "intent": {"name": "map_usage", "confidence": 0.93},
            "entities": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = classifier_for(&server, Duration::from_secs(2))
        .classify("map usage?")
        .await;

    assert_eq!(result.intent, "map_usage");
    assert!((result.confidence - 0.93).abs() < 1e-6);
    assert!(result.succeeded);
}

#[tokio::test]
async fn error_status_is_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "intent": {"name": "map_usage", "confidence": 0.99}
        })))
        .mount(&server)
        .await;

    let result = classifier_for(&server, Duration::from_secs(2))
        .classify("map usage?")
        .await;
    assert_eq!(result, ClassificationResult::failure());
}

#[tokio::test]
async fn non_json_body_is_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("intent: map_usage"))
        .mount(&server)
        .await;

    let result = classifier_for(&server, Duration::from_secs(2))
        .classify("map usage?")
        .await;
    assert_eq!(result, ClassificationResult::failure());
}

#[tokio::test]
async fn malformed_json_is_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("{\"intent\": {", "application/json"),
        )
        .mount(&server)
        .await;

    let result = classifier_for(&server, Duration::from_secs(2))
        .classify("map usage?")
        .await;
    assert_eq!(result, ClassificationResult::failure());
}

#[tokio::test]
async fn missing_intent_name_is_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"intent": {"confidence": 0.9}})),
        )
        .mount(&server)
        .await;

    let result = classifier_for(&server, Duration::from_secs(2))
        .classify("map usage?")
        .await;
    assert_eq!(result, ClassificationResult::failure());
}

#[tokio::test]
async fn slow_classifier_times_out_to_low_confidence() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(800))
                .set_body_json(json!({"intent": {"name": "map_usage", "confidence": 0.93}})),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = JsonlKnowledgeStore::new(dir.path().join("kb.jsonl"));
    store
        .create(NewKnowledge::new("map_usage", "map?", "Move the map..."))
        .await
        .unwrap();

    let resolver = AnswerResolver::new(store, classifier_for(&server, Duration::from_millis(100)));
    let outcome = resolver.resolve("map usage?").await.unwrap();

    assert_eq!(
        outcome,
        ResolutionOutcome::LowConfidence {
            intent: "nlu_fallback".to_string(),
            confidence: 0.0,
        }
    );
}

#[tokio::test]
async fn resolves_against_jsonl_store() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/model/parse"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "intent": {"name": "map_usage", "confidence": 0.93}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = JsonlKnowledgeStore::new(dir.path().join("kb.jsonl"));
    store
        .create(NewKnowledge::new("map_usage", "How do I use the map?", "Move the map..."))
        .await
        .unwrap();

    let resolver = AnswerResolver::new(store, classifier_for(&server, Duration::from_secs(2)));
    let outcome = resolver.resolve("map usage?").await.unwrap();

    assert_eq!(
        outcome,
        ResolutionOutcome::Resolved {
            answer: "Move the map...".to_string(),
            intent: "map_usage".to_string(),
            confidence: 0.93,
        }
    );
}

#[tokio::test]
async fn missing_store_surfaces_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "intent": {"name": "map_usage", "confidence": 0.93}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = JsonlKnowledgeStore::new(dir.path().join("missing.jsonl"));
    let resolver = AnswerResolver::new(store, classifier_for(&server, Duration::from_secs(2)));

    let err = resolver.resolve("map usage?").await.unwrap_err();
    assert!(matches!(err, KbError::StoreUnavailable { .. }));
}
