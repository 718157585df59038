use std::sync::Arc;

use chatbot_agents::AgentSession;
use chatbot_agents::ChatbotStore;
use chatbot_agents::ClientError;
use chatbot_agents::ExecutionClient;
use chatbot_agents::MemoryChatbotStore;
use chatbot_agents::PhaseOutcome;
use chatbot_agents::SessionError;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;

async fn session_for(server: &MockServer) -> (Arc<MemoryChatbotStore>, AgentSession) {
    let store = Arc::new(MemoryChatbotStore::new());
    let document = store.create_chatbot("user-1", "Support").await.unwrap();
    let client = ExecutionClient::new(&server.uri()).unwrap();
    let session = AgentSession::load(store.clone(), client, &document.id).await.unwrap();
    (store, session)
}

#[tokio::test]
async fn save_stores_then_registers() {
    let server = MockServer::start().await;
    let (store, mut session) = session_for(&server).await;
    session.editor_mut().update_system_name("SupportSystem");

    let expected = json!({ "config": session.editor().config() });
    Mock::given(method("POST"))
        .and(path(format!("/api/chatbots/{}", session.chatbot_id())))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!session.editor().config_saved());
    let report = session.save().await;
    assert!(report.is_complete(), "{report:?}");
    assert_eq!(report.fingerprint, session.editor().config().fingerprint());
    assert!(session.editor().config_saved());
    assert!(!session.editor().has_unsaved_changes());

    let stored = store.get_chatbot(session.chatbot_id()).await.unwrap().unwrap();
    assert_eq!(stored.settings.agent.as_ref(), Some(session.editor().config()));
}

#[tokio::test]
async fn registration_failure_is_reported_as_partial_save() {
    let server = MockServer::start().await;
    let (store, mut session) = session_for(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "router missing"})))
        .mount(&server)
        .await;

    session.editor_mut().update_default_model("gpt-4o-mini");
    let report = session.save().await;
    assert_eq!(report.stored, PhaseOutcome::Completed);
    assert_eq!(
        report.registered,
        PhaseOutcome::Failed("API returned 422: router missing".to_string())
    );
    assert!(report.is_partial());
    assert!(!session.editor().config_saved());
    assert!(session.editor().has_unsaved_changes());

    let stored = store.get_chatbot(session.chatbot_id()).await.unwrap().unwrap();
    assert_eq!(stored.settings.agent.unwrap().default_model, "gpt-4o-mini");
}

#[tokio::test]
async fn store_failure_skips_registration() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryChatbotStore::new());
    let client = ExecutionClient::new(&server.uri()).unwrap();
    let mut session = AgentSession::new(store, client, "deleted", Default::default());

    let report = session.save().await;
    assert!(matches!(report.stored, PhaseOutcome::Failed(_)));
    assert_eq!(report.registered, PhaseOutcome::Skipped);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_requires_a_prior_save() {
    let server = MockServer::start().await;
    let (_store, mut session) = session_for(&server).await;
    assert!(matches!(session.test("hello").await, Err(SessionError::NotSaved)));

    Mock::given(method("POST"))
        .and(path(format!("/api/chatbots/{}", session.chatbot_id())))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/api/chatbots/{}/message", session.chatbot_id())))
        .and(body_json(json!({"message": "hello", "context": {}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "hi there",
            "iterations": [{"content": "hi there", "evaluation": {"score": "pass", "feedback": "good"}}]
        })))
        .mount(&server)
        .await;

    assert!(session.save().await.is_complete());
    assert!(matches!(session.test("  ").await, Err(SessionError::EmptyMessage)));
    let reply = session.test("hello").await.unwrap();
    assert_eq!(reply.response, "hi there");
    assert!(reply.iterations[0].passed("pass"));
}

#[tokio::test]
async fn test_surfaces_server_detail() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryChatbotStore::new());
    let document = store.create_chatbot("user-1", "Support").await.unwrap();
    store
        .update_chatbot_settings(
            &document.id,
            chatbot_agents::SettingType::Agent,
            serde_json::to_value(chatbot_agents::AgentConfig::default()).unwrap(),
        )
        .await
        .unwrap();
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Chatbot not registered"})))
        .mount(&server)
        .await;

    let client = ExecutionClient::new(&server.uri()).unwrap();
    let session = AgentSession::load(store, client, &document.id).await.unwrap();
    assert!(session.editor().config_saved());

    match session.test("hello").await {
        Err(SessionError::Client(ClientError::Status { status, detail })) => {
            assert_eq!(status, 404);
            assert_eq!(detail, "Chatbot not registered");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn upload_attaches_vector_store() {
    let server = MockServer::start().await;
    let (_store, mut session) = session_for(&server).await;
    Mock::given(method("POST"))
        .and(path(format!("/api/agents/{}/files", session.chatbot_id())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vector_store_id": "vs_42"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let file = dir.path().join("faq.md");
    std::fs::write(&file, "# FAQ").unwrap();

    assert!(matches!(
        session.upload_file("nobody", &file).await,
        Err(SessionError::UnknownAgent(_))
    ));
    let vector_store_id = session.upload_file("main_assistant", &file).await.unwrap();
    assert_eq!(vector_store_id, "vs_42");

    let tools = &session.editor().config().agents[0].tools;
    assert_eq!(tools, &vec![chatbot_agents::ToolDescriptor::file_search("vs_42")]);
    assert!(session.editor().has_unsaved_changes());
}

#[tokio::test]
async fn loading_unknown_chatbot_fails() {
    let store = Arc::new(MemoryChatbotStore::new());
    let client = ExecutionClient::new("http://127.0.0.1:9").unwrap();
    assert!(matches!(
        AgentSession::load(store, client, "missing").await,
        Err(SessionError::UnknownChatbot(_))
    ));
}
