use chatbot_agents::AgentConfig;
use chatbot_agents::ChatbotStore;
use chatbot_agents::FileChatbotStore;
use chatbot_agents::MemoryChatbotStore;
use chatbot_agents::SettingType;
use chatbot_agents::StoreError;
use chatbot_agents::store::ChatbotPatch;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

async fn exercise_store(store: &dyn ChatbotStore) {
    let first = store.create_chatbot("user-1", "Support").await.unwrap();
    let second = store.create_chatbot("user-1", "Sales").await.unwrap();
    store.create_chatbot("user-2", "Other").await.unwrap();

    assert!(matches!(
        store.create_chatbot("user-1", "   ").await,
        Err(StoreError::EmptyName)
    ));

    let mut config = AgentConfig::default();
    config.system_name = "SupportSystem".to_string();
    store
        .update_chatbot_settings(&first.id, SettingType::Agent, serde_json::to_value(&config).unwrap())
        .await
        .unwrap();

    let loaded = store.get_chatbot(&first.id).await.unwrap().unwrap();
    assert_eq!(loaded.settings.agent, Some(config));
    assert!(loaded.updated_at >= loaded.created_at);

    let listed = store.get_user_chatbots("user-1").await.unwrap();
    let ids: Vec<&str> = listed.iter().map(|doc| doc.id.as_str()).collect();
    assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

    store
        .update_chatbot(
            &second.id,
            ChatbotPatch {
                name: Some("Sales Desk".to_string()),
                settings: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        store.get_chatbot(&second.id).await.unwrap().unwrap().name,
        "Sales Desk"
    );

    let err = store
        .update_chatbot_settings(&second.id, SettingType::Agent, json!({"agents": "nope"}))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidSettings { .. }), "{err}");

    store.delete_chatbot(&first.id).await.unwrap();
    assert_eq!(store.get_chatbot(&first.id).await.unwrap(), None);
    assert!(matches!(
        store.delete_chatbot(&first.id).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.update_chatbot("missing", ChatbotPatch::default()).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn memory_store_contract() {
    exercise_store(&MemoryChatbotStore::new()).await;
}

#[tokio::test]
async fn file_store_contract() {
    let dir = tempdir().unwrap();
    exercise_store(&FileChatbotStore::new(dir.path().join("chatbots"))).await;
}

#[tokio::test]
async fn file_store_survives_reopen_and_skips_garbage() {
    let dir = tempdir().unwrap();
    let store = FileChatbotStore::new(dir.path());
    let document = store.create_chatbot("user-1", "Support").await.unwrap();
    std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let reopened = FileChatbotStore::new(dir.path());
    let listed = reopened.get_user_chatbots("user-1").await.unwrap();
    assert_eq!(listed, vec![document.clone()]);
    assert!(!dir.path().join(format!("{}.json.tmp", document.id)).exists());
}

#[tokio::test]
async fn file_store_rejects_path_like_ids() {
    let dir = tempdir().unwrap();
    let store = FileChatbotStore::new(dir.path());
    assert_eq!(store.get_chatbot("../etc/passwd").await.unwrap(), None);
    assert!(matches!(
        store.delete_chatbot("../x").await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn listing_missing_directory_is_empty() {
    let dir = tempdir().unwrap();
    let store = FileChatbotStore::new(dir.path().join("absent"));
    assert!(store.get_user_chatbots("anyone").await.unwrap().is_empty());
}
