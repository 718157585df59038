use chatbot_agents::widget::FALLBACK_ERROR;
use chatbot_agents::widget::PanelState;
use chatbot_agents::widget::Phase;
use chatbot_agents::widget::Sender;
use chatbot_agents::widget::WidgetConfigResponse;
use chatbot_agents::widget::WidgetConfigServer;
use chatbot_agents::widget::WidgetEndpointSettings;
use chatbot_agents::widget::WidgetRuntime;
use chatbot_agents::widget::fetch_widget_config;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

async fn mount_config(config_server: &MockServer, api_url: &str) {
    Mock::given(method("GET"))
        .and(path("/api/widget-config"))
        .and(query_param("chatbotId", "bot-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chatbotId": "bot-1",
            "apiUrl": api_url,
            "version": "1.0.0"
        })))
        .expect(1)
        .mount(config_server)
        .await;
}

#[tokio::test]
async fn resolves_api_once_and_posts_messages() {
    let config_server = MockServer::start().await;
    let api_server = MockServer::start().await;
    mount_config(&config_server, &api_server.uri()).await;
    Mock::given(method("POST"))
        .and(path("/api/message"))
        .and(body_json(json!({"agent_id": "bot-1", "message": "hello", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "Hi!"})))
        .expect(2)
        .mount(&api_server)
        .await;

    let mut runtime = WidgetRuntime::new("bot-1", format!("{}/api/widget-config", config_server.uri()));
    let reply = runtime.send("hello").await.unwrap().unwrap();
    assert_eq!(reply.sender, Sender::Bot);
    assert_eq!(reply.text, "Hi!");
    assert_eq!(runtime.panel(), PanelState::Open);
    assert_eq!(runtime.phase(), Phase::Idle);

    runtime.send("hello").await.unwrap();
    assert_eq!(runtime.transcript().len(), 4);
    assert_eq!(runtime.send("").await.unwrap(), None);
}

#[tokio::test]
async fn failed_request_shows_fallback() {
    let config_server = MockServer::start().await;
    let api_server = MockServer::start().await;
    mount_config(&config_server, &api_server.uri()).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&api_server)
        .await;

    let mut runtime = WidgetRuntime::new("bot-1", format!("{}/api/widget-config", config_server.uri()));
    let reply = runtime.send("hello").await.unwrap().unwrap();
    assert_eq!(reply.text, FALLBACK_ERROR);
    assert_eq!(runtime.phase(), Phase::Idle);
}

#[tokio::test]
async fn failed_lookup_shows_fallback() {
    let config_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Missing chatbotId parameter"})))
        .mount(&config_server)
        .await;

    let mut runtime = WidgetRuntime::new("bot-1", format!("{}/api/widget-config", config_server.uri()));
    let reply = runtime.send("hello").await.unwrap().unwrap();
    assert_eq!(reply.text, FALLBACK_ERROR);
}

#[tokio::test]
async fn served_endpoint_answers_lookups() {
    let server = WidgetConfigServer::bind(
        "127.0.0.1:0",
        WidgetEndpointSettings {
            api_url: "https://exec.example.com".to_string(),
            version: "1.2.3".to_string(),
        },
    )
    .unwrap();
    let addr = server.local_addr().unwrap();
    std::thread::spawn(move || server.run());

    let config_url = format!("http://{addr}/api/widget-config");
    let config = fetch_widget_config(&config_url, "bot-9").await.unwrap();
    assert_eq!(
        config,
        WidgetConfigResponse {
            chatbot_id: "bot-9".to_string(),
            api_url: "https://exec.example.com".to_string(),
            version: "1.2.3".to_string(),
        }
    );

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, &config_url)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
}
