use std::net::SocketAddr;

use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

use super::DEFAULT_WIDGET_VERSION;
use super::WIDGET_CONFIG_PATH;
use crate::client::DEFAULT_API_URL;
use crate::error::WidgetError;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetConfigResponse {
    pub chatbot_id: String,
    pub api_url: String,
    pub version: String,
}

/// What the endpoint advertises to every widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetEndpointSettings {
    pub api_url: String,
    pub version: String,
}

impl Default for WidgetEndpointSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            version: DEFAULT_WIDGET_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl EndpointResponse {
    fn new(status: u16, body: Option<String>) -> Self {
        let mut headers: Vec<(String, String)> = CORS_HEADERS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        Self { status, headers, body }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::new(status, Some(json!({ "error": message }).to_string()))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Answers one request to the widget-config route. `url` is the request
/// target as received, path plus optional query.
pub fn handle_widget_config(method: &str, url: &str, settings: &WidgetEndpointSettings) -> EndpointResponse {
    let parsed = Url::parse("http://localhost").and_then(|base| base.join(url));
    let Ok(parsed) = parsed else {
        return EndpointResponse::error(400, "Malformed request URL");
    };
    if parsed.path().trim_end_matches('/') != WIDGET_CONFIG_PATH {
        return EndpointResponse::error(404, "Not found");
    }

    match method.to_ascii_uppercase().as_str() {
        "OPTIONS" => EndpointResponse::new(204, None),
        "GET" => {
            let chatbot_id = parsed
                .query_pairs()
                .find(|(key, _)| key == "chatbotId")
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty());
            let Some(chatbot_id) = chatbot_id else {
                return EndpointResponse::error(400, "Missing chatbotId parameter");
            };
            let body = WidgetConfigResponse {
                chatbot_id,
                api_url: settings.api_url.clone(),
                version: settings.version.clone(),
            };
            match serde_json::to_string(&body) {
                Ok(body) => EndpointResponse::new(200, Some(body)),
                Err(err) => EndpointResponse::error(500, &err.to_string()),
            }
        }
        _ => EndpointResponse::error(405, "Method not allowed"),
    }
}

/// Blocking HTTP server for the widget-config route.
pub struct WidgetConfigServer {
    server: Server,
    settings: WidgetEndpointSettings,
}

impl WidgetConfigServer {
    pub fn bind(addr: &str, settings: WidgetEndpointSettings) -> Result<Self, WidgetError> {
        let server = Server::http(addr).map_err(|err| WidgetError::Bind {
            addr: addr.to_string(),
            message: err.to_string(),
        })?;
        Ok(Self { server, settings })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Serves requests until the listener shuts down.
    pub fn run(self) {
        if let Some(addr) = self.local_addr() {
            info!(%addr, "widget config endpoint listening");
        }
        for request in self.server.incoming_requests() {
            let reply = handle_widget_config(request.method().as_str(), request.url(), &self.settings);
            debug!(method = %request.method(), url = request.url(), status = reply.status, "widget config request");

            let mut response =
                Response::from_string(reply.body.clone().unwrap_or_default()).with_status_code(reply.status);
            for (name, value) in &reply.headers {
                match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                    Ok(header) => response.add_header(header),
                    Err(()) => warn!(header = %name, "skipping invalid response header"),
                }
            }
            if let Err(err) = request.respond(response) {
                warn!("failed to write widget config response: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn settings() -> WidgetEndpointSettings {
        WidgetEndpointSettings {
            api_url: "https://exec.example.com".to_string(),
            version: "2.1.0".to_string(),
        }
    }

    #[test]
    fn get_returns_camel_case_config() {
        let reply = handle_widget_config("GET", "/api/widget-config?chatbotId=bot-1", &settings());
        assert_eq!(reply.status, 200);
        let body: Value = serde_json::from_str(reply.body.as_deref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"chatbotId": "bot-1", "apiUrl": "https://exec.example.com", "version": "2.1.0"})
        );
        assert_eq!(reply.header("access-control-allow-origin"), Some("*"));
    }

    #[test]
    fn missing_chatbot_id_is_bad_request() {
        for url in ["/api/widget-config", "/api/widget-config?chatbotId=", "/api/widget-config?other=1"] {
            let reply = handle_widget_config("GET", url, &settings());
            assert_eq!(reply.status, 400, "{url}");
            assert_eq!(reply.body.as_deref(), Some(r#"{"error":"Missing chatbotId parameter"}"#));
        }
    }

    #[test]
    fn preflight_and_other_methods() {
        let reply = handle_widget_config("OPTIONS", "/api/widget-config", &settings());
        assert_eq!(reply.status, 204);
        assert_eq!(reply.body, None);
        assert_eq!(reply.header("Access-Control-Allow-Methods"), Some("GET, OPTIONS"));
        assert_eq!(reply.header("Access-Control-Allow-Headers"), Some("Content-Type"));

        let reply = handle_widget_config("POST", "/api/widget-config?chatbotId=x", &settings());
        assert_eq!(reply.status, 405);
        assert_eq!(reply.header("Access-Control-Allow-Origin"), Some("*"));
    }

    #[test]
    fn unknown_path_is_not_found() {
        let reply = handle_widget_config("GET", "/api/other?chatbotId=x", &settings());
        assert_eq!(reply.status, 404);
        assert_eq!(reply.header("Access-Control-Allow-Origin"), Some("*"));
    }

    #[test]
    fn query_values_are_decoded() {
        let reply = handle_widget_config("GET", "/api/widget-config?chatbotId=a%20b", &settings());
        let body: WidgetConfigResponse = serde_json::from_str(reply.body.as_deref().unwrap()).unwrap();
        assert_eq!(body.chatbot_id, "a b");
    }
}
