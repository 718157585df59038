use std::path::PathBuf;

use thiserror::Error;

pub type AgentConfigResult<T, E = AgentConfigError> = Result<T, E>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type ClientResult<T> = Result<T, ClientError>;
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum AgentConfigError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Widget(#[from] WidgetError),

    #[error("invalid agent configuration: {0}")]
    Invalid(String),

    #[error("failed to encode agent configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool name cannot be empty")]
    EmptyName,

    #[error("agent tool must reference an agent id")]
    EmptyAgentReference,

    #[error("API call tool `{name}` requires a URL")]
    MissingUrl { name: String },

    #[error("API call tool `{name}` has an unsupported URL `{url}`")]
    InvalidUrl { name: String, url: String },

    #[error("parameters of `{name}` must be a JSON object schema")]
    InvalidParameters { name: String },

    #[error("invalid JSON in {field}: {message}")]
    InvalidTemplate { field: String, message: String },

    #[error("unsupported tool entry: {0}")]
    Unsupported(String),

    #[error("unknown tool type `{0}` (expected built-in, agent or api-call)")]
    UnknownKind(String),

    #[error("agent `{0}` does not exist")]
    UnknownAgent(String),

    #[error("agent `{0}` cannot use itself as a tool")]
    SelfReference(String),

    #[error("tool index {index} is out of range for agent `{agent_id}`")]
    IndexOutOfRange { agent_id: String, index: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("output type name cannot be empty")]
    EmptyName,

    #[error("output type root must be `object`, found `{0}`")]
    NotAnObject(String),

    #[error("property `{property}` has unsupported type `{kind}`")]
    UnknownPropertyType { property: String, kind: String },

    #[error("property `{property}` declares enum values but is not a string")]
    EnumOnNonString { property: String },

    #[error("required field `{0}` is not declared in properties")]
    RequiredNotDeclared(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("chatbot `{0}` not found")]
    NotFound(String),

    #[error("chatbot name cannot be empty")]
    EmptyName,

    #[error("I/O error while accessing {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed chatbot document {path:?}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown setting type `{0}` (expected appearance, rules, suggestions or agent)")]
    UnknownSetting(String),

    #[error("invalid `{setting}` settings: {source}")]
    InvalidSettings {
        setting: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid API base URL `{0}`")]
    InvalidBaseUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("failed to read {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("chatbot `{0}` not found")]
    UnknownChatbot(String),

    #[error("the agent configuration has not been saved yet; apply it before testing")]
    NotSaved,

    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("agent `{0}` does not exist")]
    UnknownAgent(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Debug, Error)]
pub enum WidgetError {
    #[error("failed to bind widget config endpoint on {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("a response is already pending")]
    Busy,

    #[error("widget config lookup failed: {0}")]
    Lookup(#[from] ClientError),
}
