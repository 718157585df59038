//! Multi-agent chatbot configuration: data model, editor, validation, persistence,
//! execution API client and the embeddable widget.

pub mod client;
pub mod editor;
mod error;
pub mod judge_loop;
pub mod model;
pub mod output_type;
pub mod session;
pub mod store;
pub mod tool;
mod validation;
pub mod widget;

pub use client::ExecutionClient;
pub use client::Iteration;
pub use client::TestReply;
pub use editor::AgentPatch;
pub use editor::ConfigEditor;
pub use editor::EditorAction;
pub use editor::ToolSlot;
pub use editor::reduce;
pub use error::AgentConfigError;
pub use error::AgentConfigResult;
pub use error::ClientError;
pub use error::ClientResult;
pub use error::SchemaError;
pub use error::SessionError;
pub use error::SessionResult;
pub use error::StoreError;
pub use error::StoreResult;
pub use error::ToolError;
pub use error::WidgetError;
pub use judge_loop::JudgeLoopSettings;
pub use model::AgentBuilder;
pub use model::AgentConfig;
pub use model::AgentDefinition;
pub use model::AttributeSpec;
pub use model::AttributeType;
pub use model::ContextClass;
pub use model::WorkflowType;
pub use output_type::OutputTypeSchema;
pub use output_type::PropertySchema;
pub use session::AgentSession;
pub use session::PhaseOutcome;
pub use session::SaveReport;
pub use store::ChatbotDocument;
pub use store::ChatbotStore;
pub use store::FileChatbotStore;
pub use store::MemoryChatbotStore;
pub use store::SettingType;
pub use tool::ApiCallTool;
pub use tool::HttpMethod;
pub use tool::ToolDescriptor;
pub use tool::ToolKind;
pub use validation::ConfigValidator;
pub use validation::ValidationReport;
