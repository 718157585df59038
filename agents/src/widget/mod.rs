//! The embeddable chat widget: its config-lookup endpoint and its runtime.

mod config_endpoint;
mod runtime;

pub use config_endpoint::EndpointResponse;
pub use config_endpoint::WidgetConfigResponse;
pub use config_endpoint::WidgetConfigServer;
pub use config_endpoint::WidgetEndpointSettings;
pub use config_endpoint::handle_widget_config;
pub use runtime::FALLBACK_ERROR;
pub use runtime::PanelState;
pub use runtime::Phase;
pub use runtime::Sender;
pub use runtime::TranscriptEntry;
pub use runtime::WidgetRuntime;
pub use runtime::fetch_widget_config;

pub const WIDGET_CONFIG_PATH: &str = "/api/widget-config";
pub const DEFAULT_WIDGET_VERSION: &str = "1.0.0";
pub const DEFAULT_BIND: &str = "127.0.0.1:3001";
