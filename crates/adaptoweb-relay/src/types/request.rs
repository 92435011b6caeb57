//! Relay request parameter and result types.

use serde::{Deserialize, Serialize};

use adaptoweb::{EventKind, ModuleChange, ModuleKind, Settings, SettingsPatch, StatusSummary};

/// Method name of the settings broadcast notification.
pub const SETTINGS_UPDATED: &str = "settingsUpdated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettingsParams {
    pub settings: SettingsPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleModuleParams {
    pub module: ModuleKind,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPageParams {
    pub html: String,
    #[serde(default)]
    pub page_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub page_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendHtmlParams {
    pub page_id: String,
    pub html: String,
    /// Parent element, `body` when absent.
    #[serde(default)]
    pub selector: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEventParams {
    pub page_id: String,
    pub selector: String,
    /// Which match of `selector` receives the event.
    #[serde(default)]
    pub index: usize,
    pub event: EventKind,
    /// Field value for `input` events.
    #[serde(default)]
    pub value: Option<String>,
}

/// Payload of the `settingsUpdated` notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsUpdatedParams {
    pub settings: Settings,
}

/// Result of a settings change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsChangeResult {
    pub success: bool,
    pub settings: Settings,
}

/// Result of `getStatus`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    #[serde(flatten)]
    pub summary: StatusSummary,
    pub open_pages: usize,
}

/// Result of `openPage`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPageResult {
    pub page_id: String,
    pub changes: Vec<ModuleChange>,
}

/// Result of `renderPage`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPageResult {
    pub page_id: String,
    pub html: String,
    pub opened_at: chrono::DateTime<chrono::Utc>,
    pub reapply_count: usize,
}

/// Result of `appendHtml`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendHtmlResult {
    pub inserted: usize,
    /// Whether a debounced re-application is pending.
    pub scheduled: bool,
}

/// Result of `dispatchEvent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEventResult {
    pub handled: usize,
}
