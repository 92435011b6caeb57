//! Main request dispatcher: receives JSON-RPC messages, routes to handlers.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use adaptoweb::Settings;

use crate::pages::{make_event, PageRegistry};
use crate::store::SettingsStore;
use crate::types::*;

use super::validator::validate_request;

/// The main protocol handler that dispatches incoming JSON-RPC messages.
pub struct ProtocolHandler {
    store: Arc<Mutex<SettingsStore>>,
    pages: Arc<Mutex<PageRegistry>>,
    notifier: Option<mpsc::UnboundedSender<JsonRpcNotification>>,
}

impl ProtocolHandler {
    pub fn new(store: Arc<Mutex<SettingsStore>>) -> Self {
        Self {
            store,
            pages: Arc::new(Mutex::new(PageRegistry::new())),
            notifier: None,
        }
    }

    /// Push `settingsUpdated` notifications into `sender` after every broadcast.
    pub fn with_notifier(mut self, sender: mpsc::UnboundedSender<JsonRpcNotification>) -> Self {
        self.notifier = Some(sender);
        self
    }

    pub fn pages(&self) -> Arc<Mutex<PageRegistry>> {
        Arc::clone(&self.pages)
    }

    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req).await),
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
        }
    }

    /// Earliest pending page re-application.
    pub async fn next_deadline(&self) -> Option<Instant> {
        self.pages.lock().await.next_deadline()
    }

    /// Run the page re-applications that are due.
    pub async fn tick(&self, now: Instant) -> usize {
        self.pages.lock().await.tick(now)
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> Value {
        if let Err(e) = validate_request(&request) {
            return serde_json::to_value(e.to_json_rpc_error(request.id)).unwrap_or_default();
        }

        let id = request.id.clone();
        let result = self.dispatch_request(&request).await;

        match result {
            Ok(value) => serde_json::to_value(JsonRpcResponse::new(id, value)).unwrap_or_default(),
            Err(e) => {
                tracing::debug!("Request {id} ({}) failed: {e}", request.method);
                serde_json::to_value(e.to_json_rpc_error(id)).unwrap_or_default()
            }
        }
    }

    async fn dispatch_request(&self, request: &JsonRpcRequest) -> RelayResult<Value> {
        match request.method.as_str() {
            "getSettings" => self.handle_get_settings().await,
            "updateSettings" => self.handle_update_settings(request.params.clone()).await,
            "toggleModule" => self.handle_toggle_module(request.params.clone()).await,
            "toggleExtension" => self.handle_toggle_extension().await,
            "getStatus" => self.handle_get_status().await,

            "openPage" => self.handle_open_page(request.params.clone()).await,
            "closePage" => self.handle_close_page(request.params.clone()).await,
            "renderPage" => self.handle_render_page(request.params.clone()).await,
            "appendHtml" => self.handle_append_html(request.params.clone()).await,
            "dispatchEvent" => self.handle_dispatch_event(request.params.clone()).await,

            "ping" => Ok(Value::Object(serde_json::Map::new())),

            _ => Err(RelayError::MethodNotFound(request.method.clone())),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "exit" => {
                tracing::info!("Client signalled exit");
            }
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    async fn handle_get_settings(&self) -> RelayResult<Value> {
        let store = self.store.lock().await;
        to_result(store.settings())
    }

    async fn handle_update_settings(&self, params: Option<Value>) -> RelayResult<Value> {
        let params: UpdateSettingsParams = required(params, "Update settings params required")?;
        let settings = self.store.lock().await.update(&params.settings);
        self.broadcast(&settings).await;
        to_result(SettingsChangeResult {
            success: true,
            settings,
        })
    }

    async fn handle_toggle_module(&self, params: Option<Value>) -> RelayResult<Value> {
        let params: ToggleModuleParams = required(params, "Toggle module params required")?;
        let settings = self
            .store
            .lock()
            .await
            .toggle_module(params.module, params.enabled);
        self.broadcast(&settings).await;
        to_result(SettingsChangeResult {
            success: true,
            settings,
        })
    }

    async fn handle_toggle_extension(&self) -> RelayResult<Value> {
        let settings = self.store.lock().await.toggle_enabled();
        tracing::info!("Extension {}", if settings.enabled { "enabled" } else { "disabled" });
        self.broadcast(&settings).await;
        to_result(SettingsChangeResult {
            success: true,
            settings,
        })
    }

    async fn handle_get_status(&self) -> RelayResult<Value> {
        let summary = self.store.lock().await.settings().status();
        let open_pages = self.pages.lock().await.len();
        to_result(StatusResult {
            summary,
            open_pages,
        })
    }

    async fn handle_open_page(&self, params: Option<Value>) -> RelayResult<Value> {
        let params: OpenPageParams = required(params, "Open page params required")?;
        let settings = self.store.lock().await.settings().clone();
        let (page_id, changes) = self
            .pages
            .lock()
            .await
            .open(params.page_id, &params.html, &settings)?;
        to_result(OpenPageResult { page_id, changes })
    }

    async fn handle_close_page(&self, params: Option<Value>) -> RelayResult<Value> {
        let params: PageParams = required(params, "Close page params required")?;
        self.pages.lock().await.close(&params.page_id)?;
        Ok(Value::Object(serde_json::Map::new()))
    }

    async fn handle_render_page(&self, params: Option<Value>) -> RelayResult<Value> {
        let params: PageParams = required(params, "Render page params required")?;
        let pages = self.pages.lock().await;
        let page = pages.get(&params.page_id)?;
        to_result(RenderPageResult {
            html: pages.render(&params.page_id)?,
            page_id: params.page_id,
            opened_at: page.opened_at,
            reapply_count: page.controller.reapply_count(),
        })
    }

    async fn handle_append_html(&self, params: Option<Value>) -> RelayResult<Value> {
        let params: AppendHtmlParams = required(params, "Append HTML params required")?;
        let (inserted, scheduled) = self.pages.lock().await.append_html(
            &params.page_id,
            &params.html,
            params.selector.as_deref(),
            Instant::now(),
        )?;
        to_result(AppendHtmlResult {
            inserted,
            scheduled,
        })
    }

    async fn handle_dispatch_event(&self, params: Option<Value>) -> RelayResult<Value> {
        let params: DispatchEventParams = required(params, "Dispatch event params required")?;
        let event = make_event(params.event, params.value);
        let handled = self.pages.lock().await.dispatch(
            &params.page_id,
            &params.selector,
            params.index,
            event,
        )?;
        to_result(DispatchEventResult { handled })
    }

    /// Apply `settings` to every open page and notify listeners.
    async fn broadcast(&self, settings: &Settings) {
        let changes = self.pages.lock().await.broadcast(settings);
        for (page_id, page_changes) in &changes {
            if !page_changes.is_empty() {
                tracing::debug!("Page {page_id}: {page_changes:?}");
            }
        }

        if let Some(sender) = &self.notifier {
            let params = SettingsUpdatedParams {
                settings: settings.clone(),
            };
            match serde_json::to_value(params) {
                Ok(value) => {
                    let notification =
                        JsonRpcNotification::new(SETTINGS_UPDATED, Some(value));
                    if sender.send(notification).is_err() {
                        tracing::debug!("Notification channel closed");
                    }
                }
                Err(e) => tracing::warn!("Failed to encode settings notification: {e}"),
            }
        }
    }
}

fn required<T: DeserializeOwned>(params: Option<Value>, missing: &str) -> RelayResult<T> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| RelayError::InvalidParams(e.to_string()))?
        .ok_or_else(|| RelayError::InvalidParams(missing.to_string()))
}

fn to_result<T: serde::Serialize>(value: T) -> RelayResult<Value> {
    serde_json::to_value(value).map_err(|e| RelayError::InternalError(e.to_string()))
}
