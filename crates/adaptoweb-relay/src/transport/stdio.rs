//! Stdio transport: reads JSON-RPC from stdin, writes to stdout.
//!
//! Besides answering requests, the loop forwards `settingsUpdated`
//! notifications and wakes up when a page's debounced re-application is due.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::protocol::ProtocolHandler;
use crate::types::{JsonRpcNotification, RelayError, RelayResult};

use super::framing;

/// Stdio transport for a single host process.
pub struct StdioTransport {
    handler: ProtocolHandler,
    notifications: mpsc::UnboundedReceiver<JsonRpcNotification>,
}

impl StdioTransport {
    /// Wire `handler` to a fresh notification channel.
    pub fn new(handler: ProtocolHandler) -> Self {
        let (sender, notifications) = mpsc::unbounded_channel();
        Self {
            handler: handler.with_notifier(sender),
            notifications,
        }
    }

    /// Run the transport loop. Reads from stdin, writes to stdout.
    pub async fn run(mut self) -> RelayResult<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(stdin).lines();

        tracing::info!("Stdio transport started");

        loop {
            let deadline = self.handler.next_deadline().await;
            let wake_at = deadline
                .map(tokio::time::Instant::from_std)
                .unwrap_or_else(tokio::time::Instant::now);

            tokio::select! {
                next = lines.next_line() => {
                    let Some(line) = next.map_err(RelayError::Io)? else {
                        tracing::info!("EOF on stdin, shutting down");
                        break;
                    };
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.handle_line(trimmed, &mut stdout).await?;
                }
                Some(notification) = self.notifications.recv() => {
                    let value = serde_json::to_value(notification)?;
                    write_frame(&mut stdout, &value).await?;
                }
                _ = tokio::time::sleep_until(wake_at), if deadline.is_some() => {
                    let fired = self.handler.tick(std::time::Instant::now()).await;
                    tracing::debug!("Debounce deadline reached, {fired} pages re-adapted");
                }
            }
        }

        Ok(())
    }

    async fn handle_line<W: AsyncWrite + Unpin>(&self, line: &str, out: &mut W) -> RelayResult<()> {
        match framing::parse_message(line) {
            Ok(msg) => {
                if let Some(response) = self.handler.handle_message(msg).await {
                    write_frame(out, &response).await?;
                }
            }
            Err(rejected) => {
                tracing::warn!("Rejected message: {}", rejected.error);
                let value = serde_json::to_value(rejected.error.to_json_rpc_error(rejected.id))
                    .map_err(|e| RelayError::InternalError(e.to_string()))?;
                write_frame(out, &value).await?;
            }
        }
        Ok(())
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(out: &mut W, value: &serde_json::Value) -> RelayResult<()> {
    let framed = framing::frame_message(value)?;
    out.write_all(framed.as_bytes()).await.map_err(RelayError::Io)?;
    out.flush().await.map_err(RelayError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use adaptoweb::Settings;
    use serde_json::Value;
    use tokio::sync::Mutex;

    use super::*;
    use crate::store::SettingsStore;

    fn transport() -> StdioTransport {
        let store = SettingsStore::in_memory(Settings::default());
        StdioTransport::new(ProtocolHandler::new(Arc::new(Mutex::new(store))))
    }

    #[tokio::test]
    async fn test_request_gets_one_framed_response() {
        let transport = transport();
        let mut out = Vec::new();
        transport
            .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches('\n').count(), 1);
        let response: Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(response["id"], 3);
        assert_eq!(response["result"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_notification_writes_nothing() {
        let transport = transport();
        let mut out = tokio_test::io::Builder::new().build();
        transport
            .handle_line(r#"{"jsonrpc":"2.0","method":"exit"}"#, &mut out)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_garbage_gets_parse_error_with_null_id() {
        let transport = transport();
        let mut out = Vec::new();
        transport.handle_line("{not json", &mut out).await.unwrap();

        let response: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_stray_response_is_answered_as_invalid_request() {
        let transport = transport();
        let mut out = Vec::new();
        transport
            .handle_line(r#"{"jsonrpc":"2.0","id":"r1","result":true}"#, &mut out)
            .await
            .unwrap();

        let response: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(response["id"], "r1");
        assert_eq!(response["error"]["code"], -32600);
    }
}
