//! Cloud relay client
//!
//! Owns the single outbound WebSocket connection to the cloud, reconnects with
//! exponential backoff, and dispatches inbound frames one at a time. Frames are
//! processed strictly in arrival order; a slow tool call delays the next read.

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::BridgeConfig;
use crate::openclaw::{Gateway, GatewayError, OpenClawClient};
use crate::relay::protocol::{HealthStatus, Inbound, Outbound};

/// Close code the cloud sends for an invalid or revoked API key
const CLOSE_INVALID_CREDENTIALS: u16 = 4001;

/// Minimum delay between reconnect attempts
const BACKOFF_MIN: Duration = Duration::from_secs(1);

/// The only tool this bridge knows how to execute
const TOOL_LOCAL_OPENCLAW: &str = "local_openclaw";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Exponential reconnect delay: starts at the minimum, doubles after every
/// errored disconnect, caps at the configured maximum, resets after a clean one.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(max: Duration) -> Self {
        Self {
            current: BACKOFF_MIN,
            max,
        }
    }

    /// Delay to sleep before the next connect attempt; the one after doubles
    pub fn advance(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = BACKOFF_MIN;
    }
}

/// Connects to the cloud WebSocket endpoint and forwards tool requests to the
/// local OpenClaw gateway.
pub struct RelayClient<G: Gateway> {
    cloud_url: String,
    api_key: String,
    gateway: G,
    backoff: Backoff,
}

impl RelayClient<OpenClawClient> {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            &config.cloud_url,
            &config.api_key,
            Duration::from_secs(config.reconnect_interval_max),
            OpenClawClient::from_config(config),
        )
    }
}

impl<G: Gateway> RelayClient<G> {
    pub fn new(cloud_url: &str, api_key: &str, reconnect_max: Duration, gateway: G) -> Self {
        Self {
            cloud_url: cloud_url.to_string(),
            api_key: api_key.to_string(),
            gateway,
            backoff: Backoff::new(reconnect_max),
        }
    }

    /// Main loop with exponential-backoff reconnection. Never returns on its
    /// own; every failure is logged and retried.
    pub async fn run(&mut self) {
        loop {
            match self.connect_and_listen().await {
                Ok(()) => {
                    tracing::info!("Disconnected from cloud");
                    self.backoff.reset();
                }
                Err(e) => tracing::warn!("Connection lost: {:#}", e),
            }

            let delay = self.backoff.advance();
            tracing::info!("Reconnecting in {}s...", delay.as_secs());
            sleep(delay).await;
        }
    }

    /// Connect target: the cloud URL with the API key as a query parameter
    fn connect_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.cloud_url).context("Invalid cloud URL")?;
        url.query_pairs_mut().append_pair("api_key", &self.api_key);
        Ok(url)
    }

    /// One connection lifetime: handshake, status report, then the read loop.
    /// Returns `Ok(())` only on a clean close.
    async fn connect_and_listen(&mut self) -> Result<()> {
        let url = self.connect_url()?;
        tracing::info!("Connecting to {}", self.cloud_url);

        let (mut ws, _response) = connect_async(url.as_str())
            .await
            .context("WebSocket handshake failed")?;
        tracing::info!("Connected to cloud");

        let status = self.status_frame().await;
        send_frame(&mut ws, &status).await?;

        while let Some(frame) = ws.next().await {
            match frame.context("WebSocket read failed")? {
                Message::Text(text) => {
                    if let Some(reply) = self.dispatch(&text).await {
                        send_frame(&mut ws, &reply).await?;
                    }
                }
                Message::Close(Some(frame)) => {
                    let code = u16::from(frame.code);
                    if code == CLOSE_INVALID_CREDENTIALS {
                        tracing::error!(
                            "Cloud rejected the API key (close code 4001). \
                             Run `openclaw-bridge config` to update it."
                        );
                        anyhow::bail!("invalid credentials (close code 4001)");
                    }
                    if matches!(frame.code, CloseCode::Normal | CloseCode::Away) {
                        return Ok(());
                    }
                    anyhow::bail!("cloud closed the connection: {} {}", code, frame.reason);
                }
                Message::Close(None) => return Ok(()),
                // Transport-level keepalives; the application-level ping is a
                // JSON text frame handled in dispatch
                Message::Ping(_) | Message::Pong(_) => {}
                Message::Binary(_) | Message::Frame(_) => {}
            }
        }

        Ok(())
    }

    /// Status report sent once per successful connect
    async fn status_frame(&self) -> Outbound {
        let status = if self.gateway.health_check().await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unreachable
        };
        tracing::info!("Status sent: openclaw={}", status);
        Outbound::Status {
            openclaw_status: status,
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Decode one inbound frame and produce the reply to send, if any.
    /// Malformed payloads and unrecognized frame kinds are ignored.
    pub async fn dispatch(&self, raw: &str) -> Option<Outbound> {
        let inbound: Inbound = match serde_json::from_str(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Bad JSON from cloud ({}): {:.200}", e, raw);
                return None;
            }
        };

        match inbound {
            Inbound::ToolRequest {
                request_id,
                tool_name,
                arguments,
            } => {
                tracing::info!("Tool request: id={} tool={}", request_id, tool_name);
                Some(
                    self.handle_tool_request(request_id, &tool_name, &arguments)
                        .await,
                )
            }
            Inbound::Ping => Some(Outbound::Pong),
            Inbound::Unknown => None,
        }
    }

    /// Execute a tool request. Always yields exactly one response frame.
    async fn handle_tool_request(
        &self,
        request_id: String,
        tool_name: &str,
        arguments: &Map<String, Value>,
    ) -> Outbound {
        if tool_name != TOOL_LOCAL_OPENCLAW {
            return Outbound::tool_failure(request_id, format!("Unsupported tool: {}", tool_name));
        }

        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default();

        match self.gateway.query(query).await {
            Ok(result) => Outbound::tool_success(request_id, result),
            Err(e @ GatewayError::Unreachable(_)) => {
                tracing::error!("OpenClaw unreachable: {}", e);
                Outbound::tool_failure(request_id, format!("OpenClaw unreachable: {}", e))
            }
            Err(e) => {
                tracing::error!("Tool execution failed: {}", e);
                Outbound::tool_failure(request_id, format!("Tool execution failed: {}", e))
            }
        }
    }
}

async fn send_frame(ws: &mut WsStream, frame: &Outbound) -> Result<()> {
    let json = serde_json::to_string(frame).context("Failed to encode frame")?;
    ws.send(Message::Text(json.into()))
        .await
        .context("WebSocket send failed")
}
