//! Push subscription client for the routing GraphQL API.
//!
//! Speaks the `graphql-transport-ws` subprotocol over a websocket opened
//! against the API URL with its scheme rewritten to `wss`. One subscription
//! per tag; the bearer cookie from the token layer rides on the handshake.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use uuid::Uuid;

use super::error::RouterError;
use super::types::{Edge, GraphQlError, TerminalsUpdated, TERMINALS_SUBSCRIPTION};

/// Deadline for the connection_init / connection_ack exchange.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the bearer cookie installed by the token layer.
const TOKEN_COOKIE: &str = "magoidc-token";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Rewrite the API URL for the websocket endpoint (scheme → `wss`).
pub fn websocket_url(api_url: &str) -> Result<String, RouterError> {
    let mut url = reqwest::Url::parse(api_url).map_err(|e| RouterError::BadUrl {
        message: e.to_string(),
    })?;

    url.set_scheme("wss").map_err(|_| RouterError::BadUrl {
        message: format!("cannot rewrite scheme of {api_url}"),
    })?;

    Ok(url.to_string())
}

/// Server → client frame of the graphql-transport-ws protocol.
#[derive(Debug, Deserialize)]
struct ServerMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// Payload of a `next` frame.
#[derive(Debug, Deserialize)]
struct NextPayload {
    data: Option<TerminalsUpdated>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// One live `terminalsUpdated` subscription.
pub struct TerminalSubscription {
    stream: WsStream,
    id: String,
    tag: String,
}

impl TerminalSubscription {
    /// Open the websocket, perform the protocol handshake, and subscribe to
    /// updates for `tag`. `token` is the current bearer credential; when
    /// present it is attached as the API cookie.
    pub async fn connect(
        ws_url: &str,
        token: Option<&str>,
        tag: &str,
    ) -> Result<Self, RouterError> {
        let mut request = ws_url.into_client_request()?;

        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static("graphql-transport-ws"),
        );

        if let Some(token) = token {
            let cookie = HeaderValue::from_str(&format!("{TOKEN_COOKIE}={token}")).map_err(
                |_| RouterError::Handshake {
                    message: "token is not a valid header value".to_string(),
                },
            )?;
            request.headers_mut().insert("Cookie", cookie);
        }

        // Plant equipment runs self-signed certificates.
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| RouterError::Handshake {
                message: format!("TLS connector: {e}"),
            })?;

        let (mut stream, _) =
            connect_async_tls_with_config(request, None, false, Some(Connector::NativeTls(tls)))
                .await?;

        stream
            .send(Message::Text(json!({ "type": "connection_init" }).to_string()))
            .await?;

        tokio::time::timeout(HANDSHAKE_TIMEOUT, await_ack(&mut stream))
            .await
            .map_err(|_| RouterError::Handshake {
                message: "timed out waiting for connection_ack".to_string(),
            })??;

        let id = Uuid::new_v4().to_string();

        stream
            .send(Message::Text(
                json!({
                    "id": id,
                    "type": "subscribe",
                    "payload": {
                        "query": TERMINALS_SUBSCRIPTION,
                        "variables": { "tag": tag },
                    },
                })
                .to_string(),
            ))
            .await?;

        debug!(tag = %tag, id = %id, "terminals subscription established");

        Ok(Self {
            stream,
            id,
            tag: tag.to_string(),
        })
    }

    /// The server-side subscription id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next batch of pushed edges.
    ///
    /// `None` means the subscription finished (server `complete` or the
    /// connection closed) and the caller should reconnect. Per-message
    /// failures come back as `Some(Err(..))` and the subscription keeps
    /// running.
    pub async fn next_edges(&mut self) -> Option<Result<Vec<Edge>, RouterError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(err.into())),
            };

            let text = match message {
                Message::Text(text) => text,
                Message::Ping(data) => {
                    let _ = self.stream.send(Message::Pong(data)).await;
                    continue;
                }
                Message::Close(_) => return None,
                _ => continue,
            };

            let frame: ServerMessage = match serde_json::from_str(&text) {
                Ok(frame) => frame,
                Err(err) => {
                    return Some(Err(RouterError::Json {
                        message: format!("subscription frame: {err}"),
                    }))
                }
            };

            match frame.kind.as_str() {
                "next" => {
                    let payload = frame.payload.unwrap_or(Value::Null);
                    let parsed: NextPayload = match serde_json::from_value(payload) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            return Some(Err(RouterError::Json {
                                message: format!("subscription payload: {err}"),
                            }))
                        }
                    };

                    if !parsed.errors.is_empty() {
                        let message = parsed
                            .errors
                            .iter()
                            .map(|e| e.message.as_str())
                            .collect::<Vec<_>>()
                            .join("; ");
                        return Some(Err(RouterError::GraphQl { message }));
                    }

                    match parsed.data {
                        Some(data) => return Some(Ok(data.terminals_updated)),
                        None => continue,
                    }
                }
                "ping" => {
                    let _ = self
                        .stream
                        .send(Message::Text(json!({ "type": "pong" }).to_string()))
                        .await;
                }
                "error" => {
                    let message = frame
                        .payload
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "unspecified subscription error".to_string());
                    return Some(Err(RouterError::GraphQl { message }));
                }
                "complete" => return None,
                // connection_ack duplicates, pong, keep-alives
                _ => continue,
            }
        }
    }

    /// Tear the subscription down politely. Best-effort.
    pub async fn close(mut self) {
        let _ = self
            .stream
            .send(Message::Text(
                json!({ "id": self.id, "type": "complete" }).to_string(),
            ))
            .await;
        let _ = self.stream.close(None).await;

        debug!(tag = %self.tag, id = %self.id, "terminals subscription closed");
    }
}

async fn await_ack(stream: &mut WsStream) -> Result<(), RouterError> {
    while let Some(message) = stream.next().await {
        let message = message?;

        let text = match message {
            Message::Text(text) => text,
            Message::Ping(data) => {
                let _ = stream.send(Message::Pong(data)).await;
                continue;
            }
            Message::Close(_) => {
                return Err(RouterError::Handshake {
                    message: "connection closed before ack".to_string(),
                })
            }
            _ => continue,
        };

        let frame: ServerMessage = serde_json::from_str(&text).map_err(|e| RouterError::Json {
            message: format!("handshake frame: {e}"),
        })?;

        match frame.kind.as_str() {
            "connection_ack" => return Ok(()),
            "ping" => {
                let _ = stream
                    .send(Message::Text(json!({ "type": "pong" }).to_string()))
                    .await;
            }
            _ => continue,
        }
    }

    Err(RouterError::Handshake {
        message: "stream ended before ack".to_string(),
    })
}
