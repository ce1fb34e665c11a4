//! WebSocket bridge between the workflow engine and the page-side agent.
//!
//! The bridge runs a local WebSocket server. A thin agent script inside the
//! portal page connects, announces itself with a `hello` frame (this is the
//! readiness signal dispatch waits for), and then serves typed DOM commands:
//! find an element, overwrite a value, synthesize a click. Each command
//! carries a request id; replies are routed back to the caller through a
//! pending-request map. Elements are referenced by agent-assigned handles;
//! a command against a handle the page no longer knows yields
//! `ElementNotFound`.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, watch, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use crate::element::{DomElement, ElementImpl};
use crate::engine::DomEngine;
use crate::errors::AutomationError;
use crate::selector::Selector;

const DEFAULT_WS_ADDR: &str = "127.0.0.1:17475";
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

// Agent replies "not_found" for a selector with no match or a stale handle.
const AGENT_NOT_FOUND: &str = "not_found";

type BridgeResult = Result<serde_json::Value, String>;
type PendingMap = HashMap<String, oneshot::Sender<BridgeResult>>;
type Pending = Arc<Mutex<PendingMap>>;
type Clients = Arc<Mutex<Vec<Client>>>;

/// A DOM command sent to the page agent.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum Command {
    Find {
        selector: Selector,
        #[serde(skip_serializing_if = "Option::is_none")]
        root: Option<String>,
    },
    SetValue {
        handle: String,
        value: String,
    },
    Click {
        handle: String,
    },
}

#[derive(Debug, Serialize)]
struct CommandFrame {
    id: String,
    #[serde(flatten)]
    command: Command,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AgentIncoming {
    Reply {
        id: String,
        ok: bool,
        result: Option<serde_json::Value>,
        error: Option<String>,
    },
    Typed(TypedIncoming),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TypedIncoming {
    #[serde(rename = "hello")]
    Hello { from: Option<String> },
    #[serde(rename = "pong")]
    Pong,
}

/// Payload of a successful find reply.
#[derive(Debug, Deserialize)]
struct FoundElement {
    handle: String,
    tag: String,
    label: Option<String>,
}

struct Client {
    id: String,
    sender: mpsc::UnboundedSender<Message>,
}

pub struct PortalBridge {
    _server_task: JoinHandle<()>,
    clients: Clients,
    pending: Pending,
    // Receiver kept alive so readiness updates are never dropped between
    // waiters.
    ready_rx: watch::Receiver<bool>,
}

static GLOBAL: OnceCell<Arc<PortalBridge>> = OnceCell::new();

impl PortalBridge {
    /// Bridge on the default local address, started once per process.
    pub async fn global() -> Result<Arc<PortalBridge>, AutomationError> {
        if let Some(b) = GLOBAL.get() {
            return Ok(b.clone());
        }
        let bridge = PortalBridge::bind(DEFAULT_WS_ADDR).await?;
        let _ = GLOBAL.set(bridge.clone());
        Ok(bridge)
    }

    /// Bind the listener and start accepting agent connections.
    pub async fn bind(addr: &str) -> Result<Arc<PortalBridge>, AutomationError> {
        let clients: Clients = Arc::new(Mutex::new(Vec::new()));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (ready_tx, ready_rx) = watch::channel(false);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AutomationError::Bridge(format!("failed to bind {addr}: {e}")))?;
        let local_addr: SocketAddr = listener
            .local_addr()
            .map_err(|e| AutomationError::Bridge(format!("no local addr: {e}")))?;
        tracing::info!("portal bridge listening on {}", local_addr);

        let clients_clone = clients.clone();
        let pending_clone = pending.clone();
        let ready_clone = ready_tx;

        let server_task = tokio::spawn(async move {
            loop {
                let (stream, _peer) = match listener.accept().await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("ws accept error: {}", e);
                        continue;
                    }
                };
                let ws_clients = clients_clone.clone();
                let ws_pending = pending_clone.clone();
                let ws_ready = ready_clone.clone();
                tokio::spawn(async move {
                    let ws_stream = match accept_async(stream).await {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::warn!("ws handshake error: {}", e);
                            return;
                        }
                    };
                    let (mut sink, mut stream) = ws_stream.split();
                    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

                    // writer task
                    let writer = tokio::spawn(async move {
                        while let Some(msg) = rx.recv().await {
                            if let Err(e) = sink.send(msg).await {
                                tracing::warn!("ws send error: {}", e);
                                break;
                            }
                        }
                    });

                    // register client
                    let client_id = Uuid::new_v4().to_string();
                    {
                        ws_clients.lock().await.push(Client {
                            id: client_id.clone(),
                            sender: tx.clone(),
                        });
                    }

                    // reader loop
                    while let Some(Ok(msg)) = stream.next().await {
                        if !msg.is_text() {
                            continue;
                        }
                        let txt = msg.into_text().unwrap_or_default();
                        match serde_json::from_str::<AgentIncoming>(&txt) {
                            Ok(AgentIncoming::Reply {
                                id,
                                ok,
                                result,
                                error,
                            }) => {
                                if let Some(reply_tx) = ws_pending.lock().await.remove(&id) {
                                    let _ = reply_tx.send(if ok {
                                        Ok(result.unwrap_or(serde_json::Value::Null))
                                    } else {
                                        Err(error.unwrap_or_else(|| "unknown error".into()))
                                    });
                                } else {
                                    tracing::warn!(id = %id, "reply for unknown request id");
                                }
                            }
                            Ok(AgentIncoming::Typed(TypedIncoming::Hello { from })) => {
                                tracing::info!(from = ?from, "page agent connected");
                                let _ = ws_ready.send(true);
                            }
                            Ok(AgentIncoming::Typed(TypedIncoming::Pong)) => {}
                            Err(e) => tracing::warn!("invalid incoming JSON: {}", e),
                        }
                    }

                    writer.abort();

                    // unregister; readiness drops with the last agent
                    let mut clients = ws_clients.lock().await;
                    clients.retain(|c| c.id != client_id);
                    if clients.is_empty() {
                        tracing::info!("page agent disconnected");
                        let _ = ws_ready.send(false);
                    }
                });
            }
        });

        Ok(Arc::new(PortalBridge {
            _server_task: server_task,
            clients,
            pending,
            ready_rx,
        }))
    }

    pub fn is_agent_connected(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Block until an agent has said hello, bounded by `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> Result<(), AutomationError> {
        let mut rx = self.ready_rx.clone();
        tokio::time::timeout(timeout, rx.wait_for(|ready| *ready))
            .await
            .map_err(|_| {
                AutomationError::Timeout(format!("page agent not ready after {timeout:?}"))
            })?
            .map_err(|_| AutomationError::Bridge("bridge shut down".to_string()))?;
        Ok(())
    }

    /// One command round trip to the connected agent.
    async fn request(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<serde_json::Value, AutomationError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel::<BridgeResult>();
        self.pending.lock().await.insert(id.clone(), tx);

        let frame = CommandFrame {
            id: id.clone(),
            command,
        };
        let payload = serde_json::to_string(&frame)
            .map_err(|e| AutomationError::Bridge(format!("serialize command: {e}")))?;

        let sent = {
            let clients = self.clients.lock().await;
            match clients.first() {
                Some(c) => c.sender.send(Message::Text(payload)).is_ok(),
                None => false,
            }
        };
        if !sent {
            self.pending.lock().await.remove(&id);
            return Err(AutomationError::Bridge(
                "no page agent connected".to_string(),
            ));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) if err == AGENT_NOT_FOUND => {
                Err(AutomationError::ElementNotFound("agent reported no match".to_string()))
            }
            Ok(Ok(Err(err))) => Err(AutomationError::Bridge(format!("agent error: {err}"))),
            Ok(Err(_canceled)) => Err(AutomationError::Bridge(
                "agent reply channel canceled".to_string(),
            )),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                Err(AutomationError::Bridge(format!(
                    "timed out waiting for agent reply (id={id})"
                )))
            }
        }
    }
}

impl std::fmt::Debug for PortalBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalBridge").finish_non_exhaustive()
    }
}

fn element_from_reply(
    bridge: &Arc<PortalBridge>,
    command_timeout: Duration,
    value: serde_json::Value,
) -> Result<DomElement, AutomationError> {
    let found: FoundElement = serde_json::from_value(value)
        .map_err(|e| AutomationError::Bridge(format!("malformed find reply: {e}")))?;
    Ok(DomElement::new(Arc::new(BridgeElement {
        bridge: bridge.clone(),
        command_timeout,
        handle: found.handle,
        tag: found.tag,
        label: found.label,
    })))
}

/// [`DomEngine`] backed by the WebSocket bridge.
pub struct BridgeEngine {
    bridge: Arc<PortalBridge>,
    command_timeout: Duration,
}

impl BridgeEngine {
    pub fn new(bridge: Arc<PortalBridge>) -> Self {
        Self {
            bridge,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl DomEngine for BridgeEngine {
    async fn find_element(
        &self,
        selector: &Selector,
        root: Option<&DomElement>,
    ) -> Result<DomElement, AutomationError> {
        if let Selector::Invalid(reason) = selector {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
        let value = self
            .bridge
            .request(
                Command::Find {
                    selector: selector.clone(),
                    root: root.map(|r| r.handle()),
                },
                self.command_timeout,
            )
            .await?;
        element_from_reply(&self.bridge, self.command_timeout, value)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<(), AutomationError> {
        self.bridge.wait_ready(timeout).await
    }
}

/// A live element referenced by its agent-assigned handle.
#[derive(Debug)]
struct BridgeElement {
    bridge: Arc<PortalBridge>,
    command_timeout: Duration,
    handle: String,
    tag: String,
    label: Option<String>,
}

#[async_trait::async_trait]
impl ElementImpl for BridgeElement {
    fn handle(&self) -> String {
        self.handle.clone()
    }

    fn tag(&self) -> String {
        self.tag.clone()
    }

    fn label(&self) -> Option<String> {
        self.label.clone()
    }

    async fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.bridge
            .request(
                Command::SetValue {
                    handle: self.handle.clone(),
                    value: value.to_string(),
                },
                self.command_timeout,
            )
            .await
            .map(|_| ())
    }

    async fn click(&self) -> Result<(), AutomationError> {
        self.bridge
            .request(
                Command::Click {
                    handle: self.handle.clone(),
                },
                self.command_timeout,
            )
            .await
            .map(|_| ())
    }

    async fn find(&self, selector: &Selector) -> Result<DomElement, AutomationError> {
        if let Selector::Invalid(reason) = selector {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
        let value = self
            .bridge
            .request(
                Command::Find {
                    selector: selector.clone(),
                    root: Some(self.handle.clone()),
                },
                self.command_timeout,
            )
            .await?;
        element_from_reply(&self.bridge, self.command_timeout, value)
    }
}
