use crate::canvas::hitl::{CallStatus, Resolver};
use crate::event::AppEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("agent link runtime unavailable: {0}")]
    Runtime(String),
    #[error("failed to read agent input: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write agent output: {0}")]
    Write(#[source] std::io::Error),
    #[error("malformed agent message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("agent link already started")]
    AlreadyStarted,
}

/// One line read from the agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    ToolCall {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: Value,
        #[serde(default)]
        status: CallStatus,
    },
    AssistantText {
        text: String,
    },
    State {
        state: Map<String, Value>,
    },
}

impl InboundMessage {
    pub fn into_event(self) -> AppEvent {
        match self {
            Self::ToolCall {
                call_id,
                name,
                arguments,
                status,
            } => AppEvent::ToolCall {
                call_id,
                name,
                arguments,
                status,
            },
            Self::AssistantText { text } => AppEvent::AssistantText(text),
            Self::State { state } => AppEvent::StateUpdate(state),
        }
    }
}

/// One line written to the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    ToolResult {
        call_id: String,
        content: String,
        is_error: bool,
    },
    UserMessage {
        content: String,
    },
    State {
        state: Value,
    },
}

/// Blank lines yield `Ok(None)`.
pub fn decode_line(line: &str) -> Result<Option<InboundMessage>, LinkError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

pub fn encode_message(message: &OutboundMessage) -> Result<String, LinkError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Reads agent lines until EOF. Undecodable lines are reported and skipped.
pub async fn pump_inbound<R>(reader: R, tx: mpsc::Sender<AppEvent>) -> Result<(), LinkError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.map_err(LinkError::Read)? {
        match decode_line(&line) {
            Ok(Some(message)) => {
                if tx.send(message.into_event()).is_err() {
                    debug!("ui event channel closed; inbound pump stopping");
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "skipping agent line");
                let _ = tx.send(AppEvent::LinkError(err.to_string()));
            }
        }
    }
    Ok(())
}

/// Writes queued messages as JSON lines until every sender is dropped.
pub async fn pump_outbound<W>(
    mut writer: W,
    mut rx: UnboundedReceiver<OutboundMessage>,
) -> Result<(), LinkError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = rx.recv().await {
        let line = encode_message(&message)?;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(LinkError::Write)?;
        writer.flush().await.map_err(LinkError::Write)?;
    }
    Ok(())
}

/// Line-delimited JSON connection to the external agent over stdio.
#[derive(Clone)]
pub struct AgentLink {
    tx: mpsc::Sender<AppEvent>,
    outbound: UnboundedSender<OutboundMessage>,
    outbound_rx: Arc<Mutex<Option<UnboundedReceiver<OutboundMessage>>>>,
    runtime_handle: Handle,
    started: Arc<AtomicBool>,
}

impl AgentLink {
    pub fn new(tx: mpsc::Sender<AppEvent>) -> Result<Self, LinkError> {
        let runtime_handle =
            Handle::try_current().map_err(|err| LinkError::Runtime(err.to_string()))?;
        let (outbound, outbound_rx) = unbounded_channel();
        Ok(Self {
            tx,
            outbound,
            outbound_rx: Arc::new(Mutex::new(Some(outbound_rx))),
            runtime_handle,
            started: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn start(&self) -> Result<(), LinkError> {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LinkError::AlreadyStarted);
        }
        let outbound_rx = self
            .outbound_rx
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(LinkError::AlreadyStarted)?;

        let tx = self.tx.clone();
        self.runtime_handle.spawn(async move {
            let reader = BufReader::new(tokio::io::stdin());
            match pump_inbound(reader, tx.clone()).await {
                Ok(()) => info!("agent input closed"),
                Err(err) => {
                    warn!(error = %err, "agent input failed");
                    let _ = tx.send(AppEvent::LinkError(err.to_string()));
                }
            }
            let _ = tx.send(AppEvent::LinkClosed);
        });

        let tx = self.tx.clone();
        self.runtime_handle.spawn(async move {
            if let Err(err) = pump_outbound(tokio::io::stdout(), outbound_rx).await {
                warn!(error = %err, "agent output failed");
                let _ = tx.send(AppEvent::LinkError(err.to_string()));
            }
        });
        Ok(())
    }

    fn send(&self, message: OutboundMessage) {
        if self.outbound.send(message).is_err() {
            warn!("agent output channel closed; message dropped");
        }
    }

    /// Single-use reply channel for one tool call.
    pub fn resolver_for(&self, call_id: &str) -> Resolver {
        let outbound = self.outbound.clone();
        let call_id = call_id.to_string();
        Resolver::new(move |content| {
            if outbound
                .send(OutboundMessage::ToolResult {
                    call_id,
                    content,
                    is_error: false,
                })
                .is_err()
            {
                warn!("agent output channel closed; tool result dropped");
            }
        })
    }

    pub fn send_tool_error(&self, call_id: &str, message: impl Into<String>) {
        self.send(OutboundMessage::ToolResult {
            call_id: call_id.to_string(),
            content: message.into(),
            is_error: true,
        });
    }

    /// Inbound message on behalf of the operator, e.g. a submitted form.
    pub fn send_user_message(&self, content: impl Into<String>) {
        self.send(OutboundMessage::UserMessage {
            content: content.into(),
        });
    }

    pub fn publish_state(&self, state: Value) {
        self.send(OutboundMessage::State { state });
    }
}
