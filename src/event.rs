use crate::canvas::hitl::CallStatus;
use serde_json::{Map, Value};

/// Everything the agent link hands to the UI thread, in arrival order.
#[derive(Debug, Clone)]
pub enum AppEvent {
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
        status: CallStatus,
    },
    AssistantText(String),
    StateUpdate(Map<String, Value>),
    LinkError(String),
    LinkClosed,
}
