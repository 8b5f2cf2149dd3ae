use eframe::egui;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldValue {
    Text { value: String },
    Number { value: f64 },
    Checkbox { value: bool },
}

impl FieldValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text { value } => Value::String(value.clone()),
            Self::Number { value } => json!(value),
            Self::Checkbox { value } => Value::Bool(*value),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text { value } if value.trim().is_empty())
    }
}

/// Identifies one form input: the widget, the block inside it and the
/// field name. Widget ids are opaque, so the parts are kept apart.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldKey {
    pub widget_id: String,
    pub block_index: usize,
    pub field: String,
}

impl FieldKey {
    pub fn new(widget_id: &str, block_index: usize, field: &str) -> Self {
        Self {
            widget_id: widget_id.to_string(),
            block_index,
            field: field.to_string(),
        }
    }

    /// Stable egui id for the input bound to this key.
    pub fn input_id(&self) -> egui::Id {
        egui::Id::new(("form_field", self))
    }
}

pub type FormState = BTreeMap<FieldKey, FieldValue>;

/// Emitted by rendered content that wants to talk back to the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    pub action: String,
    pub payload: Value,
    pub source_widget_title: String,
}

impl ActionEvent {
    /// Inbound message text for the agent. The payload is embedded as JSON
    /// so its shape survives unchanged.
    pub fn to_agent_message(&self) -> String {
        json!({
            "action": self.action,
            "payload": self.payload,
            "sourceWidgetTitle": self.source_widget_title,
        })
        .to_string()
    }

    pub fn to_log_line(&self) -> String {
        format!(
            "action={} source={} payload={}",
            self.action, self.source_widget_title, self.payload
        )
    }
}

/// FIFO between the rendering layer and the agent link.
#[derive(Debug, Default, Clone)]
pub struct ActionQueue {
    entries: VecDeque<ActionEvent>,
}

impl ActionQueue {
    pub fn push(&mut self, event: ActionEvent) {
        self.entries.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = ActionEvent> + '_ {
        self.entries.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_message_preserves_payload_shape() {
        let event = ActionEvent {
            action: "contact_submit".to_string(),
            payload: json!({"email": "a@b.c", "count": 2, "nested": {"ok": true}}),
            source_widget_title: "Contact".to_string(),
        };
        let decoded: Value =
            serde_json::from_str(&event.to_agent_message()).expect("message is json");
        assert_eq!(decoded["payload"], event.payload);
        assert_eq!(decoded["action"], "contact_submit");
        assert_eq!(decoded["sourceWidgetTitle"], "Contact");
    }

    #[test]
    fn queue_drains_in_arrival_order() {
        let mut queue = ActionQueue::default();
        for action in ["first", "second"] {
            queue.push(ActionEvent {
                action: action.to_string(),
                payload: Value::Null,
                source_widget_title: "T".to_string(),
            });
        }
        let drained: Vec<String> = queue.drain().map(|event| event.action).collect();
        assert_eq!(drained, vec!["first", "second"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn field_keys_keep_colon_ids_apart() {
        let a = FieldKey::new("card:contact", 0, "email");
        let b = FieldKey::new("card", 0, "contact:email");
        assert_ne!(a, b);
        assert_ne!(a.input_id(), b.input_id());
        assert_eq!(a.input_id(), FieldKey::new("card:contact", 0, "email").input_id());
    }

    #[test]
    fn blank_detection_only_applies_to_text() {
        assert!(FieldValue::Text { value: "  ".into() }.is_blank());
        assert!(!FieldValue::Checkbox { value: false }.is_blank());
        assert_eq!(FieldValue::Number { value: 2.5 }.to_json(), json!(2.5));
    }
}
