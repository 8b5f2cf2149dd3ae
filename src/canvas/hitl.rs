use crate::canvas::layout::GridLayout;
use crate::canvas::model::{WidgetId, WidgetKind};
use crate::canvas::store::{UpsertRequest, WidgetStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

pub const CONFIRMATION_TITLE: &str = "Mission Control";

/// Engine-observed state of the asynchronous call behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    InProgress,
    #[default]
    Executing,
    Complete,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Executing => "executing",
            Self::Complete => "complete",
        }
    }
}

/// Single-use channel back to a waiting tool call.
pub struct Resolver {
    deliver: Option<Box<dyn FnOnce(String) + Send>>,
}

impl Resolver {
    pub fn new(deliver: impl FnOnce(String) + Send + 'static) -> Self {
        Self {
            deliver: Some(Box::new(deliver)),
        }
    }

    #[cfg(test)]
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Delivers `value` on the first call only. Returns whether it was delivered.
    pub fn resolve(&mut self, value: impl Into<String>) -> bool {
        match self.deliver.take() {
            Some(deliver) => {
                deliver(value.into());
                true
            }
            None => false,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.deliver.is_none()
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("spent", &self.is_spent())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationDecision {
    Approved,
    Declined,
    /// The operator closed the widget while the request was still pending.
    Dismissed,
    /// A newer request took over the slot before the operator answered.
    Superseded,
}

impl ConfirmationDecision {
    pub fn to_tool_result(&self) -> String {
        json!({
            "decision": self,
            "approved": matches!(self, Self::Approved),
        })
        .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitlPhase {
    Idle,
    Requested,
    WidgetShown,
    Resolved,
}

#[derive(Debug)]
struct PendingConfirmation {
    request_id: String,
    status: CallStatus,
    widget_id: WidgetId,
    resolver: Resolver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A fresh request was parked and its widget created or reused.
    Parked,
    /// Another observation of the request already parked.
    Refreshed,
    /// Observation of a request that has already been answered.
    AlreadyResolved,
}

/// Tracks the single outstanding operator confirmation.
#[derive(Debug)]
pub struct ConfirmationCorrelator {
    phase: HitlPhase,
    pending: Option<PendingConfirmation>,
    /// Every request id that has been answered, superseded or dismissed.
    resolved: BTreeSet<String>,
}

impl Default for ConfirmationCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationCorrelator {
    pub fn new() -> Self {
        Self {
            phase: HitlPhase::Idle,
            pending: None,
            resolved: BTreeSet::new(),
        }
    }

    pub fn phase(&self) -> HitlPhase {
        self.phase
    }

    pub fn pending_request(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.request_id.as_str())
    }

    pub fn pending_status(&self) -> Option<CallStatus> {
        self.pending.as_ref().map(|pending| pending.status)
    }

    pub fn is_awaiting_operator(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.resolver.is_spent())
    }

    /// Records one observation of a blocking confirmation call.
    ///
    /// Repeated observations of the same `request_id` only refresh the
    /// status; the first resolver stays in place. A different request id
    /// supersedes whatever is pending. Ids that were already answered in any
    /// way are ignored.
    pub fn request(
        &mut self,
        store: &mut WidgetStore,
        layout: &GridLayout,
        request_id: &str,
        status: CallStatus,
        message: &str,
        resolver: Resolver,
    ) -> RequestOutcome {
        if self.resolved.contains(request_id) {
            debug!(request_id, "observation for resolved confirmation ignored");
            return RequestOutcome::AlreadyResolved;
        }

        if let Some(pending) = self.pending.as_mut() {
            if pending.request_id == request_id {
                pending.status = status;
                let widget_id = pending.widget_id.clone();
                Self::show_widget(store, layout, Some(widget_id), message, status);
                return RequestOutcome::Refreshed;
            }
        }

        if let Some(mut stale) = self.pending.take() {
            if stale
                .resolver
                .resolve(ConfirmationDecision::Superseded.to_tool_result())
            {
                info!(request_id = %stale.request_id, "pending confirmation superseded");
            }
            self.resolved.insert(stale.request_id);
        }

        self.phase = HitlPhase::Requested;
        let existing = store
            .find_kind(WidgetKind::Confirmation)
            .map(|widget| widget.id.clone());
        let widget_id = Self::show_widget(store, layout, existing, message, status);
        self.pending = Some(PendingConfirmation {
            request_id: request_id.to_string(),
            status,
            widget_id,
            resolver,
        });
        self.phase = HitlPhase::WidgetShown;
        info!(request_id, "confirmation parked");
        RequestOutcome::Parked
    }

    fn show_widget(
        store: &mut WidgetStore,
        layout: &GridLayout,
        widget_id: Option<WidgetId>,
        message: &str,
        status: CallStatus,
    ) -> WidgetId {
        let mut content = Map::new();
        content.insert("message".to_string(), Value::String(message.to_string()));
        content.insert("status".to_string(), json!(status));
        content.insert("decision".to_string(), Value::Null);
        let mut request = UpsertRequest::new(WidgetKind::Confirmation, CONFIRMATION_TITLE, content);
        request.id = widget_id;
        store.upsert(request, layout).0
    }

    /// Relays the operator's decision to the waiting call. Only the first
    /// call per request has an effect.
    pub fn resolve(
        &mut self,
        store: &mut WidgetStore,
        layout: &GridLayout,
        decision: ConfirmationDecision,
    ) -> bool {
        let Some(mut pending) = self.pending.take() else {
            return false;
        };
        let delivered = pending.resolver.resolve(decision.to_tool_result());
        self.resolved.insert(pending.request_id.clone());
        if !delivered {
            return false;
        }

        self.phase = HitlPhase::Resolved;
        if let Some(widget) = store.get(&pending.widget_id) {
            let mut request = UpsertRequest::new(widget.kind, widget.title.clone(), Map::new())
                .with_id(pending.widget_id.clone());
            request
                .content
                .insert("status".to_string(), json!(CallStatus::Complete));
            request.content.insert("decision".to_string(), json!(decision));
            store.upsert(request, layout);
        }
        info!(request_id = %pending.request_id, ?decision, "confirmation resolved");
        self.phase = HitlPhase::Idle;
        true
    }

    /// Called when the operator closes a widget. Closing the confirmation
    /// surface while a call is parked answers it as dismissed.
    pub fn widget_closed(&mut self, store: &mut WidgetStore, layout: &GridLayout, widget_id: &str) {
        let owns_widget = self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.widget_id == widget_id);
        if owns_widget {
            self.resolve(store, layout, ConfirmationDecision::Dismissed);
        }
    }
}
