use crate::agent::AgentLink;
use crate::canvas::dispatch::{CanvasEngine, DispatchOutcome, ToolCall};
use crate::canvas::hitl::{CallStatus, HitlPhase, Resolver};
use crate::config::CanvasConfig;
use crate::event::AppEvent;
use crate::theme::Theme;
use crate::ui::event::ActionQueue;
use crate::ui::view::CanvasView;
use eframe::egui::{self, Color32, RichText, ScrollArea};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const DIAGNOSTICS_CAPACITY: usize = 200;

/// Where replies, action messages and state publications go.
pub trait AgentSink {
    fn resolver_for(&self, call_id: &str) -> Resolver;
    fn send_tool_error(&self, call_id: &str, message: String);
    fn send_action_message(&self, content: String);
    fn publish_state(&self, state: Value);
}

impl AgentSink for AgentLink {
    fn resolver_for(&self, call_id: &str) -> Resolver {
        AgentLink::resolver_for(self, call_id)
    }

    fn send_tool_error(&self, call_id: &str, message: String) {
        AgentLink::send_tool_error(self, call_id, message);
    }

    fn send_action_message(&self, content: String) {
        AgentLink::send_user_message(self, content);
    }

    fn publish_state(&self, state: Value) {
        AgentLink::publish_state(self, state);
    }
}

pub struct CanvasApp<S: AgentSink = AgentLink> {
    rx: Receiver<AppEvent>,
    link: S,
    engine: CanvasEngine,
    view: CanvasView,
    theme: Theme,
    actions: ActionQueue,
    assistant_line: Option<String>,
    link_open: bool,
    diagnostics_log: VecDeque<String>,
}

impl<S: AgentSink> CanvasApp<S> {
    pub fn new(rx: Receiver<AppEvent>, link: S, config: &CanvasConfig) -> Self {
        let engine = CanvasEngine::new(config);
        let theme = Theme::with_accent(engine.theme_color());
        Self {
            rx,
            link,
            engine,
            view: CanvasView::default(),
            theme,
            actions: ActionQueue::default(),
            assistant_line: None,
            link_open: true,
            diagnostics_log: VecDeque::new(),
        }
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        if self.diagnostics_log.len() == DIAGNOSTICS_CAPACITY {
            self.diagnostics_log.pop_front();
        }
        self.diagnostics_log
            .push_back(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.apply_event(event);
                    ctx.request_repaint();
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.link_open {
                        self.link_open = false;
                        self.log_diagnostic("event channel disconnected");
                    }
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ToolCall {
                call_id,
                name,
                arguments,
                status,
            } => self.handle_tool_call(&call_id, &name, arguments, status),
            AppEvent::AssistantText(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    self.assistant_line = Some(text);
                }
            }
            AppEvent::StateUpdate(update) => {
                if self.engine.merge_agent_state(update) {
                    self.log_diagnostic(format!(
                        "shared state updated by agent (revision {})",
                        self.engine.shared_state().revision()
                    ));
                }
            }
            AppEvent::LinkError(message) => {
                self.log_diagnostic(format!("link error: {message}"));
            }
            AppEvent::LinkClosed => {
                self.link_open = false;
                self.log_diagnostic("agent disconnected");
            }
        }
    }

    fn handle_tool_call(&mut self, call_id: &str, name: &str, arguments: Value, status: CallStatus) {
        let call = match ToolCall::decode(name, arguments) {
            Ok(call) => call,
            Err(err) => {
                warn!(call_id, tool = name, error = %err, "tool call rejected");
                self.log_diagnostic(format!("tool call {name} rejected: {err}"));
                // Partial observations may still be streaming their arguments.
                if status == CallStatus::Executing {
                    self.link.send_tool_error(call_id, err.to_string());
                }
                return;
            }
        };

        let reply = self.link.resolver_for(call_id);
        let tool = call.name();
        match self.engine.dispatch(call_id, status, call, reply) {
            DispatchOutcome::Completed(text) => {
                if tool == "set_theme_color" {
                    self.theme = Theme::with_accent(self.engine.theme_color());
                }
                self.log_diagnostic(format!("{tool}: {text}"));
            }
            DispatchOutcome::AwaitingOperator { acknowledgment } => {
                self.assistant_line = Some(acknowledgment);
            }
            DispatchOutcome::Ignored => {}
        }
    }

    /// Runs one canvas frame: draw, apply operator gestures, forward actions
    /// and publish changed dimensions.
    fn render_canvas(&mut self, ctx: &egui::Context) {
        let output = self.view.show(ctx, &self.engine, &self.theme);

        for command in output.commands {
            let applied = command.clone().apply(&mut self.engine);
            self.view.acknowledge(&command, &self.engine);
            if !applied {
                info!(?command, "operator command had no target");
            }
        }

        for event in output.actions {
            self.actions.push(event);
        }
        if !self.actions.is_empty() {
            debug!(count = self.actions.len(), "forwarding operator actions");
        }
        let drained: Vec<_> = self.actions.drain().collect();
        for event in drained {
            self.log_diagnostic(event.to_log_line());
            self.link.send_action_message(event.to_agent_message());
        }

        if let Some(size) = output.canvas_size {
            if let Some(state) = self.engine.observe_canvas(size.x, size.y) {
                self.link.publish_state(state);
            }
        }
    }

    fn hitl_label(&self) -> Option<(String, Color32)> {
        let hitl = self.engine.hitl();
        match hitl.phase() {
            HitlPhase::Idle | HitlPhase::Resolved => None,
            HitlPhase::Requested | HitlPhase::WidgetShown => {
                let request = hitl.pending_request().unwrap_or("?");
                let status = hitl.pending_status().unwrap_or_default();
                Some((
                    format!("Awaiting operator: {request} ({})", status.as_str()),
                    self.theme.warning,
                ))
            }
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let (status_label, status_color) = if self.link_open {
            ("Agent connected", self.theme.success)
        } else {
            ("Agent disconnected", self.theme.text_muted)
        };
        let hitl = self.hitl_label();
        let focused = self
            .engine
            .store()
            .focused()
            .map(|widget| widget.title.clone());
        let dimensions = self
            .engine
            .published_dimensions()
            .map(|dims| format!("{}×{}", dims.width, dims.height));
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("CoAgent Canvas");
                ui.separator();
                ui.label(RichText::new(status_label).color(status_color));
                ui.separator();
                ui.label(RichText::new("■").color(self.theme.accent));
                ui.label(self.engine.theme_color());
                ui.separator();
                ui.label(format!("{} widgets", self.engine.store().len()));
                if let Some(title) = focused {
                    ui.label(RichText::new(format!("top: {title}")).color(self.theme.text_muted));
                }
                if let Some(dimensions) = dimensions {
                    ui.separator();
                    ui.label(RichText::new(dimensions).color(self.theme.text_muted));
                }
                if let Some((label, color)) = hitl {
                    ui.separator();
                    ui.label(RichText::new(label).color(color).strong());
                }
                if let Some(line) = &self.assistant_line {
                    ui.separator();
                    ui.label(RichText::new(line).italics().color(self.theme.text_muted));
                }
            });
        });
    }

    fn render_diagnostics(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("diagnostics_panel").show(ctx, |ui| {
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(entry);
                            }
                        });
                });
        });
    }
}

impl<S: AgentSink> eframe::App for CanvasApp<S> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.theme.apply_visuals(ctx);
        self.render_top_bar(ctx);
        self.render_diagnostics(ctx);
        self.render_canvas(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::model::WidgetKind;
    use crate::ui::event::FieldKey;
    use serde_json::json;
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Result { call_id: String, content: String },
        Error { call_id: String },
        Action(String),
        State(Value),
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<Sent>>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().expect("sink lock").clone()
        }
    }

    impl AgentSink for RecordingSink {
        fn resolver_for(&self, call_id: &str) -> Resolver {
            let sent = Arc::clone(&self.sent);
            let call_id = call_id.to_string();
            Resolver::new(move |content| {
                sent.lock()
                    .expect("sink lock")
                    .push(Sent::Result { call_id, content });
            })
        }

        fn send_tool_error(&self, call_id: &str, _message: String) {
            self.sent.lock().expect("sink lock").push(Sent::Error {
                call_id: call_id.to_string(),
            });
        }

        fn send_action_message(&self, content: String) {
            self.sent.lock().expect("sink lock").push(Sent::Action(content));
        }

        fn publish_state(&self, state: Value) {
            self.sent.lock().expect("sink lock").push(Sent::State(state));
        }
    }

    fn app() -> (mpsc::Sender<AppEvent>, RecordingSink, CanvasApp<RecordingSink>) {
        let (tx, rx) = mpsc::channel();
        let sink = RecordingSink::default();
        let app = CanvasApp::new(rx, sink.clone(), &CanvasConfig::default());
        (tx, sink, app)
    }

    fn tool_call(call_id: &str, name: &str, arguments: Value, status: CallStatus) -> AppEvent {
        AppEvent::ToolCall {
            call_id: call_id.to_string(),
            name: name.to_string(),
            arguments,
            status,
        }
    }

    #[test]
    fn events_are_applied_in_arrival_order() {
        let (tx, sink, mut app) = app();
        tx.send(tool_call(
            "c1",
            "render_card",
            json!({"title": "Weather", "content": [{"type": "text", "value": "Sunny"}]}),
            CallStatus::Executing,
        ))
        .expect("receiver alive");
        tx.send(tool_call(
            "c2",
            "delete_card",
            json!({"title": "weath"}),
            CallStatus::Executing,
        ))
        .expect("receiver alive");

        app.drain_events(&egui::Context::default());
        assert!(app.engine.widgets().is_empty());
        assert_eq!(
            sink.sent(),
            vec![
                Sent::Result {
                    call_id: "c1".to_string(),
                    content: "UI card 'Weather' rendered.".to_string()
                },
                Sent::Result {
                    call_id: "c2".to_string(),
                    content: "Card deleted.".to_string()
                },
            ]
        );
    }

    #[test]
    fn unknown_tools_get_an_error_reply() {
        let (tx, sink, mut app) = app();
        tx.send(tool_call("c1", "launch_rocket", json!({}), CallStatus::Executing))
            .expect("receiver alive");
        tx.send(tool_call("c2", "launch_rocket", json!({}), CallStatus::InProgress))
            .expect("receiver alive");

        app.drain_events(&egui::Context::default());
        assert_eq!(
            sink.sent(),
            vec![Sent::Error {
                call_id: "c1".to_string()
            }]
        );
        assert_eq!(app.diagnostics_log.len(), 2);
    }

    #[test]
    fn confirmation_reply_waits_for_the_operator() {
        let (tx, sink, mut app) = app();
        tx.send(tool_call(
            "c1",
            "request_confirmation",
            json!({"message": "Deploy?"}),
            CallStatus::Executing,
        ))
        .expect("receiver alive");

        app.drain_events(&egui::Context::default());
        assert!(sink.sent().is_empty());
        assert_eq!(
            app.assistant_line.as_deref(),
            Some("Mission Control active on main screen.")
        );
        assert!(app
            .engine
            .store()
            .find_kind(WidgetKind::Confirmation)
            .is_some());

        assert!(crate::ui::view::OperatorCommand::Confirm(
            crate::canvas::hitl::ConfirmationDecision::Approved
        )
        .apply(&mut app.engine));
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Result { call_id, content }
            if call_id == "c1" && content.contains("approved")));
    }

    #[test]
    fn assistant_text_and_agent_state_never_touch_the_store() {
        let (tx, _sink, mut app) = app();
        tx.send(AppEvent::AssistantText("Rendering now".to_string()))
            .expect("receiver alive");
        let mut update = serde_json::Map::new();
        update.insert("canvas_width".to_string(), json!(1));
        update.insert("topic".to_string(), json!("space"));
        tx.send(AppEvent::StateUpdate(update)).expect("receiver alive");

        app.drain_events(&egui::Context::default());
        assert!(app.engine.widgets().is_empty());
        assert_eq!(app.assistant_line.as_deref(), Some("Rendering now"));
        assert_eq!(app.engine.shared_state().values()["topic"], "space");
        assert!(app.engine.shared_state().values().get("canvas_width").is_none());
    }

    #[test]
    fn frames_publish_dimensions_once_per_change() {
        let (_tx, sink, mut app) = app();
        let ctx = egui::Context::default();
        let input = || egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(1200.0, 800.0),
            )),
            ..Default::default()
        };
        for _ in 0..3 {
            let _ = ctx.run(input(), |ctx| {
                app.render_canvas(ctx);
            });
        }

        let states: Vec<Sent> = sink
            .sent()
            .into_iter()
            .filter(|sent| matches!(sent, Sent::State(_)))
            .collect();
        assert_eq!(states.len(), 1);
        assert_eq!(
            states[0],
            Sent::State(json!({"canvas_width": 1200, "canvas_height": 800}))
        );
    }

    #[test]
    fn submitted_form_reaches_the_agent_with_its_payload() {
        let (tx, sink, mut app) = app();
        tx.send(tool_call(
            "c1",
            "render_card",
            json!({
                "id": "card:contact",
                "title": "Contact",
                "content": [{
                    "type": "form",
                    "action": "contact_submit",
                    "fields": [{"name": "email", "label": "Email", "required": true}]
                }]
            }),
            CallStatus::Executing,
        ))
        .expect("receiver alive");
        app.drain_events(&egui::Context::default());

        let ctx = egui::Context::default();
        let input = |events: Vec<egui::Event>| egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(1200.0, 800.0),
            )),
            events,
            ..Default::default()
        };
        // New windows lay out invisibly first; let the form settle.
        for _ in 0..3 {
            let _ = ctx.run(input(Vec::new()), |ctx| app.render_canvas(ctx));
        }

        let email = FieldKey::new("card:contact", 0, "email").input_id();
        ctx.memory_mut(|memory| memory.request_focus(email));
        let _ = ctx.run(input(vec![egui::Event::Text("ops@example.com".into())]), |ctx| {
            app.render_canvas(ctx)
        });
        let enter = egui::Event::Key {
            key: egui::Key::Enter,
            physical_key: None,
            pressed: true,
            repeat: false,
            modifiers: egui::Modifiers::NONE,
        };
        let _ = ctx.run(input(vec![enter]), |ctx| app.render_canvas(ctx));

        let actions: Vec<Value> = sink
            .sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Action(message) => serde_json::from_str(&message).ok(),
                _ => None,
            })
            .collect();
        assert_eq!(
            actions,
            vec![json!({
                "action": "contact_submit",
                "payload": {"email": "ops@example.com"},
                "sourceWidgetTitle": "Contact"
            })]
        );
    }

    #[test]
    fn diagnostics_log_is_bounded() {
        let (_tx, _sink, mut app) = app();
        for index in 0..(DIAGNOSTICS_CAPACITY + 5) {
            app.log_diagnostic(format!("entry {index}"));
        }
        assert_eq!(app.diagnostics_log.len(), DIAGNOSTICS_CAPACITY);
        assert!(app
            .diagnostics_log
            .front()
            .is_some_and(|entry| entry.ends_with("entry 5")));
    }
}
