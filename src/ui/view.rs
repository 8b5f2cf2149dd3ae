use crate::canvas::dispatch::CanvasEngine;
use crate::canvas::hitl::ConfirmationDecision;
use crate::canvas::model::{
    CardDesign, ContentBlock, Height, Position, Size, WidgetId, WidgetKind, WidgetRecord,
};
use crate::canvas::store::MIN_WIDGET_WIDTH;
use crate::theme::Theme;
use crate::ui::event::{ActionEvent, FormState};
use crate::ui::registry::{BlockContext, BlockRegistry};
use eframe::egui::{self, Frame, RichText, ScrollArea};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Operator gesture to apply to the engine after the frame is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorCommand {
    Focus(WidgetId),
    Move { id: WidgetId, position: Position },
    Resize { id: WidgetId, size: Size },
    Close(WidgetId),
    Confirm(ConfirmationDecision),
}

impl OperatorCommand {
    pub fn apply(self, engine: &mut CanvasEngine) -> bool {
        match self {
            Self::Focus(id) => engine.focus(&id),
            Self::Move { id, position } => engine.move_widget(&id, position),
            Self::Resize { id, size } => engine.resize_widget(&id, size),
            Self::Close(id) => engine.close(&id),
            Self::Confirm(decision) => engine.resolve_confirmation(decision),
        }
    }
}

#[derive(Debug, Default)]
pub struct ViewOutput {
    pub commands: Vec<OperatorCommand>,
    pub actions: Vec<ActionEvent>,
    pub canvas_size: Option<egui::Vec2>,
}

/// What the view last pushed into egui for one widget. A store value that
/// differs from this was changed by the engine and must be re-applied.
#[derive(Debug, Clone)]
struct AppliedWindow {
    position: Position,
    size: Size,
    generation: u64,
    last_rect: Option<egui::Rect>,
}

pub struct CanvasView {
    registry: BlockRegistry,
    form_state: FormState,
    applied: BTreeMap<WidgetId, AppliedWindow>,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self::new(BlockRegistry::with_builtin_blocks())
    }
}

impl CanvasView {
    pub fn new(registry: BlockRegistry) -> Self {
        debug!(tags = ?registry.tags().collect::<Vec<_>>(), "block renderers registered");
        Self {
            registry,
            form_state: FormState::new(),
            applied: BTreeMap::new(),
        }
    }

    pub fn show(&mut self, ctx: &egui::Context, engine: &CanvasEngine, theme: &Theme) -> ViewOutput {
        let mut output = ViewOutput::default();
        let empty = engine.store().is_empty();
        let fill = if empty {
            theme.canvas_fill_empty
        } else {
            theme.canvas_fill
        };

        let canvas_rect = egui::CentralPanel::default()
            .frame(Frame::new().fill(fill))
            .show(ctx, |ui| {
                if empty {
                    render_empty_state(ui, theme);
                }
                ui.max_rect()
            })
            .inner;
        output.canvas_size = Some(canvas_rect.size());

        self.prune(engine);

        let press = ctx.input(|input| {
            if input.pointer.any_pressed() {
                input.pointer.interact_pos()
            } else {
                None
            }
        });
        let pressed_layer = press.and_then(|pos| ctx.layer_id_at(pos));
        let pointer_down = ctx.input(|input| input.pointer.any_down());

        for record in engine.store().stacking_order() {
            self.show_widget(
                ctx,
                engine,
                theme,
                record,
                canvas_rect,
                pressed_layer,
                pointer_down,
                &mut output,
            );
        }
        output
    }

    #[allow(clippy::too_many_arguments)]
    fn show_widget(
        &mut self,
        ctx: &egui::Context,
        engine: &CanvasEngine,
        theme: &Theme,
        record: &WidgetRecord,
        canvas_rect: egui::Rect,
        pressed_layer: Option<egui::LayerId>,
        pointer_down: bool,
        output: &mut ViewOutput,
    ) {
        let Self {
            registry,
            form_state,
            applied,
        } = self;

        let mut reposition = false;
        let state = applied.entry(record.id.clone()).or_insert_with(|| {
            reposition = true;
            AppliedWindow {
                position: record.position,
                size: record.size,
                generation: 0,
                last_rect: None,
            }
        });
        if state.position != record.position {
            state.position = record.position;
            reposition = true;
        }
        if state.size != record.size {
            state.size = record.size;
            state.generation += 1;
            state.last_rect = None;
            reposition = true;
        }

        let origin = canvas_rect.min;
        let mut window = egui::Window::new(RichText::new(&record.title).strong())
            .id(egui::Id::new(("canvas_widget", &record.id, state.generation)))
            .collapsible(false)
            .resizable(true)
            .constrain_to(canvas_rect)
            .min_width(MIN_WIDGET_WIDTH.min(record.size.width))
            .default_width(record.size.width);
        if let Some(height) = record.size.height.fixed() {
            window = window.default_height(height).scroll([false, true]);
        }
        if reposition {
            window = window.current_pos(origin + egui::vec2(record.position.x, record.position.y));
        }

        let mut open = true;
        let mut actions = Vec::new();
        let mut confirm = None;
        let response = window.open(&mut open).show(ctx, |ui| match record.kind {
            WidgetKind::Card => {
                let design = CardDesign::from_content(&record.content);
                let blocks = ContentBlock::list_from_content(&record.content);
                theme.card_frame(&design).show(ui, |ui| {
                    let mut cx = BlockContext {
                        theme,
                        design: &design,
                        widget_id: &record.id,
                        widget_title: &record.title,
                        block_index: 0,
                        form_state,
                    };
                    registry.render_blocks(&blocks, ui, &mut cx, &mut |event| actions.push(event));
                });
            }
            WidgetKind::Confirmation => {
                confirm = render_confirmation(ui, record, engine, theme);
            }
            WidgetKind::StateView => render_state_view(ui, engine),
            WidgetKind::Weather => render_weather(ui, record, theme),
            WidgetKind::Company => render_company(ui, record, theme),
        });

        output.actions.extend(actions);
        if let Some(decision) = confirm {
            output.commands.push(OperatorCommand::Confirm(decision));
        }
        if !open {
            output.commands.push(OperatorCommand::Close(record.id.clone()));
            return;
        }
        let Some(response) = response else {
            return;
        };

        let layer = response.response.layer_id;
        if pressed_layer == Some(layer) {
            output.commands.push(OperatorCommand::Focus(record.id.clone()));
        }
        ctx.move_to_top(layer);

        let rect = response.response.rect;
        let placed = rect.min - origin;
        let moved = (placed.x - state.position.x).abs() > 0.5
            || (placed.y - state.position.y).abs() > 0.5;
        if !reposition && moved {
            state.position = Position::new(placed.x, placed.y);
            output.commands.push(OperatorCommand::Move {
                id: record.id.clone(),
                position: state.position,
            });
        }

        if let Some(last) = state.last_rect {
            let delta = rect.size() - last.size();
            if pointer_down && (delta.x.abs() > 0.5 || delta.y.abs() > 0.5) {
                let base_height = state.size.height.fixed().unwrap_or(last.height());
                let size = Size::new(
                    state.size.width + delta.x,
                    Height::Fixed(base_height + delta.y),
                );
                output.commands.push(OperatorCommand::Resize {
                    id: record.id.clone(),
                    size,
                });
            }
        }
        state.last_rect = Some(rect);
    }

    /// Drops per-widget view state for widgets no longer in the store.
    fn prune(&mut self, engine: &CanvasEngine) {
        let store = engine.store();
        self.applied.retain(|id, _| store.get(id).is_some());
        self.form_state
            .retain(|key, _| store.get(&key.widget_id).is_some());
    }

    /// Keeps the pending resize in the view state so the next frame does not
    /// treat the engine's clamped size as an external change.
    pub fn acknowledge(&mut self, command: &OperatorCommand, engine: &CanvasEngine) {
        if let OperatorCommand::Resize { id, .. } = command {
            if let (Some(state), Some(record)) = (self.applied.get_mut(id), engine.store().get(id)) {
                state.size = record.size;
            }
        }
    }
}

fn render_empty_state(ui: &mut egui::Ui, theme: &Theme) {
    ui.vertical_centered(|ui| {
        ui.add_space(ui.available_height() * 0.35);
        ui.label(
            RichText::new("CoAgent Canvas")
                .size(28.0)
                .strong()
                .color(theme.text_primary),
        );
        ui.label(
            RichText::new("Widgets rendered by the agent appear here.")
                .color(theme.text_muted),
        );
    });
}

fn render_confirmation(
    ui: &mut egui::Ui,
    record: &WidgetRecord,
    engine: &CanvasEngine,
    theme: &Theme,
) -> Option<ConfirmationDecision> {
    let message = content_str(record, "message");
    let status = record
        .content
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("executing");
    let decision = record.content.get("decision").and_then(Value::as_str);

    ui.label(RichText::new(message).size(16.0).color(theme.text_primary));
    ui.label(
        RichText::new(format!("Status: {status}"))
            .size(12.0)
            .color(theme.text_muted),
    );

    if let Some(decision) = decision {
        let color = if decision == "approved" {
            theme.success
        } else {
            theme.danger
        };
        ui.label(RichText::new(decision.to_uppercase()).strong().color(color));
        return None;
    }

    let awaiting = engine.hitl().is_awaiting_operator();
    let mut chosen = None;
    ui.add_space(theme.spacing_8);
    ui.horizontal(|ui| {
        if ui
            .add_enabled(awaiting, theme.primary_button("Approve", theme.success))
            .clicked()
        {
            chosen = Some(ConfirmationDecision::Approved);
        }
        if ui
            .add_enabled(awaiting, theme.primary_button("Decline", theme.danger))
            .clicked()
        {
            chosen = Some(ConfirmationDecision::Declined);
        }
    });
    chosen
}

fn content_str<'a>(record: &'a WidgetRecord, key: &str) -> &'a str {
    record
        .content
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn accent_rule(ui: &mut egui::Ui, theme: &Theme) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(48.0, 4.0), egui::Sense::hover());
    ui.painter().rect_filled(rect, 2.0, theme.accent);
}

fn render_weather(ui: &mut egui::Ui, record: &WidgetRecord, theme: &Theme) {
    theme.block_frame().show(ui, |ui| {
        ui.set_width(ui.available_width());
        accent_rule(ui, theme);
        ui.add_space(theme.spacing_8);
        ui.label(
            RichText::new(content_str(record, "location"))
                .size(24.0)
                .strong()
                .color(theme.text_primary),
        );
        ui.label(
            RichText::new("Conditions are reported by the agent.")
                .size(12.0)
                .color(theme.text_muted),
        );
    });
}

fn render_company(ui: &mut egui::Ui, record: &WidgetRecord, theme: &Theme) {
    theme.block_frame().show(ui, |ui| {
        ui.set_width(ui.available_width());
        accent_rule(ui, theme);
        ui.add_space(theme.spacing_12);
        ui.label(
            RichText::new(content_str(record, "title"))
                .size(20.0)
                .strong()
                .color(theme.text_primary),
        );
        ui.add_space(theme.spacing_4);
        ui.label(RichText::new(content_str(record, "description")).color(theme.text_muted));
    });
}

fn render_state_view(ui: &mut egui::Ui, engine: &CanvasEngine) {
    let state = engine.shared_state();
    let pretty = serde_json::to_string_pretty(&state.to_value())
        .unwrap_or_else(|err| format!("state not printable: {err}"));
    ui.label(
        RichText::new(format!(
            "revision {} · {} keys",
            state.revision(),
            state.values().len()
        ))
            .size(11.0)
            .weak(),
    );
    ScrollArea::vertical()
        .id_salt("shared_state_json")
        .max_height(320.0)
        .show(ui, |ui| {
            ui.monospace(pretty);
        });
}
