use crate::canvas::model::{ContentBlock, FontFamily};
use crate::theme::Theme;
use crate::ui::event::{ActionEvent, FieldKey, FieldValue};
use crate::ui::registry::{BlockContext, BlockRenderer};
use eframe::egui::{self, RichText};
use serde::Deserialize;
use serde_json::{Map, Value};

fn styled(text: impl Into<String>, cx: &BlockContext<'_>, size: f32) -> RichText {
    let text = RichText::new(text)
        .color(cx.theme.card_text(cx.design))
        .size(size * Theme::font_scale(cx.design));
    match cx.design.font_family {
        Some(FontFamily::Mono) => text.monospace(),
        _ => text,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub struct TextBlock;

impl BlockRenderer for TextBlock {
    fn render(
        &self,
        block: &ContentBlock,
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        _emit: &mut dyn FnMut(ActionEvent),
    ) {
        let value = block
            .str_field("value")
            .or_else(|| block.str_field("content"))
            .unwrap_or_default();
        if block.str_field("variant") == Some("header") {
            ui.label(styled(value, cx, 18.0).strong());
            ui.add(egui::Separator::default().spacing(cx.theme.spacing_4));
        } else {
            ui.label(styled(value, cx, 14.0));
        }
    }
}

/// Line-oriented subset: `#` headings, `-`/`*` bullets, `**` emphasis markers dropped.
pub struct MarkdownBlock;

impl BlockRenderer for MarkdownBlock {
    fn render(
        &self,
        block: &ContentBlock,
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        _emit: &mut dyn FnMut(ActionEvent),
    ) {
        let source = block
            .str_field("content")
            .or_else(|| block.str_field("value"))
            .unwrap_or_default();
        for line in source.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                ui.add_space(cx.theme.spacing_4);
                continue;
            }
            let plain = trimmed.replace("**", "");
            let heading_level = plain.chars().take_while(|ch| *ch == '#').count();
            if heading_level > 0 {
                let size = match heading_level {
                    1 => 20.0,
                    2 => 17.0,
                    _ => 15.0,
                };
                let text = plain.trim_start_matches('#').trim();
                ui.label(
                    styled(text, cx, size)
                        .strong()
                        .color(cx.theme.card_accent(cx.design)),
                );
            } else if let Some(item) = plain
                .strip_prefix("- ")
                .or_else(|| plain.strip_prefix("* "))
            {
                ui.label(styled(format!("• {item}"), cx, 14.0));
            } else {
                ui.label(styled(plain, cx, 14.0));
            }
        }
    }
}

/// Images are shown as a link plus caption; no image decoder is bundled.
pub struct ImageBlock;

impl BlockRenderer for ImageBlock {
    fn render(
        &self,
        block: &ContentBlock,
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        _emit: &mut dyn FnMut(ActionEvent),
    ) {
        let Some(url) = block.str_field("url") else {
            ui.label(RichText::new("Image without url").color(cx.theme.text_muted));
            return;
        };
        let caption = block
            .str_field("caption")
            .or_else(|| block.str_field("alt"))
            .unwrap_or("Card image");
        cx.theme.block_frame().show(ui, |ui| {
            ui.hyperlink_to(format!("🖼 {caption}"), url);
        });
        if let Some(caption) = block.str_field("caption") {
            ui.label(RichText::new(caption).italics().color(cx.theme.text_muted).size(12.0));
        }
    }
}

pub struct KeyValueBlock;

impl BlockRenderer for KeyValueBlock {
    fn render(
        &self,
        block: &ContentBlock,
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        _emit: &mut dyn FnMut(ActionEvent),
    ) {
        let cx: &BlockContext<'_> = cx;
        let empty = Map::new();
        let data = block
            .fields
            .get("data")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        let accent = cx.theme.card_accent(cx.design);
        let grid_id = egui::Id::new(("key_value", cx.widget_id, cx.block_index));
        let muted = cx.theme.text_muted;
        let theme = cx.theme.clone();
        theme.block_frame().show(ui, |ui| {
            egui::Grid::new(grid_id)
                .num_columns(2)
                .spacing([theme.spacing_12, theme.spacing_8])
                .show(ui, |ui| {
                    for (key, value) in data {
                        ui.label(RichText::new(key.to_uppercase()).color(muted).size(11.0));
                        ui.label(styled(value_to_text(value), cx, 14.0).color(accent));
                        ui.end_row();
                    }
                });
        });
    }
}

pub struct LinkBlock;

impl BlockRenderer for LinkBlock {
    fn render(
        &self,
        block: &ContentBlock,
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        _emit: &mut dyn FnMut(ActionEvent),
    ) {
        let Some(url) = block.str_field("url") else {
            return;
        };
        let label = block.str_field("label").unwrap_or(url);
        ui.separator();
        ui.hyperlink_to(
            RichText::new(format!("{label} ↗")).color(cx.theme.card_accent(cx.design)),
            url,
        );
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FlashcardItem {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    icon: Option<String>,
}

pub struct FlashcardsBlock;

impl FlashcardsBlock {
    pub fn columns_for(count: usize) -> usize {
        match count {
            0 | 1 => 1,
            2..=4 => 2,
            5..=8 => 4,
            _ => 3,
        }
    }
}

impl BlockRenderer for FlashcardsBlock {
    fn render(
        &self,
        block: &ContentBlock,
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        _emit: &mut dyn FnMut(ActionEvent),
    ) {
        let items: Vec<FlashcardItem> = block
            .fields
            .get("items")
            .and_then(|items| serde_json::from_value(items.clone()).ok())
            .unwrap_or_default();
        if items.is_empty() {
            return;
        }

        let cx: &BlockContext<'_> = cx;
        let accent = cx.theme.card_accent(cx.design);
        let theme = cx.theme.clone();
        let columns = Self::columns_for(items.len());
        ui.columns(columns, |column_uis| {
            for (index, item) in items.iter().enumerate() {
                let ui = &mut column_uis[index % columns];
                theme.block_frame().show(ui, |ui| {
                    let heading = match &item.icon {
                        Some(icon) => format!("{icon} {}", item.title),
                        None => item.title.clone(),
                    };
                    ui.label(styled(heading, cx, 15.0).strong().color(accent));
                    if !item.description.is_empty() {
                        ui.label(styled(item.description.replace("**", ""), cx, 13.0));
                    }
                    if let Some(url) = &item.url {
                        let label = item.label.as_deref().unwrap_or("Learn More");
                        ui.hyperlink_to(
                            RichText::new(label.to_uppercase()).color(accent).size(11.0),
                            url,
                        );
                    }
                });
            }
        });
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FormField {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    required: bool,
}

impl FormField {
    fn initial_value(&self) -> FieldValue {
        match self.kind.as_deref() {
            Some("number") => FieldValue::Number { value: 0.0 },
            Some("checkbox") => FieldValue::Checkbox { value: false },
            _ => FieldValue::Text {
                value: String::new(),
            },
        }
    }
}

/// Collects the submitted values keyed by field name. Returns the names of
/// required fields left blank instead when any are missing.
pub fn collect_form_payload(
    fields: &[(String, bool)],
    values: &dyn Fn(&str) -> Option<FieldValue>,
) -> Result<Value, Vec<String>> {
    let mut payload = Map::new();
    let mut missing = Vec::new();
    for (name, required) in fields {
        let value = values(name);
        let blank = value.as_ref().map_or(true, FieldValue::is_blank);
        if *required && blank {
            missing.push(name.clone());
            continue;
        }
        payload.insert(
            name.clone(),
            value.map(|value| value.to_json()).unwrap_or(Value::Null),
        );
    }
    if missing.is_empty() {
        Ok(Value::Object(payload))
    } else {
        Err(missing)
    }
}

pub struct FormBlock;

impl BlockRenderer for FormBlock {
    fn render(
        &self,
        block: &ContentBlock,
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        emit: &mut dyn FnMut(ActionEvent),
    ) {
        let fields: Vec<FormField> = block
            .fields
            .get("fields")
            .and_then(|fields| serde_json::from_value(fields.clone()).ok())
            .unwrap_or_default();
        let action = block.str_field("action").unwrap_or("form_submit").to_string();
        let submit_label = block.str_field("submitLabel").unwrap_or("Submit");
        let accent = cx.theme.card_accent(cx.design);
        let theme = cx.theme.clone();
        let widget_id = cx.widget_id.to_string();
        let block_index = cx.block_index;

        let mut submitted = false;
        theme.block_frame().show(ui, |ui| {
            for field in &fields {
                let key = FieldKey::new(&widget_id, block_index, &field.name);
                let input_id = key.input_id();
                let current = cx
                    .form_state
                    .entry(key)
                    .or_insert_with(|| field.initial_value());
                let label = field.label.clone().unwrap_or_else(|| field.name.clone());
                let label = if field.required {
                    format!("{label} *")
                } else {
                    label
                };
                match current {
                    FieldValue::Text { value } => {
                        ui.label(RichText::new(label).color(theme.text_muted).size(12.0));
                        let multiline = field.kind.as_deref() == Some("textarea");
                        let editor = if multiline {
                            egui::TextEdit::multiline(value)
                        } else {
                            egui::TextEdit::singleline(value)
                        };
                        let response = ui.add(editor.id(input_id).desired_width(f32::INFINITY));
                        // Enter in a single-line input submits the form.
                        if !multiline
                            && response.lost_focus()
                            && ui.input(|input| input.key_pressed(egui::Key::Enter))
                        {
                            submitted = true;
                        }
                    }
                    FieldValue::Number { value } => {
                        ui.label(RichText::new(label).color(theme.text_muted).size(12.0));
                        ui.add(egui::DragValue::new(value).speed(0.1));
                    }
                    FieldValue::Checkbox { value } => {
                        ui.checkbox(value, label);
                    }
                }
            }
            ui.add_space(theme.spacing_8);
            if ui.add(theme.primary_button(submit_label, accent)).clicked() {
                submitted = true;
            }
        });

        if !submitted {
            return;
        }
        let names: Vec<(String, bool)> = fields
            .iter()
            .map(|field| (field.name.clone(), field.required))
            .collect();
        let state = &*cx.form_state;
        let lookup = |name: &str| {
            state
                .get(&FieldKey::new(&widget_id, block_index, name))
                .cloned()
        };
        match collect_form_payload(&names, &lookup) {
            Ok(payload) => emit(ActionEvent {
                action,
                payload,
                source_widget_title: cx.widget_title.to_string(),
            }),
            Err(missing) => {
                tracing::debug!(widget_id = %widget_id, ?missing, "form submit blocked by required fields");
            }
        }
    }
}
