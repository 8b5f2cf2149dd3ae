use crate::canvas::model::{CardDesign, ContentBlock};
use crate::theme::Theme;
use crate::ui::blocks;
use crate::ui::event::{ActionEvent, FormState};
use eframe::egui::{self, RichText};
use std::collections::BTreeMap;
use tracing::warn;

/// Everything a block renderer may read besides the block itself.
pub struct BlockContext<'a> {
    pub theme: &'a Theme,
    pub design: &'a CardDesign,
    pub widget_id: &'a str,
    pub widget_title: &'a str,
    pub block_index: usize,
    pub form_state: &'a mut FormState,
}

pub trait BlockRenderer {
    fn render(
        &self,
        block: &ContentBlock,
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        emit: &mut dyn FnMut(ActionEvent),
    );
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    pub rendered: usize,
    pub unknown: Vec<String>,
}

/// Maps content block type tags to renderers.
#[derive(Default)]
pub struct BlockRegistry {
    renderers: BTreeMap<String, Box<dyn BlockRenderer>>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_blocks() -> Self {
        let mut registry = Self::new();
        registry.register("text", blocks::TextBlock);
        registry.register("markdown", blocks::MarkdownBlock);
        registry.register("image", blocks::ImageBlock);
        registry.register("key_value", blocks::KeyValueBlock);
        registry.register("link", blocks::LinkBlock);
        registry.register("flashcards", blocks::FlashcardsBlock);
        registry.register("form", blocks::FormBlock);
        registry
    }

    /// Registers `renderer` for `tag`, returning the renderer it replaced.
    pub fn register(
        &mut self,
        tag: impl Into<String>,
        renderer: impl BlockRenderer + 'static,
    ) -> Option<Box<dyn BlockRenderer>> {
        self.renderers.insert(tag.into(), Box::new(renderer))
    }

    pub fn lookup(&self, tag: &str) -> Option<&dyn BlockRenderer> {
        self.renderers.get(tag).map(|renderer| renderer.as_ref())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.renderers.keys().map(String::as_str)
    }

    pub fn render_blocks(
        &self,
        blocks: &[ContentBlock],
        ui: &mut egui::Ui,
        cx: &mut BlockContext<'_>,
        emit: &mut dyn FnMut(ActionEvent),
    ) -> RenderReport {
        let mut report = RenderReport::default();
        for (index, block) in blocks.iter().enumerate() {
            cx.block_index = index;
            match self.lookup(&block.kind) {
                Some(renderer) => {
                    renderer.render(block, ui, cx, emit);
                    report.rendered += 1;
                }
                None => {
                    render_unknown(block, ui, cx.theme);
                    report.unknown.push(block.kind.clone());
                }
            }
            ui.add_space(cx.theme.spacing_8);
        }
        if !report.unknown.is_empty() {
            warn!(
                widget_id = cx.widget_id,
                unknown = ?report.unknown,
                "content blocks without renderer shown as placeholders"
            );
        }
        report
    }
}

fn render_unknown(block: &ContentBlock, ui: &mut egui::Ui, theme: &Theme) {
    theme.placeholder_frame().show(ui, |ui| {
        ui.label(
            RichText::new(format!("Unknown block type `{}`", block.kind))
                .color(theme.warning)
                .size(12.0),
        );
    });
}
