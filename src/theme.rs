use crate::canvas::model::{CardDesign, FontSize};
use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

#[derive(Debug, Clone)]
pub struct Theme {
    pub canvas_fill: Color32,
    pub canvas_fill_empty: Color32,
    pub widget_fill: Color32,
    pub block_fill: Color32,
    pub accent: Color32,
    pub success: Color32,
    pub danger: Color32,
    pub warning: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub text_on_accent: Color32,
    pub border_subtle: Color32,
    pub spacing_4: f32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub radius_8: u8,
    pub radius_12: u8,
    pub button_height: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            canvas_fill: Color32::from_rgb(0xF3, 0xF4, 0xF6),
            canvas_fill_empty: Color32::WHITE,
            widget_fill: Color32::from_rgba_unmultiplied(255, 255, 255, 235),
            block_fill: Color32::from_rgba_unmultiplied(255, 255, 255, 128),
            accent: Color32::from_rgb(0x25, 0x63, 0xEB),
            success: Color32::from_rgb(0x22, 0xC5, 0x5E),
            danger: Color32::from_rgb(0xEF, 0x44, 0x44),
            warning: Color32::from_rgb(0xF5, 0x9E, 0x0B),
            text_primary: Color32::from_rgb(0x1E, 0x29, 0x3B),
            text_muted: Color32::from_rgb(0x6B, 0x72, 0x80),
            text_on_accent: Color32::WHITE,
            border_subtle: Color32::from_rgb(0xE5, 0xE7, 0xEB),
            spacing_4: 4.0,
            spacing_8: 8.0,
            spacing_12: 12.0,
            radius_8: 8,
            radius_12: 12,
            button_height: 32.0,
        }
    }
}

/// Parses `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_hex_color(raw: &str) -> Option<Color32> {
    let hex = raw.trim().strip_prefix('#')?;
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    match hex.len() {
        3 => {
            let expand = |index: usize| channel(index..index + 1).map(|value| value * 17);
            Some(Color32::from_rgb(expand(0)?, expand(1)?, expand(2)?))
        }
        6 => Some(Color32::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        8 => Some(Color32::from_rgba_unmultiplied(
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
            channel(6..8)?,
        )),
        _ => None,
    }
}

impl Theme {
    /// Theme with the process-wide accent; unparseable colors keep the default.
    pub fn with_accent(color: &str) -> Self {
        let mut theme = Self::default();
        if let Some(accent) = parse_hex_color(color) {
            theme.accent = accent;
        }
        theme
    }

    pub fn card_accent(&self, design: &CardDesign) -> Color32 {
        design
            .theme_color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(self.accent)
    }

    pub fn card_text(&self, design: &CardDesign) -> Color32 {
        design
            .font_color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(self.text_primary)
    }

    pub fn font_scale(design: &CardDesign) -> f32 {
        match design.font_size.unwrap_or_default() {
            FontSize::Small => 0.875,
            FontSize::Medium => 1.0,
            FontSize::Large => 1.125,
        }
    }

    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::light();
        visuals.panel_fill = self.canvas_fill;
        visuals.window_fill = self.widget_fill;
        visuals.window_stroke = Stroke::new(1.0, self.border_subtle);
        visuals.window_corner_radius = CornerRadius::same(self.radius_12);
        visuals.window_shadow = egui::epaint::Shadow {
            offset: [0, 20],
            blur: 60,
            spread: 0,
            color: Color32::from_rgba_unmultiplied(0, 0, 0, 38),
        };
        visuals.hyperlink_color = self.accent;
        visuals.selection.bg_fill = self.accent;

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 8.0);
        style.spacing.button_padding = egui::vec2(12.0, 6.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(18.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(12.0));
        ctx.set_style(style);
    }

    pub fn block_frame(&self) -> Frame {
        Frame::new()
            .fill(self.block_fill)
            .stroke(Stroke::new(1.0, self.border_subtle))
            .inner_margin(Margin::same(self.spacing_12 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
    }

    pub fn placeholder_frame(&self) -> Frame {
        Frame::new()
            .fill(Color32::from_rgba_unmultiplied(0xF5, 0x9E, 0x0B, 24))
            .stroke(Stroke::new(1.0, self.warning))
            .inner_margin(Margin::same(self.spacing_8 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
    }

    pub fn card_frame(&self, design: &CardDesign) -> Frame {
        let fill = design
            .background_color
            .as_deref()
            .and_then(parse_hex_color)
            .unwrap_or(Color32::TRANSPARENT);
        Frame::new()
            .fill(fill)
            .inner_margin(Margin::same(self.spacing_8 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
    }

    pub fn primary_button(&self, label: &str, accent: Color32) -> egui::Button<'static> {
        egui::Button::new(egui::RichText::new(label.to_string()).color(self.text_on_accent))
            .fill(accent)
            .corner_radius(CornerRadius::same(self.radius_8))
            .min_size(egui::vec2(0.0, self.button_height))
    }
}
