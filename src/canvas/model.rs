use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

pub type WidgetId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    /// Agent-authored card whose content is a list of content blocks.
    Card,
    /// Operator confirmation surface owned by the HITL correlator.
    Confirmation,
    /// Read-only view over the agent-visible shared state.
    StateView,
    /// Built-in weather panel for one location.
    Weather,
    /// Built-in company profile: title and description.
    Company,
}

impl WidgetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Confirmation => "confirmation",
            Self::StateView => "state_view",
            Self::Weather => "weather",
            Self::Company => "company",
        }
    }

    /// Kinds the agent addresses by title when no id matches.
    pub fn matches_by_title(&self) -> bool {
        matches!(self, Self::Card | Self::Weather | Self::Company)
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Widget height is either fixed or left to the content.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Height {
    #[default]
    Auto,
    Fixed(f32),
}

impl Height {
    pub fn fixed(&self) -> Option<f32> {
        match self {
            Self::Auto => None,
            Self::Fixed(value) => Some(*value),
        }
    }
}

impl Serialize for Height {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Auto => serializer.serialize_str("auto"),
            Self::Fixed(value) => serializer.serialize_f32(*value),
        }
    }
}

impl<'de> Deserialize<'de> for Height {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        match raw {
            Value::Null => Ok(Self::Auto),
            Value::String(text) if text.eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            Value::Number(number) => number
                .as_f64()
                .map(|value| Self::Fixed(value as f32))
                .ok_or_else(|| serde::de::Error::custom("height is not a finite number")),
            other => Err(serde::de::Error::custom(format!(
                "height must be a number or \"auto\", got {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    #[serde(default)]
    pub height: Height,
}

impl Size {
    pub fn new(width: f32, height: Height) -> Self {
        Self { width, height }
    }

    /// Raises each fixed side to at least the given minimum. Non-finite sides
    /// fall back to the minimum.
    pub fn at_least(self, min_width: f32, min_height: f32) -> Self {
        let floor = |value: f32, min: f32| if value.is_finite() { value.max(min) } else { min };
        Self {
            width: floor(self.width, min_width),
            height: match self.height {
                Height::Auto => Height::Auto,
                Height::Fixed(height) => Height::Fixed(floor(height, min_height)),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetRecord {
    pub id: WidgetId,
    pub kind: WidgetKind,
    pub title: String,
    pub content: Map<String, Value>,
    pub z_order: u64,
    pub position: Position,
    pub size: Size,
}

/// One unit of agent-supplied structured content. Everything besides the
/// type tag is left for the registered renderer to interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContentBlock {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Reads the block list stored under a card's `content` key. Entries that
    /// are not objects with a string `type` are skipped.
    pub fn list_from_content(content: &Map<String, Value>) -> Vec<ContentBlock> {
        content
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| serde_json::from_value(block.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Rendering surface size in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CanvasDimensions {
    pub width: u32,
    pub height: u32,
}

impl CanvasDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Rounds a fractional surface size so sub-pixel jitter never counts as a change.
    pub fn from_points(width: f32, height: f32) -> Self {
        Self {
            width: width.max(0.0).round() as u32,
            height: height.max(0.0).round() as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    #[default]
    Sans,
    Serif,
    Mono,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

/// Per-card presentation hints supplied by the agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDesign {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<FontFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
}

impl CardDesign {
    /// Reads the design stored in a card's content, tolerating garbage.
    pub fn from_content(content: &Map<String, Value>) -> Self {
        content
            .get("design")
            .and_then(|design| serde_json::from_value(design.clone()).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn height_accepts_auto_and_numbers() {
        let size: Size = serde_json::from_value(json!({"width": 320, "height": "auto"}))
            .expect("auto height should parse");
        assert_eq!(size.height, Height::Auto);

        let size: Size = serde_json::from_value(json!({"width": 320, "height": 240}))
            .expect("numeric height should parse");
        assert_eq!(size.height, Height::Fixed(240.0));

        let size: Size =
            serde_json::from_value(json!({"width": 320})).expect("missing height is auto");
        assert_eq!(size.height, Height::Auto);
    }

    #[test]
    fn height_rejects_other_strings() {
        let result = serde_json::from_value::<Size>(json!({"width": 1, "height": "tall"}));
        assert!(result.is_err());
    }

    #[test]
    fn content_block_keeps_extra_fields() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "link", "url": "https://x.io", "label": "X"}))
                .expect("block should parse");
        assert_eq!(block.kind, "link");
        assert_eq!(block.str_field("url"), Some("https://x.io"));
        assert!(!block.fields.contains_key("type"));
    }

    #[test]
    fn block_list_skips_untyped_entries() {
        let mut content = Map::new();
        content.insert(
            "content".to_string(),
            json!([{"type": "text", "value": "hi"}, {"value": "no type"}, 7]),
        );
        let blocks = ContentBlock::list_from_content(&content);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, "text");
    }

    #[test]
    fn dimensions_round_fractional_points() {
        assert_eq!(
            CanvasDimensions::from_points(1199.6, 799.4),
            CanvasDimensions::new(1200, 799)
        );
        assert_eq!(
            CanvasDimensions::from_points(-3.0, 10.0),
            CanvasDimensions::new(0, 10)
        );
    }

    #[test]
    fn design_reads_camel_case_keys_and_ignores_garbage() {
        let mut content = Map::new();
        content.insert(
            "design".to_string(),
            json!({"themeColor": "#8B5CF6", "fontFamily": "mono"}),
        );
        let design = CardDesign::from_content(&content);
        assert_eq!(design.theme_color.as_deref(), Some("#8B5CF6"));
        assert_eq!(design.font_family, Some(FontFamily::Mono));

        content.insert("design".to_string(), json!("not an object"));
        assert_eq!(CardDesign::from_content(&content), CardDesign::default());
    }
}
