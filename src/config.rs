use clap::Parser;

pub const DEFAULT_THEME_COLOR: &str = "#2563EB";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "coagent-canvas",
    about = "Agent-driven widget canvas. Tool calls arrive as JSON lines on stdin; replies leave on stdout."
)]
pub struct CanvasConfig {
    /// Width given to widgets created without explicit dimensions.
    #[arg(long, env = "COAGENT_CANVAS_WIDGET_WIDTH", default_value_t = 400.0)]
    pub widget_width: f32,

    /// Gap between grid slots and around the canvas edge.
    #[arg(long, env = "COAGENT_CANVAS_PADDING", default_value_t = 20.0)]
    pub padding: f32,

    /// Row height assumed for widgets whose height is "auto".
    #[arg(long, env = "COAGENT_CANVAS_FALLBACK_HEIGHT", default_value_t = 360.0)]
    pub fallback_height: f32,

    /// Starting value of the focus counter; the first widget gets one above it.
    #[arg(long, env = "COAGENT_CANVAS_INITIAL_Z", default_value_t = 10)]
    pub initial_z: u64,

    #[arg(long, env = "COAGENT_CANVAS_THEME_COLOR", default_value = DEFAULT_THEME_COLOR)]
    pub theme_color: String,

    /// Used when RUST_LOG is unset.
    #[arg(long, env = "COAGENT_CANVAS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            widget_width: 400.0,
            padding: 20.0,
            fallback_height: 360.0,
            initial_z: 10,
            theme_color: DEFAULT_THEME_COLOR.to_string(),
            log_level: "info".to_string(),
        }
    }
}
