use crate::canvas::dimensions::{DimensionSynchronizer, SharedState};
use crate::canvas::hitl::{
    CallStatus, ConfirmationCorrelator, ConfirmationDecision, RequestOutcome, Resolver,
};
use crate::canvas::layout::GridLayout;
use crate::canvas::model::{
    CanvasDimensions, ContentBlock, Position, Size, WidgetKind, WidgetRecord,
};
use crate::canvas::store::{UpsertRequest, WidgetStore};
use crate::config::CanvasConfig;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

pub const STATE_VIEW_TITLE: &str = "Shared State";
const DEFAULT_CONFIRMATION_MESSAGE: &str = "The agent is waiting for your go-ahead.";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{tool}` requires a non-empty `{field}`")]
    MissingField { tool: String, field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderCardArgs {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub design: Option<Map<String, Value>>,
    #[serde(default, alias = "clearHistory")]
    pub clear_history: bool,
    #[serde(default)]
    pub dimensions: Option<Size>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct DeleteCardArgs {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ThemeColorArgs {
    #[serde(alias = "themeColor")]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeatherArgs {
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompanyInfo {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompanyInfoArgs {
    pub info: Vec<CompanyInfo>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ConfirmationArgs {
    #[serde(default)]
    pub message: Option<String>,
}

/// A decoded agent tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    SetThemeColor(ThemeColorArgs),
    RenderCard(RenderCardArgs),
    DeleteCard(DeleteCardArgs),
    RequestConfirmation(ConfirmationArgs),
    ShowStateView,
    GetWeather(WeatherArgs),
    ShowCompanyInfo(CompanyInfoArgs),
}

fn decode_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, DispatchError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|source| DispatchError::InvalidArguments {
        tool: tool.to_string(),
        source,
    })
}

impl ToolCall {
    /// Validates a raw tool call. Nothing reaches the store unless this succeeds.
    pub fn decode(name: &str, arguments: Value) -> Result<Self, DispatchError> {
        match name {
            "set_theme_color" | "setThemeColor" => {
                let args: ThemeColorArgs = decode_args(name, arguments)?;
                if args.color.trim().is_empty() {
                    return Err(DispatchError::MissingField {
                        tool: name.to_string(),
                        field: "color",
                    });
                }
                Ok(Self::SetThemeColor(args))
            }
            "render_card" | "render_ui" | "show_dynamic_card" => {
                Ok(Self::RenderCard(decode_args(name, arguments)?))
            }
            "delete_card" => Ok(Self::DeleteCard(decode_args(name, arguments)?)),
            "request_confirmation" | "go_to_moon" => {
                Ok(Self::RequestConfirmation(decode_args(name, arguments)?))
            }
            "show_state_view" | "show_proverbs_view" => Ok(Self::ShowStateView),
            "get_weather" => {
                let args: WeatherArgs = decode_args(name, arguments)?;
                if args.location.trim().is_empty() {
                    return Err(DispatchError::MissingField {
                        tool: name.to_string(),
                        field: "location",
                    });
                }
                Ok(Self::GetWeather(args))
            }
            "show_company_info" => Ok(Self::ShowCompanyInfo(decode_args(name, arguments)?)),
            other => Err(DispatchError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SetThemeColor(_) => "set_theme_color",
            Self::RenderCard(_) => "render_card",
            Self::DeleteCard(_) => "delete_card",
            Self::RequestConfirmation(_) => "request_confirmation",
            Self::ShowStateView => "show_state_view",
            Self::GetWeather(_) => "get_weather",
            Self::ShowCompanyInfo(_) => "show_company_info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The reply was delivered immediately.
    Completed(String),
    /// The reply is parked until the operator answers; the acknowledgment
    /// goes to the transcript.
    AwaitingOperator { acknowledgment: String },
    /// Observation that needs no reply (partial arguments, late status).
    Ignored,
}

/// Owns every piece of canvas state for the lifetime of one mounted canvas.
#[derive(Debug)]
pub struct CanvasEngine {
    store: WidgetStore,
    layout: GridLayout,
    hitl: ConfirmationCorrelator,
    dimensions: DimensionSynchronizer,
    shared_state: SharedState,
    theme_color: String,
}

impl CanvasEngine {
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            store: WidgetStore::new(config.initial_z, config.widget_width),
            layout: GridLayout::new(config.padding, config.fallback_height),
            hitl: ConfirmationCorrelator::new(),
            dimensions: DimensionSynchronizer::new(),
            shared_state: SharedState::default(),
            theme_color: config.theme_color.clone(),
        }
    }

    pub fn store(&self) -> &WidgetStore {
        &self.store
    }

    pub fn widgets(&self) -> &[WidgetRecord] {
        self.store.widgets()
    }

    pub fn theme_color(&self) -> &str {
        &self.theme_color
    }

    pub fn shared_state(&self) -> &SharedState {
        &self.shared_state
    }

    pub fn hitl(&self) -> &ConfirmationCorrelator {
        &self.hitl
    }

    pub fn published_dimensions(&self) -> Option<CanvasDimensions> {
        self.dimensions.last_sent()
    }

    pub fn dispatch(
        &mut self,
        call_id: &str,
        status: CallStatus,
        call: ToolCall,
        mut reply: Resolver,
    ) -> DispatchOutcome {
        let tool = call.name();
        let text = match call {
            ToolCall::RequestConfirmation(args) => {
                let message = args
                    .message
                    .filter(|message| !message.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CONFIRMATION_MESSAGE.to_string());
                return match self.hitl.request(
                    &mut self.store,
                    &self.layout,
                    call_id,
                    status,
                    &message,
                    reply,
                ) {
                    RequestOutcome::Parked | RequestOutcome::Refreshed => {
                        DispatchOutcome::AwaitingOperator {
                            acknowledgment: "Mission Control active on main screen.".to_string(),
                        }
                    }
                    RequestOutcome::AlreadyResolved => DispatchOutcome::Ignored,
                };
            }
            _ if status != CallStatus::Executing => {
                debug!(call_id, tool, status = status.as_str(), "non-executing observation skipped");
                return DispatchOutcome::Ignored;
            }
            ToolCall::SetThemeColor(args) => {
                self.theme_color = args.color.trim().to_string();
                format!("Theme color changed to {}.", self.theme_color)
            }
            ToolCall::RenderCard(args) => self.render_card(args),
            ToolCall::DeleteCard(args) => self.delete_card(args),
            ToolCall::ShowStateView => self.show_state_view(),
            ToolCall::GetWeather(args) => self.show_weather(args),
            ToolCall::ShowCompanyInfo(args) => self.show_company_info(args),
        };

        info!(call_id, tool, "tool call applied");
        reply.resolve(text.clone());
        DispatchOutcome::Completed(text)
    }

    fn render_card(&mut self, args: RenderCardArgs) -> String {
        let mut content = Map::new();
        content.insert(
            "content".to_string(),
            Value::Array(
                args.content
                    .iter()
                    .filter_map(|block| serde_json::to_value(block).ok())
                    .collect(),
            ),
        );
        if let Some(design) = args.design {
            content.insert("design".to_string(), Value::Object(design));
        }

        let title = args.title.clone();
        let mut request = UpsertRequest::new(WidgetKind::Card, args.title, content);
        request.id = args.id;
        if let Some(size) = args.dimensions {
            request = request.with_size(size);
        }
        if args.clear_history {
            request = request.replacing_all();
        }

        let evicted: Vec<String> = if request.full_replace {
            self.store
                .widgets()
                .iter()
                .map(|widget| widget.id.clone())
                .collect()
        } else {
            Vec::new()
        };
        let (id, _) = self.store.upsert(request, &self.layout);
        for evicted_id in evicted.iter().filter(|evicted_id| **evicted_id != id) {
            self.hitl
                .widget_closed(&mut self.store, &self.layout, evicted_id);
        }
        format!("UI card '{title}' rendered.")
    }

    fn delete_card(&mut self, args: DeleteCardArgs) -> String {
        match self.store.remove(args.id.as_deref(), args.title.as_deref()) {
            Some(removed) => {
                self.hitl
                    .widget_closed(&mut self.store, &self.layout, &removed);
                "Card deleted.".to_string()
            }
            None => "No matching card found.".to_string(),
        }
    }

    fn show_state_view(&mut self) -> String {
        let existing = self
            .store
            .find_kind(WidgetKind::StateView)
            .map(|widget| widget.id.clone());
        match existing {
            Some(id) => {
                self.store.focus(&id);
            }
            None => {
                self.store.upsert(
                    UpsertRequest::new(WidgetKind::StateView, STATE_VIEW_TITLE, Map::new()),
                    &self.layout,
                );
            }
        }
        "State view shown.".to_string()
    }

    fn show_weather(&mut self, args: WeatherArgs) -> String {
        let location = args.location.trim().to_string();
        let mut content = Map::new();
        content.insert("location".to_string(), Value::String(location.clone()));
        self.store.upsert(
            UpsertRequest::new(WidgetKind::Weather, format!("Weather: {location}"), content),
            &self.layout,
        );
        format!("Weather for {location} shown.")
    }

    fn show_company_info(&mut self, args: CompanyInfoArgs) -> String {
        let count = args.info.len();
        for item in args.info {
            let mut content = Map::new();
            content.insert("title".to_string(), Value::String(item.title.clone()));
            content.insert("description".to_string(), Value::String(item.description));
            let mut request = UpsertRequest::new(WidgetKind::Company, item.title, content);
            request.id = item.id.filter(|id| !id.trim().is_empty());
            self.store.upsert(request, &self.layout);
        }
        format!("{count} company card(s) shown.")
    }

    pub fn focus(&mut self, id: &str) -> bool {
        self.store.focus(id)
    }

    pub fn move_widget(&mut self, id: &str, position: Position) -> bool {
        self.store.move_to(id, position)
    }

    pub fn resize_widget(&mut self, id: &str, size: Size) -> bool {
        self.store.resize(id, size)
    }

    /// Operator closed a widget.
    pub fn close(&mut self, id: &str) -> bool {
        self.hitl.widget_closed(&mut self.store, &self.layout, id);
        self.store.remove(Some(id), None).is_some()
    }

    pub fn resolve_confirmation(&mut self, decision: ConfirmationDecision) -> bool {
        self.hitl.resolve(&mut self.store, &self.layout, decision)
    }

    /// Feeds one resize observation. Returns the shared state to publish when
    /// the sent dimensions changed.
    pub fn observe_canvas(&mut self, width: f32, height: f32) -> Option<Value> {
        self.layout.set_canvas_width(width);
        let published = self
            .dimensions
            .observe(CanvasDimensions::from_points(width, height))?;
        self.shared_state.apply_dimensions(published);
        Some(self.shared_state.to_value())
    }

    pub fn merge_agent_state(&mut self, update: Map<String, Value>) -> bool {
        self.shared_state.merge_from_agent(update) > 0
    }
}
