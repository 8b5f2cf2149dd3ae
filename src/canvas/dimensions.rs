use crate::canvas::model::CanvasDimensions;
use serde_json::{Map, Value};
use tracing::debug;

pub const CANVAS_WIDTH_KEY: &str = "canvas_width";
pub const CANVAS_HEIGHT_KEY: &str = "canvas_height";

/// Republishes the rendering surface size only when the value sent to the
/// agent would change.
#[derive(Debug, Clone, Default)]
pub struct DimensionSynchronizer {
    last_sent: Option<CanvasDimensions>,
}

impl DimensionSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sent(&self) -> Option<CanvasDimensions> {
        self.last_sent
    }

    /// Returns the dimensions to publish, if any.
    pub fn observe(&mut self, dimensions: CanvasDimensions) -> Option<CanvasDimensions> {
        if self.last_sent == Some(dimensions) {
            return None;
        }
        debug!(
            width = dimensions.width,
            height = dimensions.height,
            "canvas dimensions published"
        );
        self.last_sent = Some(dimensions);
        Some(dimensions)
    }
}

/// Agent-visible state shared in both directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharedState {
    values: Map<String, Value>,
    revision: u64,
}

impl SharedState {
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn apply_dimensions(&mut self, dimensions: CanvasDimensions) {
        self.values
            .insert(CANVAS_WIDTH_KEY.to_string(), Value::from(dimensions.width));
        self.values
            .insert(CANVAS_HEIGHT_KEY.to_string(), Value::from(dimensions.height));
        self.revision += 1;
    }

    /// Merges agent-pushed keys. The canvas size keys belong to the
    /// synchronizer and are skipped.
    pub fn merge_from_agent(&mut self, update: Map<String, Value>) -> usize {
        let mut applied = 0;
        for (key, value) in update {
            if key == CANVAS_WIDTH_KEY || key == CANVAS_HEIGHT_KEY {
                continue;
            }
            self.values.insert(key, value);
            applied += 1;
        }
        if applied > 0 {
            self.revision += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeated_identical_observations_publish_once() {
        let mut sync = DimensionSynchronizer::new();
        let size = CanvasDimensions::new(1200, 800);

        assert_eq!(sync.observe(size), Some(size));
        for _ in 0..5 {
            assert_eq!(sync.observe(size), None);
        }
    }

    #[test]
    fn returning_to_the_sent_value_does_not_republish() {
        let mut sync = DimensionSynchronizer::new();
        let original = CanvasDimensions::new(1200, 800);
        let wider = CanvasDimensions::new(1280, 800);

        assert!(sync.observe(original).is_some());
        assert_eq!(sync.observe(wider), Some(wider));
        assert_eq!(sync.observe(wider), None);
        assert_eq!(sync.observe(original), Some(original));
        assert_eq!(sync.last_sent(), Some(original));
    }

    #[test]
    fn shared_state_protects_canvas_keys() {
        let mut state = SharedState::default();
        state.apply_dimensions(CanvasDimensions::new(1024, 640));

        let update = match json!({"canvas_width": 1, "proverbs": ["a"]}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(state.merge_from_agent(update), 1);
        assert_eq!(
            state.to_value(),
            json!({"canvas_width": 1024, "canvas_height": 640, "proverbs": ["a"]})
        );
        assert_eq!(state.revision(), 2);
    }
}
