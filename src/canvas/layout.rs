use crate::canvas::model::{Position, Size};
use tracing::warn;

/// Row-major grid placement for newly created widgets.
///
/// The slot index is re-derived from the live widget count on every
/// insertion, so rows do not account for widgets of varying heights.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLayout {
    canvas_width: f32,
    padding: f32,
    fallback_height: f32,
}

impl GridLayout {
    pub fn new(padding: f32, fallback_height: f32) -> Self {
        Self {
            canvas_width: 0.0,
            padding: padding.max(0.0),
            fallback_height: fallback_height.max(1.0),
        }
    }

    pub fn canvas_width(&self) -> f32 {
        self.canvas_width
    }

    pub fn set_canvas_width(&mut self, width: f32) {
        self.canvas_width = width.max(0.0);
    }

    pub fn per_row(&self, widget_width: f32) -> usize {
        let stride = widget_width.max(0.0) + self.padding;
        if stride <= 0.0 {
            return 1;
        }
        ((self.canvas_width / stride).floor() as usize).max(1)
    }

    pub fn slot_position(&self, slot: usize, size: &Size) -> Position {
        let per_row = self.per_row(size.width);
        let col = slot % per_row;
        let row = slot / per_row;
        let height = size.height.fixed().unwrap_or(self.fallback_height);
        Position::new(
            col as f32 * (size.width + self.padding) + self.padding,
            row as f32 * (height + self.padding) + self.padding,
        )
    }

    /// Places the next widget at slot `live_count`. When that slot is already
    /// taken (a widget was removed earlier in the sequence) the following
    /// slots are tried in turn until one is free.
    ///
    /// At most `occupied.len() + 1` slots are tried. If every one of them
    /// collides, the widget overlaps at slot `live_count`.
    pub fn place(&self, size: &Size, live_count: usize, occupied: &[Position]) -> Position {
        (live_count..=live_count + occupied.len())
            .map(|slot| self.slot_position(slot, size))
            .find(|candidate| !occupied.contains(candidate))
            .unwrap_or_else(|| {
                warn!(live_count, "no free grid slot, overlapping");
                self.slot_position(live_count, size)
            })
    }
}
