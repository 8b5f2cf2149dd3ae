use crate::canvas::layout::GridLayout;
use crate::canvas::model::{Height, Position, Size, WidgetId, WidgetKind, WidgetRecord};
use serde_json::{Map, Value};
use tracing::debug;

pub const MIN_WIDGET_WIDTH: f32 = 300.0;
pub const MIN_WIDGET_HEIGHT: f32 = 200.0;

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertRequest {
    pub kind: WidgetKind,
    pub title: String,
    pub content: Map<String, Value>,
    pub id: Option<WidgetId>,
    pub full_replace: bool,
    pub size: Option<Size>,
}

impl UpsertRequest {
    pub fn new(kind: WidgetKind, title: impl Into<String>, content: Map<String, Value>) -> Self {
        Self {
            kind,
            title: title.into(),
            content,
            id: None,
            full_replace: false,
            size: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<WidgetId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    pub fn replacing_all(mut self) -> Self {
        self.full_replace = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Authoritative collection of widget records, kept in creation order.
#[derive(Debug, Clone)]
pub struct WidgetStore {
    widgets: Vec<WidgetRecord>,
    highest_z: u64,
    default_width: f32,
}

impl WidgetStore {
    pub fn new(initial_z: u64, default_width: f32) -> Self {
        Self {
            widgets: Vec::new(),
            highest_z: initial_z,
            default_width: default_width.max(MIN_WIDGET_WIDTH),
        }
    }

    pub fn widgets(&self) -> &[WidgetRecord] {
        &self.widgets
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&WidgetRecord> {
        self.widgets.iter().find(|widget| widget.id == id)
    }

    pub fn find_kind(&self, kind: WidgetKind) -> Option<&WidgetRecord> {
        self.widgets.iter().find(|widget| widget.kind == kind)
    }

    /// Widget currently rendered above all others.
    pub fn focused(&self) -> Option<&WidgetRecord> {
        self.widgets.iter().max_by_key(|widget| widget.z_order)
    }

    /// Snapshot ordered bottom to top.
    pub fn stacking_order(&self) -> Vec<&WidgetRecord> {
        let mut ordered: Vec<&WidgetRecord> = self.widgets.iter().collect();
        ordered.sort_by_key(|widget| widget.z_order);
        ordered
    }

    fn next_z(&mut self) -> u64 {
        self.highest_z += 1;
        self.highest_z
    }

    fn resolve_target(&self, request: &UpsertRequest) -> Option<usize> {
        if let Some(id) = &request.id {
            if let Some(index) = self
                .widgets
                .iter()
                .position(|widget| &widget.id == id && widget.kind == request.kind)
            {
                return Some(index);
            }
        }
        if request.kind.matches_by_title() {
            return self
                .widgets
                .iter()
                .position(|widget| widget.kind == request.kind && widget.title == request.title);
        }
        None
    }

    fn generate_id(&self) -> WidgetId {
        loop {
            let mut candidate = uuid::Uuid::new_v4().simple().to_string();
            candidate.truncate(8);
            if self.get(&candidate).is_none() {
                return candidate;
            }
        }
    }

    pub fn upsert(&mut self, request: UpsertRequest, layout: &GridLayout) -> (WidgetId, UpsertOutcome) {
        let z_order = self.next_z();
        let requested_size = request
            .size
            .map(|size| size.at_least(MIN_WIDGET_WIDTH, MIN_WIDGET_HEIGHT));

        let (id, outcome) = match self.resolve_target(&request) {
            Some(index) => {
                let widget = &mut self.widgets[index];
                for (key, value) in request.content {
                    widget.content.insert(key, value);
                }
                widget.title = request.title;
                if let Some(size) = requested_size {
                    widget.size = size;
                }
                widget.z_order = z_order;
                (widget.id.clone(), UpsertOutcome::Updated)
            }
            None => {
                // An id held by a widget of another kind is not reused.
                let id = match request.id {
                    Some(id) if self.get(&id).is_none() => id,
                    _ => self.generate_id(),
                };
                let size =
                    requested_size.unwrap_or(Size::new(self.default_width, Height::Auto));
                let position = if request.full_replace {
                    Position::ORIGIN
                } else {
                    let occupied: Vec<Position> =
                        self.widgets.iter().map(|widget| widget.position).collect();
                    layout.place(&size, self.widgets.len(), &occupied)
                };
                self.widgets.push(WidgetRecord {
                    id: id.clone(),
                    kind: request.kind,
                    title: request.title,
                    content: request.content,
                    z_order,
                    position,
                    size,
                });
                (id, UpsertOutcome::Created)
            }
        };

        if request.full_replace {
            self.widgets.retain(|widget| widget.id == id);
            if let Some(widget) = self.widgets.first_mut() {
                widget.position = Position::ORIGIN;
            }
        }

        debug!(widget_id = %id, z_order, ?outcome, "widget upserted");
        (id, outcome)
    }

    /// Deletes by exact id, or else the first widget whose title contains
    /// `title` case-insensitively. Returns the removed id.
    pub fn remove(&mut self, id: Option<&str>, title: Option<&str>) -> Option<WidgetId> {
        let index = match (id, title) {
            (Some(id), _) => self.widgets.iter().position(|widget| widget.id == id),
            (None, Some(title)) => {
                let needle = title.to_lowercase();
                self.widgets
                    .iter()
                    .position(|widget| widget.title.to_lowercase().contains(&needle))
            }
            (None, None) => None,
        }?;

        let removed = self.widgets.remove(index);
        debug!(widget_id = %removed.id, "widget removed");
        Some(removed.id)
    }

    pub fn focus(&mut self, id: &str) -> bool {
        let Some(index) = self.widgets.iter().position(|widget| widget.id == id) else {
            return false;
        };
        let z_order = self.next_z();
        self.widgets[index].z_order = z_order;
        true
    }

    pub fn move_to(&mut self, id: &str, position: Position) -> bool {
        match self.widgets.iter_mut().find(|widget| widget.id == id) {
            Some(widget) => {
                widget.position = position;
                true
            }
            None => false,
        }
    }

    pub fn resize(&mut self, id: &str, size: Size) -> bool {
        let Some(widget) = self.widgets.iter_mut().find(|widget| widget.id == id) else {
            return false;
        };
        widget.size = size.at_least(MIN_WIDGET_WIDTH, MIN_WIDGET_HEIGHT);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture content must be an object"),
        }
    }

    fn store() -> (WidgetStore, GridLayout) {
        let mut layout = GridLayout::new(20.0, 360.0);
        layout.set_canvas_width(1200.0);
        (WidgetStore::new(10, 400.0), layout)
    }

    #[test]
    fn upsert_by_id_merges_content_field_by_field() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Weather", content(json!({"location": "Tokyo"})))
                .with_id("w1"),
            &layout,
        );
        let (_, outcome) = store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Weather", content(json!({"temp": "18C"})))
                .with_id("w1"),
            &layout,
        );

        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(store.len(), 1);
        let widget = store.get("w1").expect("w1 should exist");
        assert_eq!(
            Value::Object(widget.content.clone()),
            json!({"location": "Tokyo", "temp": "18C"})
        );
    }

    #[test]
    fn later_fields_win_and_omitted_fields_persist() {
        let (mut store, layout) = store();
        let calls = [
            json!({"a": 1, "b": 1}),
            json!({"b": 2}),
            json!({"c": 3}),
            json!({"a": 4}),
        ];
        for call in calls {
            store.upsert(
                UpsertRequest::new(WidgetKind::Card, "Merge", content(call)).with_id("m"),
                &layout,
            );
        }
        assert_eq!(store.len(), 1);
        assert_eq!(
            Value::Object(store.get("m").expect("m should exist").content.clone()),
            json!({"a": 4, "b": 2, "c": 3})
        );
    }

    #[test]
    fn cards_without_id_match_by_title() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Report", content(json!({"v": 1}))),
            &layout,
        );
        let (_, outcome) = store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Report", content(json!({"v": 2}))),
            &layout,
        );
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(store.len(), 1);
        assert_eq!(store.widgets()[0].content.get("v"), Some(&json!(2)));
    }

    #[test]
    fn title_match_only_applies_to_cards() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::StateView, "Status", Map::new()),
            &layout,
        );
        store.upsert(
            UpsertRequest::new(WidgetKind::StateView, "Status", Map::new()),
            &layout,
        );
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn update_replaces_title_and_size_and_brings_to_front() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "One", Map::new()).with_id("a"),
            &layout,
        );
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Two", Map::new()).with_id("b"),
            &layout,
        );
        let size = Size::new(320.0, Height::Fixed(240.0));
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Renamed", Map::new())
                .with_id("a")
                .with_size(size),
            &layout,
        );

        let widget = store.get("a").expect("a should exist");
        assert_eq!(widget.title, "Renamed");
        assert_eq!(widget.size, size);
        assert_eq!(store.focused().map(|w| w.id.as_str()), Some("a"));
    }

    #[test]
    fn full_replace_keeps_only_the_new_widget_at_origin() {
        let (mut store, layout) = store();
        for title in ["A", "B", "C"] {
            store.upsert(UpsertRequest::new(WidgetKind::Card, title, Map::new()), &layout);
        }
        let (id, _) = store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Fresh", Map::new()).replacing_all(),
            &layout,
        );
        assert_eq!(store.len(), 1);
        let widget = store.get(&id).expect("fresh widget should survive");
        assert_eq!(widget.position, Position::ORIGIN);
    }

    #[test]
    fn full_replace_of_existing_widget_moves_it_to_origin() {
        let (mut store, layout) = store();
        store.upsert(UpsertRequest::new(WidgetKind::Card, "A", Map::new()), &layout);
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "B", Map::new()).with_id("b"),
            &layout,
        );
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "B", Map::new())
                .with_id("b")
                .replacing_all(),
            &layout,
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store.widgets()[0].id, "b");
        assert_eq!(store.widgets()[0].position, Position::ORIGIN);
    }

    #[test]
    fn fourth_widget_lands_on_second_row() {
        let mut layout = GridLayout::new(20.0, 360.0);
        layout.set_canvas_width(1200.0);
        let mut store = WidgetStore::new(10, 320.0);
        let size = Size::new(320.0, Height::Auto);
        for index in 0..4 {
            store.upsert(
                UpsertRequest::new(WidgetKind::Card, format!("Card {index}"), Map::new())
                    .with_size(size),
                &layout,
            );
        }
        assert_eq!(store.widgets()[3].position, Position::new(20.0, 400.0));
    }

    #[test]
    fn grid_positions_stay_distinct_after_removal() {
        let (mut store, layout) = store();
        for index in 0..3 {
            store.upsert(
                UpsertRequest::new(WidgetKind::Card, format!("Card {index}"), Map::new())
                    .with_id(format!("c{index}")),
                &layout,
            );
        }
        store.remove(Some("c0"), None);
        store.upsert(UpsertRequest::new(WidgetKind::Card, "Late", Map::new()), &layout);

        let mut positions: Vec<(i64, i64)> = store
            .widgets()
            .iter()
            .map(|widget| (widget.position.x as i64, widget.position.y as i64))
            .collect();
        positions.sort();
        positions.dedup();
        assert_eq!(positions.len(), store.len());
    }

    #[test]
    fn remove_by_title_is_case_insensitive_substring_first_match() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Quarterly Report", Map::new()).with_id("q"),
            &layout,
        );
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Annual Report", Map::new()).with_id("y"),
            &layout,
        );

        assert_eq!(store.remove(None, Some("REPORT")), Some("q".to_string()));
        assert_eq!(store.widgets().len(), 1);
        assert_eq!(store.widgets()[0].id, "y");
    }

    #[test]
    fn remove_is_idempotent() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Keep", Map::new()).with_id("k"),
            &layout,
        );
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Drop", Map::new()).with_id("d"),
            &layout,
        );

        store.remove(Some("d"), None);
        let after_once: Vec<WidgetRecord> = store.widgets().to_vec();
        assert_eq!(store.remove(Some("d"), None), None);
        assert_eq!(store.widgets(), after_once.as_slice());
        assert_eq!(store.remove(None, None), None);
    }

    #[test]
    fn focus_gives_strictly_highest_z() {
        let (mut store, layout) = store();
        for id in ["a", "b", "c"] {
            store.upsert(
                UpsertRequest::new(WidgetKind::Card, id, Map::new()).with_id(id),
                &layout,
            );
        }
        assert!(store.focus("a"));
        let a = store.get("a").expect("a should exist").z_order;
        assert!(store
            .widgets()
            .iter()
            .filter(|widget| widget.id != "a")
            .all(|widget| widget.z_order < a));
        assert!(!store.focus("missing"));
    }

    #[test]
    fn first_widget_gets_z_above_initial_counter() {
        let (mut store, layout) = store();
        let (id, _) = store.upsert(UpsertRequest::new(WidgetKind::Card, "A", Map::new()), &layout);
        assert_eq!(store.get(&id).map(|widget| widget.z_order), Some(11));
        assert_eq!(id.len(), 8);
    }

    #[test]
    fn id_held_by_another_kind_creates_a_fresh_card() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::Confirmation, "Mission Control", Map::new())
                .with_id("shared"),
            &layout,
        );
        let (id, outcome) = store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Notes", content(json!({"content": []})))
                .with_id("shared"),
            &layout,
        );

        assert_eq!(outcome, UpsertOutcome::Created);
        assert_ne!(id, "shared");
        assert_eq!(store.len(), 2);
        let confirmation = store.get("shared").expect("confirmation should remain");
        assert_eq!(confirmation.kind, WidgetKind::Confirmation);
        assert!(confirmation.content.is_empty());
        assert_eq!(store.get(&id).map(|widget| widget.kind), Some(WidgetKind::Card));
    }

    #[test]
    fn agent_sizes_are_raised_to_the_minimum() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "Tiny", Map::new())
                .with_id("t")
                .with_size(Size::new(-5.0, Height::Fixed(f32::NAN))),
            &layout,
        );
        assert_eq!(
            store.get("t").map(|widget| widget.size),
            Some(Size::new(MIN_WIDGET_WIDTH, Height::Fixed(MIN_WIDGET_HEIGHT)))
        );
    }

    #[test]
    fn resize_clamps_to_minimum() {
        let (mut store, layout) = store();
        store.upsert(
            UpsertRequest::new(WidgetKind::Card, "A", Map::new()).with_id("a"),
            &layout,
        );
        assert!(store.resize("a", Size::new(120.0, Height::Fixed(50.0))));
        assert_eq!(
            store.get("a").map(|widget| widget.size),
            Some(Size::new(MIN_WIDGET_WIDTH, Height::Fixed(MIN_WIDGET_HEIGHT)))
        );
        assert!(store.move_to("a", Position::new(5.0, 6.0)));
        assert!(!store.move_to("b", Position::ORIGIN));
    }
}
