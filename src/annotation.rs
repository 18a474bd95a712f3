use std::time::{SystemTime, UNIX_EPOCH};

use egui::Pos2;
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Rectangles drawn smaller than this (image pixels, either dimension) are
/// discarded instead of becoming annotations.
pub const MIN_DRAW_SIZE: f32 = 10.0;

/// Position inside a rectangle's 3x3 grid, 1..=9 with 5 = center. The
/// downstream automation framework clicks at this anchor when matching the
/// region's template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetPos(u8);

impl TargetPos {
    pub const CENTER: Self = Self(5);

    pub fn new(value: u8) -> Self {
        Self(value.clamp(1, 9))
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Anchor point inside `rect`, in the same space as the rect.
    pub fn anchor_in(self, rect: Rect) -> Pos2 {
        let col = (self.0 - 1) % 3;
        let row = (self.0 - 1) / 3;
        Pos2::new(
            rect.x + rect.width * (col as f32 + 0.5) / 3.0,
            rect.y + rect.height * (row as f32 + 0.5) / 3.0,
        )
    }
}

impl Default for TargetPos {
    fn default() -> Self {
        Self::CENTER
    }
}

/// A labeled rectangular region on a screenshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    pub label: String,
    pub rect: Rect,
    #[serde(default)]
    pub target_pos: TargetPos,
}

/// Partial update merged into an existing annotation by
/// [`AnnotationStore::update`]. Absent fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct AnnotationPatch {
    pub rect: Option<Rect>,
    pub label: Option<String>,
    pub target_pos: Option<TargetPos>,
}

/// Ordered annotation list for the currently open screenshot, plus the
/// selected id. The store knows nothing about undo; callers push history
/// snapshots after mutating.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    annotations: Vec<Annotation>,
    selected: Option<String>,
    next_seq: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Annotation> {
        let id = self.selected.as_deref()?;
        self.get(id)
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    /// Create an annotation for a completed draw gesture. Rectangles with
    /// either dimension under [`MIN_DRAW_SIZE`] are silently dropped.
    pub fn create(&mut self, rect: Rect) -> Option<&Annotation> {
        if rect.width < MIN_DRAW_SIZE || rect.height < MIN_DRAW_SIZE {
            return None;
        }
        let annotation = Annotation {
            id: self.fresh_id(),
            label: format!("Annotation {}", self.annotations.len() + 1),
            rect,
            target_pos: TargetPos::CENTER,
        };
        self.annotations.push(annotation);
        self.annotations.last()
    }

    /// Merge `patch` into the annotation with `id`. No-op if the id is
    /// unknown.
    pub fn update(&mut self, id: &str, patch: AnnotationPatch) {
        let Some(annotation) = self.annotations.iter_mut().find(|a| a.id == id) else {
            return;
        };
        if let Some(rect) = patch.rect {
            annotation.rect = rect;
        }
        if let Some(label) = patch.label {
            annotation.label = label;
        }
        if let Some(target_pos) = patch.target_pos {
            annotation.target_pos = target_pos;
        }
    }

    pub fn delete(&mut self, id: &str) {
        self.annotations.retain(|a| a.id != id);
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
    }

    pub fn select(&mut self, id: &str) {
        if self.get(id).is_some() {
            self.selected = Some(id.to_owned());
        }
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Topmost annotation containing `point`; last-created wins on overlap.
    pub fn hit_test(&self, point: Pos2) -> Option<&Annotation> {
        self.annotations.iter().rev().find(|a| a.rect.contains(point))
    }

    /// Deep copy of the current list, for history snapshots and persistence.
    pub fn snapshot(&self) -> Vec<Annotation> {
        self.annotations.clone()
    }

    /// Replace the whole list (undo/redo restore, load). Selection is cleared
    /// unless the selected id survives.
    pub fn restore(&mut self, annotations: Vec<Annotation>) {
        self.annotations = annotations;
        if let Some(id) = self.selected.clone() {
            if self.get(&id).is_none() {
                self.selected = None;
            }
        }
    }

    fn fresh_id(&mut self) -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = self.next_seq;
        self.next_seq += 1;
        format!("{millis}-{seq}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egui::Pos2;

    fn store_with(rects: &[Rect]) -> AnnotationStore {
        let mut store = AnnotationStore::new();
        for rect in rects {
            store.create(*rect).expect("rect above min size");
        }
        store
    }

    #[test]
    fn create_rejects_tiny_rects() {
        let mut store = AnnotationStore::new();
        assert!(store.create(Rect::new(0.0, 0.0, 9.9, 100.0)).is_none());
        assert!(store.create(Rect::new(0.0, 0.0, 100.0, 3.0)).is_none());
        assert_eq!(store.len(), 0);

        assert!(store.create(Rect::new(0.0, 0.0, 10.0, 10.0)).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn create_assigns_unique_ids_and_default_fields() {
        let mut store = store_with(&[
            Rect::new(0.0, 0.0, 20.0, 20.0),
            Rect::new(30.0, 30.0, 20.0, 20.0),
        ]);
        let ids: Vec<_> = store.annotations().iter().map(|a| a.id.clone()).collect();
        assert_ne!(ids[0], ids[1]);
        assert_eq!(store.annotations()[0].label, "Annotation 1");
        assert_eq!(store.annotations()[1].label, "Annotation 2");
        assert_eq!(store.annotations()[1].target_pos, TargetPos::CENTER);

        store.create(Rect::new(60.0, 60.0, 20.0, 20.0));
        assert_eq!(store.annotations()[2].label, "Annotation 3");
    }

    #[test]
    fn update_merges_partial_fields() {
        let mut store = store_with(&[Rect::new(0.0, 0.0, 20.0, 20.0)]);
        let id = store.annotations()[0].id.clone();

        store.update(
            &id,
            AnnotationPatch {
                label: Some("login button".into()),
                ..Default::default()
            },
        );
        assert_eq!(store.get(&id).unwrap().label, "login button");
        assert_eq!(store.get(&id).unwrap().rect, Rect::new(0.0, 0.0, 20.0, 20.0));

        store.update(
            &id,
            AnnotationPatch {
                target_pos: Some(TargetPos::new(1)),
                ..Default::default()
            },
        );
        let ann = store.get(&id).unwrap();
        assert_eq!(ann.label, "login button");
        assert_eq!(ann.target_pos, TargetPos::new(1));

        // Unknown id is a no-op, not an error.
        store.update("no-such-id", AnnotationPatch::default());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_clears_selection() {
        let mut store = store_with(&[Rect::new(0.0, 0.0, 20.0, 20.0)]);
        let id = store.annotations()[0].id.clone();
        store.select(&id);
        assert_eq!(store.selected_id(), Some(id.as_str()));

        store.delete(&id);
        assert!(store.is_empty());
        assert_eq!(store.selected_id(), None);
    }

    #[test]
    fn hit_test_prefers_last_created() {
        let store = store_with(&[
            Rect::new(0.0, 0.0, 100.0, 100.0),
            Rect::new(50.0, 50.0, 100.0, 100.0),
        ]);
        let top = store.hit_test(Pos2::new(75.0, 75.0)).unwrap();
        assert_eq!(top.label, "Annotation 2");
        let only = store.hit_test(Pos2::new(10.0, 10.0)).unwrap();
        assert_eq!(only.label, "Annotation 1");
        assert!(store.hit_test(Pos2::new(300.0, 300.0)).is_none());
    }

    #[test]
    fn target_pos_anchor_grid() {
        let rect = Rect::new(0.0, 0.0, 90.0, 90.0);
        assert_eq!(TargetPos::CENTER.anchor_in(rect), Pos2::new(45.0, 45.0));
        assert_eq!(TargetPos::new(1).anchor_in(rect), Pos2::new(15.0, 15.0));
        assert_eq!(TargetPos::new(9).anchor_in(rect), Pos2::new(75.0, 75.0));
        assert_eq!(TargetPos::new(6).anchor_in(rect), Pos2::new(75.0, 45.0));
    }

    #[test]
    fn target_pos_clamps_out_of_range() {
        assert_eq!(TargetPos::new(0).as_u8(), 1);
        assert_eq!(TargetPos::new(42).as_u8(), 9);
    }

    #[test]
    fn annotation_serde_uses_camel_case() {
        let ann = Annotation {
            id: "1700000000000-0".into(),
            label: "ok".into(),
            rect: Rect::new(1.0, 2.0, 30.0, 40.0),
            target_pos: TargetPos::new(7),
        };
        let json = serde_json::to_string(&ann).unwrap();
        assert!(json.contains("\"targetPos\":7"), "{json}");
        let back: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ann);
    }
}
