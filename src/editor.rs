use egui::{CursorIcon, Pos2, Vec2};
use log::debug;

use crate::annotation::{Annotation, AnnotationPatch, AnnotationStore, TargetPos};
use crate::geometry::{Rect, ViewState, WHEEL_ZOOM_IN, WHEEL_ZOOM_OUT};
use crate::history::History;

/// Resize never shrinks a dimension below this (image pixels); the opposite
/// edge stays fixed.
pub const MIN_RESIZE_SIZE: f32 = 20.0;

/// Handle hit boxes are this many screen pixels around the handle anchor,
/// independent of zoom.
pub const HANDLE_HIT_TOLERANCE: f32 = 10.0;

/// One of the 8 resize hit-regions on a selected annotation: 4 corners plus
/// 4 edge midpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handle {
    NorthWest,
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::NorthWest,
        Handle::North,
        Handle::NorthEast,
        Handle::East,
        Handle::SouthEast,
        Handle::South,
        Handle::SouthWest,
        Handle::West,
    ];

    /// The handle's anchor point on `rect`, in the rect's own space.
    pub fn anchor(self, rect: Rect) -> Pos2 {
        let cx = rect.x + rect.width * 0.5;
        let cy = rect.y + rect.height * 0.5;
        match self {
            Handle::NorthWest => Pos2::new(rect.x, rect.y),
            Handle::North => Pos2::new(cx, rect.y),
            Handle::NorthEast => Pos2::new(rect.right(), rect.y),
            Handle::East => Pos2::new(rect.right(), cy),
            Handle::SouthEast => Pos2::new(rect.right(), rect.bottom()),
            Handle::South => Pos2::new(cx, rect.bottom()),
            Handle::SouthWest => Pos2::new(rect.x, rect.bottom()),
            Handle::West => Pos2::new(rect.x, cy),
        }
    }

    fn moves_north(self) -> bool {
        matches!(self, Handle::NorthWest | Handle::North | Handle::NorthEast)
    }

    fn moves_south(self) -> bool {
        matches!(self, Handle::SouthWest | Handle::South | Handle::SouthEast)
    }

    fn moves_west(self) -> bool {
        matches!(self, Handle::NorthWest | Handle::West | Handle::SouthWest)
    }

    fn moves_east(self) -> bool {
        matches!(self, Handle::NorthEast | Handle::East | Handle::SouthEast)
    }

    /// Recompute the edges named by this handle from `original` plus an
    /// image-space drag delta. Each dimension is clamped to
    /// [`MIN_RESIZE_SIZE`] and the opposite edge stays fixed.
    pub fn resize(self, original: Rect, delta: Vec2) -> Rect {
        let mut rect = original;
        if self.moves_west() {
            rect.x = (original.x + delta.x).min(original.right() - MIN_RESIZE_SIZE);
            rect.width = original.right() - rect.x;
        }
        if self.moves_east() {
            rect.width = (original.width + delta.x).max(MIN_RESIZE_SIZE);
        }
        if self.moves_north() {
            rect.y = (original.y + delta.y).min(original.bottom() - MIN_RESIZE_SIZE);
            rect.height = original.bottom() - rect.y;
        }
        if self.moves_south() {
            rect.height = (original.height + delta.y).max(MIN_RESIZE_SIZE);
        }
        rect
    }

    pub fn cursor(self) -> CursorIcon {
        match self {
            Handle::North | Handle::South => CursorIcon::ResizeVertical,
            Handle::East | Handle::West => CursorIcon::ResizeHorizontal,
            Handle::NorthEast | Handle::SouthWest => CursorIcon::ResizeNeSw,
            Handle::NorthWest | Handle::SouthEast => CursorIcon::ResizeNwSe,
        }
    }
}

/// Current interaction mode. Long-lived per editing session; every gesture
/// starts and ends in `Idle`.
#[derive(Clone, Debug, PartialEq)]
pub enum Mode {
    Idle,
    Drawing {
        start: Pos2,
        preview: Rect,
    },
    Moving {
        id: String,
        start: Pos2,
        original: Rect,
    },
    Resizing {
        id: String,
        handle: Handle,
        start: Pos2,
        original: Rect,
    },
    Panning {
        start_screen: Pos2,
        original_offset: Vec2,
    },
}

/// The pointer-driven controller for one open screenshot: owns the annotation
/// store, the undo history, and the pan/zoom view, and routes pointer and
/// keyboard events to the handler for the current mode.
pub struct Editor {
    pub store: AnnotationStore,
    pub history: History,
    pub view: ViewState,
    pub hovered: Option<String>,
    source_size: Vec2,
    mode: Mode,
    pan_armed: bool,
}

impl Editor {
    pub fn new(annotations: Vec<Annotation>, source_size: Vec2) -> Self {
        let mut store = AnnotationStore::new();
        store.restore(annotations);
        let history = History::new(store.snapshot());
        Self {
            store,
            history,
            view: ViewState::default(),
            hovered: None,
            source_size,
            mode: Mode::Idle,
            pan_armed: false,
        }
    }

    pub fn source_size(&self) -> Vec2 {
        self.source_size
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn preview_rect(&self) -> Option<Rect> {
        match &self.mode {
            Mode::Drawing { preview, .. } => Some(*preview),
            _ => None,
        }
    }

    /// Replace the whole annotation set and restart history from it. Used
    /// after a version rollback.
    pub fn reset_from(&mut self, annotations: Vec<Annotation>) {
        self.store.restore(annotations);
        self.store.deselect();
        self.history.reset(self.store.snapshot());
        self.hovered = None;
        self.mode = Mode::Idle;
    }

    pub fn reset_view(&mut self) {
        self.view = ViewState::default();
    }

    /// Space arms pan mode for the next pointer-down; releasing space ends an
    /// in-flight pan.
    pub fn set_pan_armed(&mut self, armed: bool) {
        self.pan_armed = armed;
        if !armed && matches!(self.mode, Mode::Panning { .. }) {
            self.mode = Mode::Idle;
        }
    }

    pub fn pan_armed(&self) -> bool {
        self.pan_armed
    }

    fn to_image(&self, screen: Pos2, canvas_center: Pos2) -> Pos2 {
        self.view.to_image(screen, canvas_center, self.source_size)
    }

    /// Which resize handle of the selected annotation (if any) is under the
    /// screen point. Tolerance is fixed in screen space, independent of zoom.
    pub fn handle_at(&self, screen: Pos2, canvas_center: Pos2) -> Option<Handle> {
        let selected = self.store.selected()?;
        for handle in Handle::ALL {
            let anchor = self.view.to_screen(
                handle.anchor(selected.rect),
                canvas_center,
                self.source_size,
            );
            if (screen.x - anchor.x).abs() <= HANDLE_HIT_TOLERANCE
                && (screen.y - anchor.y).abs() <= HANDLE_HIT_TOLERANCE
            {
                return Some(handle);
            }
        }
        None
    }

    pub fn pointer_down(&mut self, screen: Pos2, canvas_center: Pos2) {
        if !matches!(self.mode, Mode::Idle) {
            return;
        }

        if self.pan_armed {
            self.mode = Mode::Panning {
                start_screen: screen,
                original_offset: self.view.offset,
            };
            return;
        }

        let image_pos = self.to_image(screen, canvas_center);

        if let Some(handle) = self.handle_at(screen, canvas_center) {
            // handle_at only returns Some when a selection exists
            if let Some(selected) = self.store.selected() {
                self.mode = Mode::Resizing {
                    id: selected.id.clone(),
                    handle,
                    start: image_pos,
                    original: selected.rect,
                };
                return;
            }
        }

        if let Some(hit) = self.store.hit_test(image_pos) {
            let id = hit.id.clone();
            let original = hit.rect;
            self.store.select(&id);
            self.mode = Mode::Moving {
                id,
                start: image_pos,
                original,
            };
            return;
        }

        self.store.deselect();
        self.mode = Mode::Drawing {
            start: image_pos,
            preview: Rect::new(image_pos.x, image_pos.y, 0.0, 0.0),
        };
    }

    pub fn pointer_move(&mut self, screen: Pos2, canvas_center: Pos2) {
        match self.mode.clone() {
            Mode::Idle => {
                let image_pos = self.to_image(screen, canvas_center);
                self.hovered = self.store.hit_test(image_pos).map(|a| a.id.clone());
            }
            Mode::Panning {
                start_screen,
                original_offset,
            } => {
                self.view.offset = original_offset + (screen - start_screen);
            }
            Mode::Drawing { start, .. } => {
                let image_pos = self.to_image(screen, canvas_center);
                self.mode = Mode::Drawing {
                    start,
                    preview: Rect::from_drag(start, image_pos),
                };
            }
            Mode::Moving { id, start, original } => {
                let image_pos = self.to_image(screen, canvas_center);
                let rect = original.translated(image_pos - start);
                self.store.update(
                    &id,
                    AnnotationPatch {
                        rect: Some(rect),
                        ..Default::default()
                    },
                );
            }
            Mode::Resizing {
                id,
                handle,
                start,
                original,
            } => {
                let image_pos = self.to_image(screen, canvas_center);
                let rect = handle.resize(original, image_pos - start);
                self.store.update(
                    &id,
                    AnnotationPatch {
                        rect: Some(rect),
                        ..Default::default()
                    },
                );
            }
        }
    }

    /// Pointer left the canvas. Hover must not survive on panel-space
    /// coordinates; an in-flight gesture keeps tracking.
    pub fn pointer_exited(&mut self) {
        if matches!(self.mode, Mode::Idle) {
            self.hovered = None;
        }
    }

    /// Finish the current gesture. Returns true when an edit was committed
    /// (history pushed) and the annotation set should be handed to
    /// persistence.
    pub fn pointer_up(&mut self) -> bool {
        let mode = std::mem::replace(&mut self.mode, Mode::Idle);
        match mode {
            Mode::Idle | Mode::Panning { .. } => false,
            Mode::Drawing { preview, .. } => {
                let Some(created) = self.store.create(preview) else {
                    // Under the minimum size: discarded silently.
                    return false;
                };
                let id = created.id.clone();
                self.store.select(&id);
                debug!("created annotation {id} at {preview:?}");
                self.history.push(self.store.snapshot());
                true
            }
            Mode::Moving { id, original, .. } | Mode::Resizing { id, original, .. } => {
                let unchanged = self.store.get(&id).map(|a| a.rect) == Some(original);
                if unchanged {
                    return false;
                }
                self.history.push(self.store.snapshot());
                true
            }
        }
    }

    /// One wheel tick: 1.1 in / 0.9 out, multiplicative, zoom-to-cursor.
    pub fn wheel_zoom(&mut self, cursor: Pos2, canvas_center: Pos2, scroll_y: f32) {
        if scroll_y == 0.0 {
            return;
        }
        let factor = if scroll_y > 0.0 {
            WHEEL_ZOOM_IN
        } else {
            WHEEL_ZOOM_OUT
        };
        self.view = self.view.zoomed_at(cursor, canvas_center, factor);
    }

    /// Returns true if the annotation set changed.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.store.restore(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.store.restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Delete the selected annotation; true when something was deleted.
    pub fn delete_selected(&mut self) -> bool {
        let Some(id) = self.store.selected_id().map(str::to_owned) else {
            return false;
        };
        self.store.delete(&id);
        self.history.push(self.store.snapshot());
        true
    }

    /// Live label edit: updates the store without a history entry. The app
    /// commits once editing finishes (see [`Editor::commit_selected_edit`]).
    pub fn rename_selected(&mut self, label: String) {
        let Some(id) = self.store.selected_id().map(str::to_owned) else {
            return;
        };
        self.store.update(
            &id,
            AnnotationPatch {
                label: Some(label),
                ..Default::default()
            },
        );
    }

    pub fn set_target_pos_selected(&mut self, target_pos: TargetPos) -> bool {
        let Some(id) = self.store.selected_id().map(str::to_owned) else {
            return false;
        };
        if self.store.get(&id).map(|a| a.target_pos) == Some(target_pos) {
            return false;
        }
        self.store.update(
            &id,
            AnnotationPatch {
                target_pos: Some(target_pos),
                ..Default::default()
            },
        );
        self.history.push(self.store.snapshot());
        true
    }

    /// Commit a finished in-place edit (label rename) as one history entry.
    /// No-op when the store matches the current history snapshot.
    pub fn commit_selected_edit(&mut self) -> bool {
        let snapshot = self.store.snapshot();
        if self.history.current() == snapshot.as_slice() {
            return false;
        }
        self.history.push(snapshot);
        true
    }

    /// Cursor shape for the current pointer position.
    pub fn cursor_icon(&self, screen: Pos2, canvas_center: Pos2) -> CursorIcon {
        if matches!(self.mode, Mode::Panning { .. }) {
            return CursorIcon::Grabbing;
        }
        if self.pan_armed {
            return CursorIcon::Grab;
        }
        match &self.mode {
            Mode::Moving { .. } => CursorIcon::Move,
            Mode::Resizing { handle, .. } => handle.cursor(),
            _ => {
                if let Some(handle) = self.handle_at(screen, canvas_center) {
                    handle.cursor()
                } else {
                    CursorIcon::Crosshair
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // With scale 1, zero offset, and the canvas center at half the source
    // size, screen and image coordinates coincide.
    const SOURCE: Vec2 = Vec2::new(600.0, 600.0);
    const CENTER: Pos2 = Pos2::new(300.0, 300.0);

    fn editor_with(rects: &[Rect]) -> Editor {
        let mut editor = Editor::new(Vec::new(), SOURCE);
        for rect in rects {
            editor.store.create(*rect).expect("rect above min size");
        }
        editor.history.reset(editor.store.snapshot());
        editor
    }

    fn drag(editor: &mut Editor, from: Pos2, to: Pos2) -> bool {
        editor.pointer_down(from, CENTER);
        editor.pointer_move(to, CENTER);
        editor.pointer_up()
    }

    #[test]
    fn draw_gesture_creates_normalized_rect() {
        let mut editor = editor_with(&[]);
        let committed = drag(&mut editor, Pos2::new(100.0, 100.0), Pos2::new(40.0, 30.0));
        assert!(committed);
        assert_eq!(editor.store.len(), 1);
        let ann = &editor.store.annotations()[0];
        assert_eq!(ann.rect, Rect::new(40.0, 30.0, 60.0, 70.0));
        // New annotation is selected.
        assert_eq!(editor.store.selected_id(), Some(ann.id.as_str()));
        assert!(editor.history.can_undo());
    }

    #[test]
    fn tiny_draw_is_discarded() {
        let mut editor = editor_with(&[]);
        let committed = drag(&mut editor, Pos2::new(100.0, 100.0), Pos2::new(105.0, 104.0));
        assert!(!committed);
        assert!(editor.store.is_empty());
        assert!(!editor.history.can_undo());
    }

    #[test]
    fn click_inside_annotation_selects_and_moves() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        let committed = drag(&mut editor, Pos2::new(100.0, 100.0), Pos2::new(130.0, 90.0));
        assert!(committed);
        let ann = &editor.store.annotations()[0];
        assert_eq!(ann.rect, Rect::new(80.0, 40.0, 100.0, 100.0));
        assert_eq!(editor.store.selected_id(), Some(ann.id.as_str()));
    }

    #[test]
    fn zero_delta_move_commits_nothing() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        let committed = drag(&mut editor, Pos2::new(100.0, 100.0), Pos2::new(100.0, 100.0));
        assert!(!committed);
        assert!(!editor.history.can_undo());
    }

    #[test]
    fn resize_se_keeps_opposite_corner_fixed() {
        assert_eq!(
            Handle::SouthEast.resize(Rect::new(10.0, 10.0, 50.0, 50.0), Vec2::new(20.0, 5.0)),
            Rect::new(10.0, 10.0, 70.0, 55.0)
        );
    }

    #[test]
    fn resize_nw_moves_both_adjacent_edges() {
        assert_eq!(
            Handle::NorthWest.resize(Rect::new(10.0, 10.0, 50.0, 50.0), Vec2::new(10.0, 10.0)),
            Rect::new(20.0, 20.0, 40.0, 40.0)
        );
    }

    #[test]
    fn resize_clamps_to_minimum_size() {
        let resized =
            Handle::East.resize(Rect::new(0.0, 0.0, 100.0, 100.0), Vec2::new(-200.0, 0.0));
        assert_eq!(resized.width, MIN_RESIZE_SIZE);
        assert_eq!(resized.x, 0.0);

        let resized =
            Handle::North.resize(Rect::new(0.0, 0.0, 100.0, 100.0), Vec2::new(0.0, 500.0));
        assert_eq!(resized.height, MIN_RESIZE_SIZE);
        assert_eq!(resized.bottom(), 100.0);
    }

    #[test]
    fn resize_gesture_via_handle_hit() {
        let mut editor = editor_with(&[Rect::new(100.0, 100.0, 100.0, 100.0)]);
        let id = editor.store.annotations()[0].id.clone();
        editor.store.select(&id);

        // Grab the south-east corner (within tolerance) and drag it out.
        editor.pointer_down(Pos2::new(205.0, 203.0), CENTER);
        assert!(matches!(
            editor.mode(),
            Mode::Resizing {
                handle: Handle::SouthEast,
                ..
            }
        ));
        editor.pointer_move(Pos2::new(245.0, 233.0), CENTER);
        assert!(editor.pointer_up());
        assert_eq!(
            editor.store.get(&id).unwrap().rect,
            Rect::new(100.0, 100.0, 140.0, 130.0)
        );
    }

    #[test]
    fn pan_translates_offset_and_commits_nothing() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        editor.set_pan_armed(true);
        editor.pointer_down(Pos2::new(100.0, 100.0), CENTER);
        assert!(matches!(editor.mode(), Mode::Panning { .. }));
        editor.pointer_move(Pos2::new(140.0, 70.0), CENTER);
        assert_eq!(editor.view.offset, Vec2::new(40.0, -30.0));
        assert!(!editor.pointer_up());
        assert!(!editor.history.can_undo());
        // Annotation untouched.
        assert_eq!(
            editor.store.annotations()[0].rect,
            Rect::new(50.0, 50.0, 100.0, 100.0)
        );
    }

    #[test]
    fn releasing_space_ends_pan() {
        let mut editor = editor_with(&[]);
        editor.set_pan_armed(true);
        editor.pointer_down(Pos2::new(100.0, 100.0), CENTER);
        editor.set_pan_armed(false);
        assert_eq!(*editor.mode(), Mode::Idle);
    }

    #[test]
    fn hover_updates_in_idle_without_mutation() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        let id = editor.store.annotations()[0].id.clone();
        editor.pointer_move(Pos2::new(100.0, 100.0), CENTER);
        assert_eq!(editor.hovered.as_deref(), Some(id.as_str()));
        editor.pointer_move(Pos2::new(400.0, 400.0), CENTER);
        assert_eq!(editor.hovered, None);
        assert!(!editor.history.can_undo());
    }

    #[test]
    fn hover_does_not_survive_pointer_leaving_canvas() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        editor.pointer_move(Pos2::new(100.0, 100.0), CENTER);
        assert!(editor.hovered.is_some());

        editor.pointer_exited();
        assert_eq!(editor.hovered, None);

        // An in-flight gesture is untouched.
        editor.pointer_down(Pos2::new(300.0, 300.0), CENTER);
        editor.pointer_exited();
        assert!(matches!(editor.mode(), Mode::Drawing { .. }));
    }

    #[test]
    fn undo_redo_round_trip_restores_list() {
        let mut editor = editor_with(&[]);
        drag(&mut editor, Pos2::new(10.0, 10.0), Pos2::new(60.0, 60.0));
        drag(&mut editor, Pos2::new(200.0, 200.0), Pos2::new(260.0, 260.0));
        let full = editor.store.snapshot();

        assert!(editor.undo());
        assert_eq!(editor.store.len(), 1);
        assert!(editor.undo());
        assert_eq!(editor.store.len(), 0);
        assert!(!editor.undo());

        assert!(editor.redo());
        assert!(editor.redo());
        assert_eq!(editor.store.snapshot(), full);
        assert!(!editor.redo());
    }

    #[test]
    fn delete_selected_commits() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        assert!(!editor.delete_selected());

        let id = editor.store.annotations()[0].id.clone();
        editor.store.select(&id);
        assert!(editor.delete_selected());
        assert!(editor.store.is_empty());
        assert!(editor.history.can_undo());
    }

    #[test]
    fn rename_then_commit_is_one_history_entry() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        let id = editor.store.annotations()[0].id.clone();
        editor.store.select(&id);

        editor.rename_selected("log".into());
        editor.rename_selected("login".into());
        editor.rename_selected("login button".into());
        assert!(editor.commit_selected_edit());
        assert_eq!(editor.store.get(&id).unwrap().label, "login button");

        assert!(editor.undo());
        assert_eq!(editor.store.get(&id).unwrap().label, "Annotation 1");
    }

    #[test]
    fn target_pos_change_commits_once() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        let id = editor.store.annotations()[0].id.clone();
        editor.store.select(&id);

        assert!(editor.set_target_pos_selected(TargetPos::new(1)));
        // Same value again is a no-op.
        assert!(!editor.set_target_pos_selected(TargetPos::new(1)));
        assert!(editor.undo());
        assert_eq!(
            editor.store.get(&id).unwrap().target_pos,
            TargetPos::CENTER
        );
    }

    #[test]
    fn reset_from_restarts_history() {
        let mut editor = editor_with(&[]);
        drag(&mut editor, Pos2::new(10.0, 10.0), Pos2::new(60.0, 60.0));
        assert!(editor.history.can_undo());

        editor.reset_from(vec![]);
        assert!(editor.store.is_empty());
        assert!(!editor.history.can_undo());
        assert!(!editor.history.can_redo());
    }

    #[test]
    fn zoom_does_not_move_annotations() {
        let mut editor = editor_with(&[Rect::new(50.0, 50.0, 100.0, 100.0)]);
        let before = editor.store.annotations()[0].rect;
        editor.wheel_zoom(Pos2::new(200.0, 150.0), CENTER, 1.0);
        editor.wheel_zoom(Pos2::new(200.0, 150.0), CENTER, -1.0);
        assert_eq!(editor.store.annotations()[0].rect, before);
    }
}
