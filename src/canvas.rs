//! Canvas rendering and pointer routing.
//!
//! One immediate-mode pass per frame: paint the screenshot under the current
//! pan/zoom, feed raw pointer events into the [`Editor`], then paint every
//! annotation on top in its interaction style.

use egui::{
    Color32, FontId, Pos2, Rect as ScreenRect, Sense, Shape, Stroke, StrokeKind, TextureHandle,
    Ui, Vec2,
};

use crate::editor::{Editor, Handle, Mode};
use crate::geometry::Rect;

const DEFAULT_STROKE: Color32 = Color32::from_rgb(239, 68, 68);
const SELECTED_STROKE: Color32 = Color32::from_rgb(59, 130, 246);
const HANDLE_SIZE: f32 = 8.0;

/// What the frame's canvas pass produced.
pub struct CanvasOutcome {
    /// An edit was committed on pointer-up; the caller should persist.
    pub committed: bool,
}

fn fill_for(stroke: Color32) -> Color32 {
    Color32::from_rgba_unmultiplied(stroke.r(), stroke.g(), stroke.b(), 28)
}

fn screen_rect(editor: &Editor, rect: Rect, canvas_center: Pos2) -> ScreenRect {
    let min = editor
        .view
        .to_screen(rect.min(), canvas_center, editor.source_size());
    let max = editor
        .view
        .to_screen(rect.max(), canvas_center, editor.source_size());
    ScreenRect::from_min_max(min, max)
}

fn dashed_rect(painter: &egui::Painter, rect: ScreenRect, stroke: Stroke) {
    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
        rect.left_top(),
    ];
    for pair in corners.windows(2) {
        painter.extend(Shape::dashed_line(pair, stroke, 6.0, 4.0));
    }
}

fn paint_label(painter: &egui::Painter, rect: ScreenRect, label: &str, color: Color32) {
    if label.is_empty() {
        return;
    }
    let pos = rect.left_top() - Vec2::new(0.0, 4.0);
    let galley = painter.layout_no_wrap(label.to_owned(), FontId::proportional(13.0), Color32::WHITE);
    let bg = ScreenRect::from_min_size(
        pos - Vec2::new(0.0, galley.size().y),
        galley.size() + Vec2::new(8.0, 4.0),
    );
    painter.rect_filled(bg, 3.0, color);
    painter.galley(bg.min + Vec2::new(4.0, 2.0), galley, Color32::WHITE);
}

fn paint_corner_markers(painter: &egui::Painter, rect: ScreenRect, color: Color32) {
    let len = 10.0_f32.min(rect.width() * 0.5).min(rect.height() * 0.5);
    let stroke = Stroke::new(3.0, color);
    for (corner, dx, dy) in [
        (rect.left_top(), 1.0, 1.0),
        (rect.right_top(), -1.0, 1.0),
        (rect.right_bottom(), -1.0, -1.0),
        (rect.left_bottom(), 1.0, -1.0),
    ] {
        painter.line_segment([corner, corner + Vec2::new(dx * len, 0.0)], stroke);
        painter.line_segment([corner, corner + Vec2::new(0.0, dy * len)], stroke);
    }
}

fn paint_handles(painter: &egui::Painter, editor: &Editor, rect: Rect, canvas_center: Pos2) {
    for handle in Handle::ALL {
        let anchor = editor
            .view
            .to_screen(handle.anchor(rect), canvas_center, editor.source_size());
        let hrect = ScreenRect::from_center_size(anchor, Vec2::splat(HANDLE_SIZE));
        painter.rect_filled(hrect, 1.0, Color32::WHITE);
        painter.rect_stroke(
            hrect,
            1.0,
            Stroke::new(1.5, SELECTED_STROKE),
            StrokeKind::Outside,
        );
    }
}

/// Paint the screenshot and annotations, routing pointer input through the
/// editor's state machine.
pub fn show(ui: &mut Ui, editor: &mut Editor, texture: &TextureHandle) -> CanvasOutcome {
    let size = ui.available_size();
    let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
    let canvas_center = response.rect.center();

    painter.rect_filled(response.rect, 0.0, Color32::from_gray(24));

    // Input first, so this frame already paints the updated state.
    let mut committed = false;
    let pointer = ui.input(|i| i.pointer.clone());
    if let Some(pos) = pointer.latest_pos() {
        if response.hovered() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 {
                editor.wheel_zoom(pos, canvas_center, scroll);
            }
        }
        if pointer.primary_pressed() && response.hovered() {
            editor.pointer_down(pos, canvas_center);
        }
        // Idle hover only makes sense for canvas-space coordinates; a gesture
        // in progress keeps tracking wherever the pointer goes.
        if response.hovered() || !matches!(editor.mode(), Mode::Idle) {
            editor.pointer_move(pos, canvas_center);
        } else {
            editor.pointer_exited();
        }
        if pointer.primary_released() {
            committed = editor.pointer_up();
        }
        ui.output_mut(|o| o.cursor_icon = editor.cursor_icon(pos, canvas_center));
    }

    let image_rect = editor
        .view
        .image_rect_on_screen(canvas_center, editor.source_size());
    painter.image(
        texture.id(),
        image_rect,
        ScreenRect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
        Color32::WHITE,
    );

    for annotation in editor.store.annotations() {
        let selected = editor.store.selected_id() == Some(annotation.id.as_str());
        let hovered = editor.hovered.as_deref() == Some(annotation.id.as_str());
        let color = if selected { SELECTED_STROKE } else { DEFAULT_STROKE };
        let width = if selected || hovered { 3.0 } else { 2.0 };

        let rect = screen_rect(editor, annotation.rect, canvas_center);
        painter.rect_filled(rect, 0.0, fill_for(color));
        painter.rect_stroke(rect, 0.0, Stroke::new(width, color), StrokeKind::Middle);
        paint_label(&painter, rect, &annotation.label, color);

        if hovered && !selected {
            paint_corner_markers(&painter, rect, color);
        }
        if selected {
            paint_handles(&painter, editor, annotation.rect, canvas_center);
        }
    }

    if let Some(preview) = editor.preview_rect() {
        let rect = screen_rect(editor, preview, canvas_center);
        dashed_rect(&painter, rect, Stroke::new(2.0, SELECTED_STROKE));
    }

    CanvasOutcome { committed }
}
