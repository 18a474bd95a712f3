use egui::{Pos2, Vec2};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in image-pixel space (origin at the image's
/// top-left corner, independent of on-screen pan/zoom).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalized box spanning two drag endpoints, independent of drag
    /// direction.
    pub fn from_drag(start: Pos2, end: Pos2) -> Self {
        Self {
            x: start.x.min(end.x),
            y: start.y.min(end.y),
            width: (end.x - start.x).abs(),
            height: (end.y - start.y).abs(),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn min(&self) -> Pos2 {
        Pos2::new(self.x, self.y)
    }

    pub fn max(&self) -> Pos2 {
        Pos2::new(self.right(), self.bottom())
    }

    pub fn center(&self) -> Pos2 {
        Pos2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn contains(&self, p: Pos2) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn translated(&self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            ..*self
        }
    }

    /// Rescale by independent x/y factors. Used when a sidecar file was saved
    /// against a different image resolution than the one now open.
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;
pub const WHEEL_ZOOM_IN: f32 = 1.1;
pub const WHEEL_ZOOM_OUT: f32 = 0.9;

/// Pan/zoom state for one open screenshot. The image is anchored to the
/// canvas center, then translated by `offset` (screen pixels) and scaled by
/// `scale`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub scale: f32,
    pub offset: Vec2,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

impl ViewState {
    /// Convert an image-pixel point to a screen point.
    pub fn to_screen(&self, p: Pos2, canvas_center: Pos2, source_size: Vec2) -> Pos2 {
        canvas_center + self.offset + (p.to_vec2() - source_size * 0.5) * self.scale
    }

    /// Convert a screen point to image-pixel space. Exact inverse of
    /// [`ViewState::to_screen`].
    pub fn to_image(&self, p: Pos2, canvas_center: Pos2, source_size: Vec2) -> Pos2 {
        let rel = p - canvas_center - self.offset;
        Pos2::new(
            rel.x / self.scale + source_size.x * 0.5,
            rel.y / self.scale + source_size.y * 0.5,
        )
    }

    /// Screen rectangle the image currently occupies.
    pub fn image_rect_on_screen(&self, canvas_center: Pos2, source_size: Vec2) -> egui::Rect {
        egui::Rect::from_min_max(
            self.to_screen(Pos2::ZERO, canvas_center, source_size),
            self.to_screen(source_size.to_pos2(), canvas_center, source_size),
        )
    }

    /// New view with `scale * factor` (clamped) and an offset chosen so the
    /// image point under `cursor` does not move.
    pub fn zoomed_at(&self, cursor: Pos2, canvas_center: Pos2, factor: f32) -> Self {
        let new_scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        let cursor_rel = cursor - canvas_center - self.offset;
        Self {
            scale: new_scale,
            offset: self.offset - cursor_rel * (new_scale / self.scale - 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: Vec2 = Vec2::new(1920.0, 1080.0);
    const CENTER: Pos2 = Pos2::new(400.0, 300.0);

    #[test]
    fn screen_image_round_trip() {
        let view = ViewState {
            scale: 1.7,
            offset: Vec2::new(-35.0, 12.0),
        };
        let img = Pos2::new(123.0, 456.0);
        let screen = view.to_screen(img, CENTER, SOURCE);
        let back = view.to_image(screen, CENTER, SOURCE);
        assert!((back - img).length() < 1e-3);
    }

    #[test]
    fn zoom_keeps_cursor_point_fixed() {
        let view = ViewState {
            scale: 1.0,
            offset: Vec2::new(20.0, -40.0),
        };
        let cursor = Pos2::new(511.0, 207.0);
        for factor in [WHEEL_ZOOM_IN, WHEEL_ZOOM_OUT, 1.25, 0.6] {
            let before = view.to_image(cursor, CENTER, SOURCE);
            let zoomed = view.zoomed_at(cursor, CENTER, factor);
            let after = zoomed.to_image(cursor, CENTER, SOURCE);
            assert!(
                (after - before).length() < 1e-2,
                "cursor drifted for factor {factor}: {before:?} -> {after:?}"
            );
        }
    }

    #[test]
    fn zoom_scale_is_clamped() {
        let mut view = ViewState::default();
        for _ in 0..100 {
            view = view.zoomed_at(CENTER, CENTER, WHEEL_ZOOM_IN);
        }
        assert_eq!(view.scale, MAX_SCALE);
        for _ in 0..100 {
            view = view.zoomed_at(CENTER, CENTER, WHEEL_ZOOM_OUT);
        }
        assert_eq!(view.scale, MIN_SCALE);
    }

    #[test]
    fn drag_rect_normalizes_direction() {
        let rect = Rect::from_drag(Pos2::new(100.0, 100.0), Pos2::new(40.0, 30.0));
        assert_eq!(rect, Rect::new(40.0, 30.0, 60.0, 70.0));
    }

    #[test]
    fn rect_contains_edges() {
        let rect = Rect::new(10.0, 10.0, 50.0, 50.0);
        assert!(rect.contains(Pos2::new(10.0, 10.0)));
        assert!(rect.contains(Pos2::new(60.0, 60.0)));
        assert!(!rect.contains(Pos2::new(60.1, 60.0)));
    }

    #[test]
    fn rect_rescales_proportionally() {
        let rect = Rect::new(100.0, 50.0, 200.0, 100.0);
        assert_eq!(rect.scaled(0.5, 2.0), Rect::new(50.0, 100.0, 100.0, 200.0));
    }
}
