//! Geometry primitives & paints

use super::bitmap::Bitmap;
use super::device::{Canvas, TextLayout};
use rgb::RGBA8;
use static_assertions::const_assert_eq;

/// General-purpose position structure, in absolute device-independent
/// pixels.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn add_size(self, size: Size) -> Self {
        Self::new(self.x + size.w, self.y + size.h)
    }
}

/// General-purpose size structure.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Size {
    pub w: f32,
    pub h: f32,
}

impl Size {
    pub const fn new(w: f32, h: f32) -> Self {
        Self { w, h }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn is_zero(self) -> bool {
        self.w <= 0.0 || self.h <= 0.0
    }
}

const_assert_eq!(core::mem::size_of::<Position>(), 8);
const_assert_eq!(core::mem::size_of::<Size>(), 8);

/// True when `point` falls inside `rect` (top/left edge inclusive,
/// bottom/right exclusive).
pub fn rect_contains(rect: (Position, Size), point: Position) -> bool {
    let bottom_right = rect.0.add_size(rect.1);
    point.x >= rect.0.x && point.x < bottom_right.x
        && point.y >= rect.0.y && point.y < bottom_right.y
}

/// Intersection of two rectangles; zero-sized when disjoint.
pub fn rect_intersect(a: (Position, Size), b: (Position, Size)) -> (Position, Size) {
    let x_min = a.0.x.max(b.0.x);
    let y_min = a.0.y.max(b.0.y);
    let x_max = (a.0.x + a.1.w).min(b.0.x + b.1.w);
    let y_max = (a.0.y + a.1.h).min(b.0.y + b.1.h);
    (
        Position::new(x_min, y_min),
        Size::new((x_max - x_min).max(0.0), (y_max - y_min).max(0.0)),
    )
}

/// What a control's background/foreground slot draws.
#[derive(Debug, Default)]
pub enum Paint {
    #[default]
    None,
    SolidColor(RGBA8),
    /// Shared handle into the bitmap store.
    Bitmap(Bitmap),
    Text {
        layout: TextLayout,
        color: RGBA8,
    },
}

impl Paint {
    /// Paints into `rect`; solid colors fill it, bitmaps stretch over
    /// it, text draws from its top-left corner.
    pub fn draw(&self, canvas: &mut dyn Canvas, rect: (Position, Size)) {
        if rect.1.is_zero() {
            return;
        }
        match self {
            Paint::None => (),
            Paint::SolidColor(color) => canvas.fill_rect(rect, *color),
            Paint::Bitmap(bitmap) => {
                let src = (Position::zero(), bitmap.size());
                canvas.draw_bitmap(bitmap, rect, src, 1.0);
            },
            Paint::Text { layout, color } => canvas.draw_text(layout, rect.0, *color),
        }
    }

    /// Does this paint hold device resources built under `generation`?
    /// Paints with no device side always report `true`.
    pub fn device_current(&self, generation: u64) -> bool {
        match self {
            Paint::None | Paint::SolidColor(_) => true,
            Paint::Bitmap(bitmap) => bitmap.device_current(generation),
            Paint::Text { layout, .. } => layout.device_current(generation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_edges() {
        let rect = (Position::new(10.0, 10.0), Size::new(20.0, 20.0));
        assert!(rect_contains(rect, Position::new(10.0, 10.0)));
        assert!(rect_contains(rect, Position::new(29.9, 29.9)));
        assert!(!rect_contains(rect, Position::new(30.0, 15.0)));
        assert!(!rect_contains(rect, Position::new(9.9, 15.0)));
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = (Position::new(0.0, 0.0), Size::new(10.0, 10.0));
        let b = (Position::new(20.0, 20.0), Size::new(10.0, 10.0));
        assert!(rect_intersect(a, b).1.is_zero());
    }
}
