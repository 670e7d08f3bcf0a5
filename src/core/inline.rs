//! Inline render objects for the text-layout engine
//!
//! The text engine is a collaborator: when a paragraph embeds a ruby
//! annotation or an inline image, it holds an [`InlineObject`] handle
//! and asks it for metrics during layout and for drawing during
//! rendering. These objects are leaves — they take no part in the
//! control tree or its traversals.

use super::bitmap::Bitmap;
use super::device::{Canvas, TextLayout};
use super::ui::Ui;
use super::visual::{Position, Size};
use crate::{error, Error};
use rgb::RGBA8;
use std::rc::Rc;

/// How the line breaker may treat the boundary next to an inline
/// object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BreakCondition {
    #[default]
    Neutral,
    CanBreak,
    MayNotBreak,
    MustBreak,
}

/// Space an inline object claims within the line.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InlineMetrics {
    pub width: f32,
    pub height: f32,
    /// Distance from the object's top to the line baseline it sits on.
    pub baseline: f32,
    pub supports_sideways: bool,
}

/// How far the object may paint outside its layout box.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct OverhangMetrics {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Contract between the text-layout engine and embedded leaf
/// renderables.
pub trait InlineObject {
    fn metrics(&self) -> InlineMetrics;

    fn overhang_metrics(&self) -> OverhangMetrics {
        OverhangMetrics::default()
    }

    /// Break conditions before and after the object.
    fn break_conditions(&self) -> (BreakCondition, BreakCondition) {
        (BreakCondition::Neutral, BreakCondition::Neutral)
    }

    /// Draws at `origin` (top-left of the object's box). The `Ui` is
    /// read-only here: the text renderer may be deep inside a render
    /// traversal.
    fn draw(&self, ui: &Ui, canvas: &mut dyn Canvas, origin: Position) -> Result<(), Error>;
}

/// Phonetic annotation above a base text run.
pub struct RubyNotation {
    ruby: TextLayout,
    text: TextLayout,
    color: RGBA8,
    width: f32,
    height: f32,
    baseline: f32,
    offset_y: f32,
}

impl RubyNotation {
    /// Measures both layouts and derives the combined box. Returns
    /// `None` when either layout has no usable line metrics — callers
    /// fall back to plain text.
    pub fn create(ruby: TextLayout, text: TextLayout, color: RGBA8) -> Option<Rc<Self>> {
        let ruby_metrics = ruby.metrics();
        let text_metrics = text.metrics();
        if ruby_metrics.line_height <= 0.0 || text_metrics.line_height <= 0.0 {
            return None;
        }

        let width = ruby_metrics.width.max(text_metrics.width);
        // the annotation rides half a ruby line above the base run
        let ruby_rise = ruby_metrics.line_height * 0.5;

        Some(Rc::new(Self {
            ruby,
            text,
            color,
            width,
            height: text_metrics.height,
            baseline: text_metrics.baseline + ruby_rise,
            offset_y: ruby_rise,
        }))
    }
}

impl InlineObject for RubyNotation {
    fn metrics(&self) -> InlineMetrics {
        InlineMetrics {
            width: self.width,
            height: self.height,
            baseline: self.baseline,
            supports_sideways: true,
        }
    }

    fn draw(&self, _ui: &Ui, canvas: &mut dyn Canvas, origin: Position) -> Result<(), Error> {
        let ruby_origin = Position::new(origin.x, origin.y - self.offset_y * 0.4);
        canvas.draw_text(&self.ruby, ruby_origin, self.color);
        let text_origin = Position::new(origin.x, origin.y + self.offset_y);
        canvas.draw_text(&self.text, text_origin, self.color);
        Ok(())
    }
}

/// A bitmap from the shared store, embedded in a text run by index.
pub struct InlineImage {
    bitmap_index: usize,
    display: Size,
    source: (Position, Size),
}

impl InlineImage {
    /// Resolves `source` ("an index into the bitmap store") and sizes
    /// the object: explicit sizes win, otherwise the stored bitmap's
    /// natural size is used. Returns `None` when `source` is not an
    /// index — callers skip the image.
    pub fn create(
        ui: &Ui,
        source: &str,
        display: Size,
        source_rect: (Position, Size),
    ) -> Option<Rc<Self>> {
        let bitmap_index: usize = match source.trim().parse() {
            Ok(index) => index,
            Err(_) => {
                log::warn!("inline image source {:?} is not a bitmap index", source);
                return None;
            },
        };

        let natural = ui
            .bitmap(bitmap_index)
            .map(|bitmap| bitmap.size())
            .unwrap_or(display);

        let display = match display.is_zero() {
            true => natural,
            false => display,
        };
        let source_rect = match source_rect.1.is_zero() {
            true => (Position::zero(), natural),
            false => source_rect,
        };

        Some(Rc::new(Self { bitmap_index, display, source: source_rect }))
    }

    fn bitmap(&self, ui: &Ui) -> Option<Bitmap> {
        ui.bitmap(self.bitmap_index)
    }
}

impl InlineObject for InlineImage {
    fn metrics(&self) -> InlineMetrics {
        InlineMetrics {
            width: self.display.w,
            height: self.display.h,
            baseline: self.display.h,
            supports_sideways: true,
        }
    }

    fn draw(&self, ui: &Ui, canvas: &mut dyn Canvas, origin: Position) -> Result<(), Error> {
        let destination = (origin, self.display);
        match self.bitmap(ui) {
            Some(bitmap) if bitmap.device_current(ui.device_generation()) => {
                canvas.draw_bitmap(&bitmap, destination, self.source, 1.0);
                Ok(())
            },
            Some(_) => {
                // stale adapter copy: fill the box rather than sample it
                canvas.fill_rect(destination, RGBA8::new(127, 127, 127, 255));
                Err(error!("bitmap {} is stale; recreation pending", self.bitmap_index))
            },
            None => Err(error!("bitmap {} is not in the store", self.bitmap_index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{DrawOp, HeadlessDevice, Recorder};
    use crate::core::visual::Size;

    fn test_ui() -> Ui {
        Ui::new(Box::new(HeadlessDevice::new()))
    }

    #[test]
    fn ruby_box_combines_both_runs() {
        let mut ui = test_ui();
        let ruby = ui.create_text_layout("とうきょう".into(), Size::zero()).unwrap();
        let text = ui.create_text_layout("東京".into(), Size::zero()).unwrap();
        let (ruby_metrics, text_metrics) = (ruby.metrics(), text.metrics());

        let object = RubyNotation::create(ruby, text, RGBA8::new(0, 0, 0, 255)).unwrap();
        let metrics = object.metrics();

        assert_eq!(metrics.width, ruby_metrics.width.max(text_metrics.width));
        assert_eq!(metrics.height, text_metrics.height);
        assert!(metrics.baseline > text_metrics.baseline);
    }

    #[test]
    fn ruby_draws_annotation_above_base() {
        let mut ui = test_ui();
        let ruby = ui.create_text_layout("kana".into(), Size::zero()).unwrap();
        let text = ui.create_text_layout("kanji".into(), Size::zero()).unwrap();
        let object = RubyNotation::create(ruby, text, RGBA8::new(0, 0, 0, 255)).unwrap();

        let mut recorder = Recorder::new();
        object.draw(&ui, &mut recorder, Position::new(10.0, 100.0)).unwrap();

        let origins: Vec<Position> = recorder
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::DrawText { origin, .. } => Some(*origin),
                _ => None,
            })
            .collect();
        assert_eq!(origins.len(), 2);
        assert!(origins[0].y < 100.0, "annotation above the line top");
        assert!(origins[1].y > 100.0, "base text pushed down");
    }

    #[test]
    fn inline_image_resolves_natural_size_from_the_store() {
        let mut ui = test_ui();
        let bitmap = Bitmap::solid(RGBA8::new(9, 9, 9, 255), 8, 4);
        let index = ui.register_bitmap(bitmap).unwrap();

        let object = InlineImage::create(
            &ui,
            &index.to_string(),
            Size::zero(),
            (Position::zero(), Size::zero()),
        )
        .unwrap();
        let metrics = object.metrics();
        assert_eq!((metrics.width, metrics.height), (8.0, 4.0));
        assert_eq!(metrics.baseline, 4.0);

        let mut recorder = Recorder::new();
        object.draw(&ui, &mut recorder, Position::zero()).unwrap();
        assert!(matches!(recorder.ops[..], [DrawOp::DrawBitmap { .. }]));
    }

    #[test]
    fn inline_image_misses_are_reported_not_panicked() {
        let ui = test_ui();
        assert!(InlineImage::create(
            &ui,
            "not-a-number",
            Size::zero(),
            (Position::zero(), Size::zero()),
        )
        .is_none());

        let object = InlineImage::create(
            &ui,
            "42",
            Size::new(16.0, 16.0),
            (Position::zero(), Size::zero()),
        )
        .unwrap();
        let mut recorder = Recorder::new();
        assert!(object.draw(&ui, &mut recorder, Position::zero()).is_err());
    }
}
