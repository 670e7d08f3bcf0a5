//! The hardware 2D / text-layout facade
//!
//! The toolkit does not talk to any graphics API directly: embedders
//! implement [`GraphicsDevice`] (resource construction) and [`Canvas`]
//! (per-frame drawing), the way a platform adapter would wrap its
//! render target. [`HeadlessDevice`] and [`Recorder`] implement both
//! without hardware, for tests and server-side setups.
//!
//! Every device resource is stamped with the *device generation* it was
//! built under. The [`Ui`](super::ui::Ui) bumps the generation when the
//! adapter is lost and runs the recreation protocol; a resource whose
//! stamp lags behind is stale and must not be drawn from.

use super::bitmap::Bitmap;
use super::visual::{Position, Size};
use crate::{CheapString, Error};
use rgb::RGBA8;

/// Shaping/measurement results for one text layout, produced by the
/// backend.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct TextMetrics {
    pub width: f32,
    pub height: f32,
    /// Distance from the top of the first line to its baseline.
    pub baseline: f32,
    pub line_height: f32,
}

/// A laid-out run of text. The CPU side (source string, wrap width)
/// survives device loss; metrics and the backend object are rebuilt by
/// the recreation protocol.
#[derive(Debug, Clone)]
pub struct TextLayout {
    text: CheapString,
    max_size: Size,
    metrics: TextMetrics,
    generation: u64,
}

impl TextLayout {
    pub fn text(&self) -> &CheapString {
        &self.text
    }

    pub fn max_size(&self) -> Size {
        self.max_size
    }

    pub fn metrics(&self) -> TextMetrics {
        self.metrics
    }

    pub fn size(&self) -> Size {
        Size::new(self.metrics.width, self.metrics.height)
    }

    pub fn device_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub(crate) fn build(
        device: &mut dyn GraphicsDevice,
        generation: u64,
        text: CheapString,
        max_size: Size,
    ) -> Result<Self, Error> {
        let metrics = device.build_text_layout(&text, max_size)?;
        Ok(Self { text, max_size, metrics, generation })
    }
}

/// Resource-construction half of the graphics backend.
pub trait GraphicsDevice {
    /// Shapes `text` within `max_size` and returns its metrics. The
    /// backend keeps whatever native object it needs for drawing.
    fn build_text_layout(&mut self, text: &str, max_size: Size) -> Result<TextMetrics, Error>;

    /// (Re-)uploads bitmap pixels to the adapter.
    fn upload_bitmap(&mut self, size: Size, data: &[RGBA8]) -> Result<(), Error>;
}

/// Drawing half of the graphics backend, handed to the render
/// traversal once per frame.
pub trait Canvas {
    fn fill_rect(&mut self, rect: (Position, Size), color: RGBA8);
    fn draw_bitmap(
        &mut self,
        bitmap: &Bitmap,
        dst: (Position, Size),
        src: (Position, Size),
        opacity: f32,
    );
    fn draw_text(&mut self, layout: &TextLayout, origin: Position, color: RGBA8);
    fn push_clip(&mut self, rect: (Position, Size));
    fn pop_clip(&mut self);
}

/// A backend with no hardware behind it: text metrics come from a
/// fixed-advance approximation, uploads always succeed.
pub struct HeadlessDevice {
    pub font_size: f32,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self { font_size: 16.0 }
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn build_text_layout(&mut self, text: &str, max_size: Size) -> Result<TextMetrics, Error> {
        let advance = self.font_size * 0.5;
        let line_height = self.font_size * 1.25;
        let chars = text.chars().count().max(1) as f32;

        let natural = chars * advance;
        let per_line = match max_size.w > 0.0 {
            true => (max_size.w / advance).floor().max(1.0),
            false => chars,
        };
        let lines = (chars / per_line).ceil().max(1.0);

        Ok(TextMetrics {
            width: natural.min(per_line * advance),
            height: lines * line_height,
            baseline: self.font_size,
            line_height,
        })
    }

    fn upload_bitmap(&mut self, _size: Size, _data: &[RGBA8]) -> Result<(), Error> {
        Ok(())
    }
}

/// One recorded [`Canvas`] command.
#[derive(Debug, Clone)]
pub enum DrawOp {
    FillRect {
        rect: (Position, Size),
        color: RGBA8,
    },
    DrawBitmap {
        size: Size,
        dst: (Position, Size),
    },
    DrawText {
        text: CheapString,
        origin: Position,
    },
    PushClip((Position, Size)),
    PopClip,
}

/// A canvas that records every command, in order. Render-order tests
/// and headless embedders inspect `ops` after a frame.
#[derive(Default)]
pub struct Recorder {
    pub ops: Vec<DrawOp>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texts drawn this frame, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::DrawText { text, .. } => Some(&**text),
                _ => None,
            })
            .collect()
    }
}

impl Canvas for Recorder {
    fn fill_rect(&mut self, rect: (Position, Size), color: RGBA8) {
        self.ops.push(DrawOp::FillRect { rect, color });
    }

    fn draw_bitmap(
        &mut self,
        bitmap: &Bitmap,
        dst: (Position, Size),
        _src: (Position, Size),
        _opacity: f32,
    ) {
        self.ops.push(DrawOp::DrawBitmap { size: bitmap.size(), dst });
    }

    fn draw_text(&mut self, layout: &TextLayout, origin: Position, _color: RGBA8) {
        self.ops.push(DrawOp::DrawText { text: layout.text().clone(), origin });
    }

    fn push_clip(&mut self, rect: (Position, Size)) {
        self.ops.push(DrawOp::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        self.ops.push(DrawOp::PopClip);
    }
}
