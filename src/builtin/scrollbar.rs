//! The scrollbar class: the stock marginal control
//!
//! A scrollbar lives in one of its owner's fixed marginal slots
//! (`<scrollbar marginal="right"/>`), never in the sibling list. The
//! slot decides the orientation: left/right bars scroll the Y axis,
//! top/bottom bars the X axis. The thumb is derived from the owner's
//! offset/view/content ratio at render time, so there is no state to
//! keep in sync.

use crate::core::arena::ControlKey;
use crate::core::container::MarginalSlot;
use crate::core::control::{ClassIndex, ControlFlags};
use crate::core::device::Canvas;
use crate::core::event::{ControlClass, Handlers, InputEvent, DEFAULT_HANDLERS};
use crate::core::ui::Ui;
use crate::core::visual::{Paint, Position, Size};
use crate::core::xml::Attributes;
use crate::{cheap_string, Error};
use rgb::RGBA8;

const TRACK: RGBA8 = RGBA8 { r: 32, g: 32, b: 32, a: 255 };
const THUMB: RGBA8 = RGBA8 { r: 128, g: 128, b: 128, a: 255 };

const DEFAULT_THICKNESS: f32 = 12.0;
const MIN_THUMB: f32 = 8.0;

pub const SCROLLBAR: ControlClass = ControlClass {
    name: cheap_string("ScrollBar"),
    xml_tag: Some(cheap_string("scrollbar")),
    xml_attributes: &["thickness", "color"],
    accepts_children: false,
    handlers: Handlers { populate, render, input, ..DEFAULT_HANDLERS },
    storage: None,
};

fn populate(ui: &mut Ui, _: ClassIndex, control: ControlKey, attributes: &Attributes) -> Result<(), Error> {
    let thickness = attributes.as_f32("thickness", DEFAULT_THICKNESS)?;
    let color = attributes.as_color("color")?.unwrap_or(TRACK);

    // the slot geometry stretches the long axis once attached
    let node = &mut ui.tree[control];
    node.size = Size::new(thickness, thickness);
    node.background = Paint::SolidColor(color);
    Ok(())
}

/// The owning container and whether this bar scrolls vertically.
/// `None` for a bar that is not sitting in a marginal slot.
fn orientation(ui: &Ui, control: ControlKey) -> Option<(ControlKey, bool)> {
    let owner = ui.tree.parent(control)?;
    let slot = *MarginalSlot::ALL
        .iter()
        .find(|&&slot| ui.tree.marginal(owner, slot) == Some(control))?;
    Some((owner, matches!(slot, MarginalSlot::Left | MarginalSlot::Right)))
}

/// Thumb rectangle in absolute coordinates; `None` when the owner has
/// nothing hidden to scroll on this bar's axis.
fn thumb_rect(ui: &Ui, control: ControlKey) -> Option<(Position, Size)> {
    let (owner, vertical) = orientation(ui, control)?;
    let state = ui.tree[owner].container.as_ref()?;
    let (position, size) = ui.tree[control].rect();

    let (track_len, view, max, offset) = match vertical {
        true => (size.h, state.view_size().h, state.max_offset_y(), state.offset_y()),
        false => (size.w, state.view_size().w, state.max_offset_x(), state.offset_x()),
    };
    if max <= 0.0 || track_len <= 0.0 {
        return None;
    }

    let content = max + view;
    let thumb_len = (track_len * view / content).max(MIN_THUMB).min(track_len);
    let along = (track_len - thumb_len) * offset / max;
    Some(match vertical {
        true => (
            Position::new(position.x, position.y + along),
            Size::new(size.w, thumb_len),
        ),
        false => (
            Position::new(position.x + along, position.y),
            Size::new(thumb_len, size.h),
        ),
    })
}

fn render(ui: &mut Ui, _: ClassIndex, control: ControlKey, canvas: &mut dyn Canvas) -> Result<(), Error> {
    let node = &ui.tree[control];
    node.background.draw(canvas, node.rect());
    if let Some(thumb) = thumb_rect(ui, control) {
        canvas.fill_rect(thumb, THUMB);
    }
    Ok(())
}

fn input(ui: &mut Ui, _: ClassIndex, control: ControlKey, _: ControlKey, event: &InputEvent) -> Result<bool, Error> {
    let Some((owner, vertical)) = orientation(ui, control) else {
        return Ok(false);
    };

    let consumed = match *event {
        InputEvent::WheelY(delta) if vertical => scroll_owner(ui, owner, vertical, delta),
        InputEvent::WheelX(delta) if !vertical => scroll_owner(ui, owner, vertical, delta),
        InputEvent::PointerDown(point) => {
            jump_to(ui, owner, control, vertical, point);
            true
        },
        _ => false,
    };

    if consumed {
        ui.tree[owner].flags.insert(ControlFlags::LAYOUT_DIRTY);
    }
    Ok(consumed)
}

fn scroll_owner(ui: &mut Ui, owner: ControlKey, vertical: bool, delta: f32) -> bool {
    let state = ui.tree[owner].container_mut();
    match vertical {
        true if state.max_offset_y() > 0.0 => {
            state.set_offset_y(state.offset_y() + delta);
            true
        },
        false if state.max_offset_x() > 0.0 => {
            state.set_offset_x(state.offset_x() + delta);
            true
        },
        _ => false,
    }
}

/// Centers the view on the clicked track position.
fn jump_to(ui: &mut Ui, owner: ControlKey, control: ControlKey, vertical: bool, point: Position) {
    let (position, size) = ui.tree[control].rect();
    let state = ui.tree[owner].container_mut();
    match vertical {
        true => {
            let content = state.max_offset_y() + state.view_size().h;
            let target = (point.y - position.y) / size.h * content - state.view_size().h * 0.5;
            state.set_offset_y(target);
        },
        false => {
            let content = state.max_offset_x() + state.view_size().w;
            let target = (point.x - position.x) / size.w * content - state.view_size().w * 0.5;
            state.set_offset_x(target);
        },
    }
}
