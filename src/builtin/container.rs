//! The built-in container class
//!
//! `<column>` and `<row>` share one set of handlers; the axis comes
//! from the class's XML tag. The container owns the three render
//! chains (background, children, foreground), restacks its children
//! when its layout is dirty, and consumes wheel events when it has
//! hidden content to scroll.

use crate::core::arena::ControlKey;
use crate::core::container::MarginalSlot;
use crate::core::control::{ClassIndex, ControlFlags};
use crate::core::device::Canvas;
use crate::core::event::{ControlClass, Handlers, InputEvent, DEFAULT_HANDLERS};
use crate::core::ui::Ui;
use crate::core::visual::{Paint, Position, Size};
use crate::core::xml::Attributes;
use crate::{cheap_string, Error};

const ATTRIBUTES: &[&str] = &["color", "width", "height"];

pub const COLUMN: ControlClass = ControlClass {
    name: cheap_string("Column"),
    xml_tag: Some(cheap_string("column")),
    xml_attributes: ATTRIBUTES,
    accepts_children: true,
    handlers: Handlers { populate, update, render, input, ..DEFAULT_HANDLERS },
    storage: None,
};

pub const ROW: ControlClass = ControlClass {
    name: cheap_string("Row"),
    xml_tag: Some(cheap_string("row")),
    xml_attributes: ATTRIBUTES,
    accepts_children: true,
    handlers: Handlers { populate, update, render, input, ..DEFAULT_HANDLERS },
    storage: None,
};

fn populate(ui: &mut Ui, class: ClassIndex, control: ControlKey, attributes: &Attributes) -> Result<(), Error> {
    let vertical = ui.classes[usize::from(class)].xml_tag.as_deref() == Some("column");
    let width = attributes.as_f32("width", 0.0)?;
    let height = attributes.as_f32("height", 0.0)?;
    let color = attributes.as_color("color")?;

    let node = &mut ui.tree[control];
    if vertical {
        node.flags.insert(ControlFlags::VERTICAL);
    }
    node.size = Size::new(width, height);
    if let Some(color) = color {
        node.background = Paint::SolidColor(color);
    }
    node.flags.insert(ControlFlags::LAYOUT_DIRTY);
    Ok(())
}

fn update(ui: &mut Ui, _: ClassIndex, control: ControlKey) -> Result<(), Error> {
    if ui.tree[control].flags.contains(ControlFlags::LAYOUT_DIRTY) {
        stack_children(ui, control);
        ui.tree[control].flags.remove(ControlFlags::LAYOUT_DIRTY);
    }
    Ok(())
}

/// Where children start: the container's corner pushed in by the left
/// and top marginal strips.
fn content_origin(ui: &Ui, key: ControlKey) -> Position {
    let position = ui.tree[key].position;
    let left = ui.tree.marginal(key, MarginalSlot::Left).map_or(0.0, |k| ui.tree[k].size.w);
    let top = ui.tree.marginal(key, MarginalSlot::Top).map_or(0.0, |k| ui.tree[k].size.h);
    Position::new(position.x + left, position.y + top)
}

/// A zero-sized child container has not stacked yet this cycle;
/// measure it through its own children so the parent can place it
/// in one pass. Leaves keep whatever size their class gave them.
fn measure(ui: &mut Ui, key: ControlKey) -> Size {
    let size = ui.tree[key].size;
    if !size.is_zero() || !ui.tree[key].is_container() {
        return size;
    }

    let vertical = ui.tree[key].flags.contains(ControlFlags::VERTICAL);
    let children: Vec<ControlKey> = ui.tree.children(key).collect();
    let (mut pen, mut breadth) = (0.0f32, 0.0f32);
    for child in children {
        let size = measure(ui, child);
        match vertical {
            true => {
                pen += size.h;
                breadth = breadth.max(size.w);
            },
            false => {
                pen += size.w;
                breadth = breadth.max(size.h);
            },
        }
    }

    let content = match vertical {
        true => Size::new(breadth, pen),
        false => Size::new(pen, breadth),
    };
    ui.tree[key].size = content;
    content
}

/// Stacks the children along the container's axis, re-derives the
/// scrollable content size and the marginal geometry. A container
/// whose own size is still zero adopts its content extent.
fn stack_children(ui: &mut Ui, key: ControlKey) {
    let vertical = ui.tree[key].flags.contains(ControlFlags::VERTICAL);
    let children: Vec<ControlKey> = ui.tree.children(key).collect();
    let sizes: Vec<Size> = children.iter().map(|&child| measure(ui, child)).collect();

    let (mut pen, mut breadth) = (0.0f32, 0.0f32);
    for size in &sizes {
        match vertical {
            true => {
                pen += size.h;
                breadth = breadth.max(size.w);
            },
            false => {
                pen += size.w;
                breadth = breadth.max(size.h);
            },
        }
    }
    let content = match vertical {
        true => Size::new(breadth, pen),
        false => Size::new(pen, breadth),
    };

    if ui.tree[key].size.is_zero() && !content.is_zero() {
        ui.tree[key].size = content;
    }
    ui.tree[key].container_mut().set_content_size(content);
    ui.refresh_marginal_controls(key);

    let origin = content_origin(ui, key);
    let state = ui.tree[key].container();
    let start = Position::new(origin.x - state.offset_x(), origin.y - state.offset_y());

    let mut pen = 0.0f32;
    for (child, size) in children.into_iter().zip(sizes) {
        let position = match vertical {
            true => Position::new(start.x, start.y + pen),
            false => Position::new(start.x + pen, start.y),
        };
        pen += match vertical {
            true => size.h,
            false => size.w,
        };

        let node = &mut ui.tree[child];
        if node.position != position {
            node.position = position;
            // moved containers restack their own children this cycle
            if node.is_container() {
                node.flags.insert(ControlFlags::LAYOUT_DIRTY);
            }
        }
    }
}

fn render(ui: &mut Ui, _: ClassIndex, control: ControlKey, canvas: &mut dyn Canvas) -> Result<(), Error> {
    render_chain_background(ui, control, canvas)?;
    render_chain_main(ui, control, canvas)?;
    render_chain_foreground(ui, control, canvas)
}

/// The container's own surface, behind every child.
fn render_chain_background(ui: &mut Ui, control: ControlKey, canvas: &mut dyn Canvas) -> Result<(), Error> {
    let node = &ui.tree[control];
    node.background.draw(canvas, node.rect());
    Ok(())
}

/// List children, head to tail: earlier siblings paint first and end
/// up visually behind later ones. Clipped to the view rectangle; a
/// failing child does not stop its siblings from drawing.
fn render_chain_main(ui: &mut Ui, control: ControlKey, canvas: &mut dyn Canvas) -> Result<(), Error> {
    let view = (content_origin(ui, control), ui.tree[control].container().view_size());
    canvas.push_clip(view);

    let mut result = Ok(());
    let mut cursor = ui.tree.cursor(control);
    while let Some(child) = cursor.next(&ui.tree) {
        result = result.and(ui.render_control(child, canvas));
    }

    canvas.pop_clip();
    result
}

/// Marginal strips and the foreground paint, above every child.
fn render_chain_foreground(ui: &mut Ui, control: ControlKey, canvas: &mut dyn Canvas) -> Result<(), Error> {
    let mut result = Ok(());
    for slot in MarginalSlot::ALL {
        if let Some(marginal) = ui.tree.marginal(control, slot) {
            result = result.and(ui.render_control(marginal, canvas));
        }
    }
    let node = &ui.tree[control];
    node.foreground.draw(canvas, node.rect());
    result
}

/// Wheel events are consumed only when the axis actually has hidden
/// content, so they keep bubbling to an ancestor that can scroll.
fn input(ui: &mut Ui, _: ClassIndex, control: ControlKey, _: ControlKey, event: &InputEvent) -> Result<bool, Error> {
    let state = ui.tree[control].container_mut();
    let scrolled = match *event {
        InputEvent::WheelX(delta) if state.max_offset_x() > 0.0 => {
            state.set_offset_x(state.offset_x() + delta);
            true
        },
        InputEvent::WheelY(delta) if state.max_offset_y() > 0.0 => {
            state.set_offset_y(state.offset_y() + delta);
            true
        },
        _ => false,
    };

    if scrolled {
        ui.tree[control].flags.insert(ControlFlags::LAYOUT_DIRTY);
    }
    Ok(scrolled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{DrawOp, HeadlessDevice, Recorder};
    use std::cell::{Cell, RefCell};

    fn loaded_ui(source: &str) -> Ui {
        let mut ui = Ui::new(Box::new(HeadlessDevice::new()));
        ui.set_root_size(Size::new(200.0, 200.0));
        ui.load_xml(source).unwrap();
        ui
    }

    #[test]
    fn update_stacks_children_along_the_axis() {
        let mut ui = loaded_ui(
            r#"<column name="body">
                <label name="first" text="one"/>
                <label name="second" text="two"/>
                <row name="actions">
                    <label name="left" text="l"/>
                    <label name="right" text="r"/>
                </row>
            </column>"#,
        );
        ui.update().unwrap();

        let first = ui.find_control("first").unwrap();
        let second = ui.find_control("second").unwrap();
        let actions = ui.find_control("actions").unwrap();
        let left = ui.find_control("left").unwrap();
        let right = ui.find_control("right").unwrap();

        let line = ui.tree[first].size.h;
        assert_eq!(ui.tree[first].position, Position::new(0.0, 0.0));
        assert_eq!(ui.tree[second].position, Position::new(0.0, line));
        assert_eq!(ui.tree[actions].position, Position::new(0.0, line * 2.0));

        // the nested row was measured and stacked in the same cycle
        assert!(!ui.tree[actions].size.is_zero());
        assert_eq!(ui.tree[left].position.y, line * 2.0);
        assert_eq!(ui.tree[right].position.x, ui.tree[left].size.w);
    }

    #[test]
    fn children_render_back_to_front_between_the_chains() {
        let mut ui = loaded_ui(
            r##"<column name="body" color="#202020">
                <label text="one"/>
                <label text="two"/>
                <label text="three"/>
            </column>"##,
        );
        ui.update().unwrap();

        let mut recorder = Recorder::new();
        ui.render(&mut recorder).unwrap();
        assert_eq!(recorder.texts(), vec!["one", "two", "three"]);

        // the body's background fill precedes every text draw
        let fill = recorder
            .ops
            .iter()
            .position(|op| matches!(op, DrawOp::FillRect { .. }))
            .unwrap();
        let first_text = recorder
            .ops
            .iter()
            .position(|op| matches!(op, DrawOp::DrawText { .. }))
            .unwrap();
        assert!(fill < first_text);
    }

    #[test]
    fn wheel_scrolls_only_containers_with_hidden_content() {
        let mut ui = loaded_ui(
            r#"<column name="body">
                <label name="first" text="one"/>
                <label text="two"/>
                <label text="three"/>
            </column>"#,
        );
        ui.set_root_size(Size::new(100.0, 30.0));
        ui.update().unwrap();

        // hover a label; the wheel event bubbles to the scrollable root
        assert!(!ui.dispatch(&InputEvent::PointerMove(Position::new(5.0, 5.0))).unwrap());
        assert!(ui.dispatch(&InputEvent::WheelY(12.0)).unwrap());

        ui.update().unwrap();
        assert_eq!(ui.tree[ui.root].container().offset_y(), 12.0);
        let first = ui.find_control("first").unwrap();
        assert_eq!(ui.tree[first].position.y, -12.0);

        // no hidden content on the X axis: not consumed
        assert!(!ui.dispatch(&InputEvent::WheelX(5.0)).unwrap());
    }

    thread_local! {
        static VICTIM: Cell<Option<ControlKey>> = Cell::new(None);
    }

    fn removing_update(ui: &mut Ui, _: ClassIndex, _: ControlKey) -> Result<(), Error> {
        if let Some(victim) = VICTIM.with(|cell| cell.take()) {
            ui.tree.remove_just(victim);
        }
        Ok(())
    }

    #[test]
    fn a_control_may_remove_a_later_sibling_during_its_own_update() {
        let mut ui = Ui::new(Box::new(HeadlessDevice::new()));
        ui.set_root_size(Size::new(100.0, 100.0));
        let saboteur_class = ui.register_class(ControlClass {
            name: "Saboteur".into(),
            xml_tag: None,
            xml_attributes: &[],
            accepts_children: false,
            handlers: Handlers { update: removing_update, ..DEFAULT_HANDLERS },
            storage: None,
        });

        let saboteur = ui.tree.create(saboteur_class);
        ui.tree.push(ui.root, saboteur);
        let victim = ui.tree.create(crate::builtin::LABEL_CLASS.into());
        ui.tree.push(ui.root, victim);
        let survivor = ui.tree.create(crate::builtin::LABEL_CLASS.into());
        ui.tree.push(ui.root, survivor);

        VICTIM.with(|cell| cell.set(Some(victim)));
        ui.update().unwrap();

        assert!(!ui.tree[victim].flags.contains(ControlFlags::ATTACHED));
        assert_eq!(ui.tree.count(ui.root), 2);
        assert_eq!(
            ui.tree.children(ui.root).collect::<Vec<_>>(),
            vec![saboteur, survivor],
        );
    }

    thread_local! {
        static RECREATED: RefCell<Vec<usize>> = RefCell::new(Vec::new());
    }

    fn recording_recreate(_: &mut Ui, _: ClassIndex, control: ControlKey) -> Result<(), Error> {
        RECREATED.with(|order| order.borrow_mut().push(control.index()));
        Ok(())
    }

    #[test]
    fn recreation_rebuilds_children_and_marginals_before_the_container() {
        let mut ui = Ui::new(Box::new(HeadlessDevice::new()));
        ui.set_root_size(Size::new(100.0, 100.0));
        let recording_class = ui.register_class(ControlClass {
            name: "Recording".into(),
            xml_tag: None,
            xml_attributes: &[],
            accepts_children: true,
            handlers: Handlers { recreate: recording_recreate, ..DEFAULT_HANDLERS },
            storage: None,
        });

        let parent = ui.tree.create_container(recording_class);
        ui.tree.push(ui.root, parent);
        let first = ui.tree.create(recording_class);
        ui.tree.push(parent, first);
        let second = ui.tree.create(recording_class);
        ui.tree.push(parent, second);
        let bar = ui.tree.create(recording_class);
        ui.set_marginal(parent, MarginalSlot::Right, bar);

        RECREATED.with(|order| order.borrow_mut().clear());
        ui.notify_device_lost();
        ui.recreate().unwrap();

        let order = RECREATED.with(|order| order.borrow().clone());
        assert_eq!(
            order,
            vec![first.index(), second.index(), bar.index(), parent.index()],
        );
    }
}
