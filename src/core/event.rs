//! Input events & class dispatch tables
//!
//! Control behavior is class-based: every control references a
//! [`ControlClass`], and a class is mostly a [`Handlers`] table of
//! plain function pointers. Handlers receive the whole [`Ui`] context,
//! so they may mutate the tree — including structurally — subject to
//! the traversal discipline documented on
//! [`Cursor`](super::tree::Cursor).

use super::arena::ControlKey;
use super::control::ClassIndex;
use super::device::Canvas;
use super::ui::Ui;
use super::visual::Position;
use super::xml::Attributes;
use crate::{error, CheapString, Error};
use std::any::Any;
use std::collections::HashMap;

/// Events resulting from user interaction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerMove(Position),
    PointerDown(Position),
    PointerUp(Position),
    /// Horizontal scroll, in pixels.
    WheelX(f32),
    /// Vertical scroll, in pixels.
    WheelY(f32),
    KeyPress(char),
    /// The focused control is being unselected.
    FocusLoss,
}

impl InputEvent {
    /// The pointer position for events routed by hit-testing.
    pub fn position(&self) -> Option<Position> {
        match self {
            InputEvent::PointerMove(point)
            | InputEvent::PointerDown(point)
            | InputEvent::PointerUp(point) => Some(*point),
            _ => None,
        }
    }
}

/// Sets up a control's fields (and optionally, its children) when the
/// XML loader attaches it.
///
/// # Arguments
///
/// - `control`: the just-created control to initialize
/// - `attributes`: the validated attributes of the XML element
pub type Populator = fn(
    ui: &mut Ui,
    class: ClassIndex,
    control: ControlKey,
    attributes: &Attributes,
) -> Result<(), Error>;

/// Runs once per update cycle, before the control's children.
pub type Updater = fn(
    ui: &mut Ui,
    class: ClassIndex,
    control: ControlKey,
) -> Result<(), Error>;

/// Draws the control. Containers are responsible for their three
/// chains (background, children, foreground) from here.
pub type Renderer = fn(
    ui: &mut Ui,
    class: ClassIndex,
    control: ControlKey,
    canvas: &mut dyn Canvas,
) -> Result<(), Error>;

/// Processes user input.
///
/// # Arguments
///
/// - `control`: the control selected for handling
/// - `target`: the control the user actually interacted with (the
///   hit-test result when the event bubbles)
///
/// # Return value
///
/// `true` if the event was consumed and must not propagate further.
pub type InputHandler = fn(
    ui: &mut Ui,
    class: ClassIndex,
    control: ControlKey,
    target: ControlKey,
    event: &InputEvent,
) -> Result<bool, Error>;

/// Rebuilds the control's device resources after adapter loss. Runs
/// after the control's children have already been recreated.
pub type Recreator = fn(
    ui: &mut Ui,
    class: ClassIndex,
    control: ControlKey,
) -> Result<(), Error>;

/// Notified exactly once, right before the control's memory is
/// released, on every removal path.
pub type Detacher = fn(
    ui: &mut Ui,
    class: ClassIndex,
    control: ControlKey,
);

/// Dispatch table for [`ControlClass`]es.
#[derive(Copy, Clone)]
pub struct Handlers {
    pub populate: Populator,
    pub update: Updater,
    pub render: Renderer,
    pub input: InputHandler,
    pub recreate: Recreator,
    pub detach: Detacher,
}

fn populate(ui: &mut Ui, class: ClassIndex, _: ControlKey, _: &Attributes) -> Result<(), Error> {
    Err(error!("{}: populate is unimplemented", ui.classes[usize::from(class)].name))
}

fn update(_: &mut Ui, _: ClassIndex, _: ControlKey) -> Result<(), Error> {
    Ok(())
}

fn render(ui: &mut Ui, _: ClassIndex, control: ControlKey, canvas: &mut dyn Canvas) -> Result<(), Error> {
    let node = &ui.tree[control];
    node.background.draw(canvas, node.rect());
    node.foreground.draw(canvas, node.rect());
    Ok(())
}

fn input(_: &mut Ui, _: ClassIndex, _: ControlKey, _: ControlKey, _: &InputEvent) -> Result<bool, Error> {
    Ok(false)
}

fn recreate(ui: &mut Ui, _: ClassIndex, control: ControlKey) -> Result<(), Error> {
    ui.recreate_paints(control)
}

fn detach(_: &mut Ui, _: ClassIndex, _: ControlKey) {}

/// Default handlers (see detailed doc)
///
/// - `populate`: returns an error
/// - `update`: does nothing
/// - `render`: paints the background & foreground slots
/// - `input`: does nothing, returns false
/// - `recreate`: rebuilds the paint slots' device resources
/// - `detach`: does nothing
pub const DEFAULT_HANDLERS: Handlers = Handlers {
    populate,
    update,
    render,
    input,
    recreate,
    detach,
};

/// A kind of control: its XML binding, its dispatch table and its
/// class-wide storage.
pub struct ControlClass {
    pub name: CheapString,
    /// XML element this class is instantiated for, if any.
    pub xml_tag: Option<CheapString>,
    /// Attribute names the loader accepts on that element.
    pub xml_attributes: &'static [&'static str],
    pub accepts_children: bool,
    pub handlers: Handlers,
    /// Must be `None` initially; classes initialize it lazily.
    pub storage: Option<Box<dyn Any>>,
}

impl Clone for ControlClass {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            xml_tag: self.xml_tag.clone(),
            xml_attributes: self.xml_attributes,
            accepts_children: self.accepts_children,
            handlers: self.handlers,
            storage: match self.storage.is_some() {
                true => panic!("tried to clone a ControlClass with initialized storage"),
                false => None,
            },
        }
    }
}

/// Utility function for handlers to get and downcast their class
/// storage.
pub fn get_storage<T: Any>(classes: &mut [ControlClass], class: ClassIndex) -> Option<&mut T> {
    classes[usize::from(class)].storage.as_mut()?.downcast_mut()
}

/// Application callbacks fired by controls (e.g. button activation),
/// looked up by the name given in the view description.
pub type Callback = fn(&mut Ui, ControlKey) -> Result<(), Error>;

pub type CallbackMap = HashMap<CheapString, Callback>;
