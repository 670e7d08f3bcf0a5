//! The button class
//!
//! Activation fires the application callback registered under the
//! control's `name`, the hook the view description and the embedder
//! agree on:
//!
//! ```ignore
//! ui.load_xml(r#"<button name="btn_ok" text="OK!"/>"#)?;
//! ui.register_callback("btn_ok".into(), |ui, _key| { /* ... */ Ok(()) });
//! ```

use crate::core::arena::ControlKey;
use crate::core::control::ClassIndex;
use crate::core::event::{ControlClass, Handlers, InputEvent, DEFAULT_HANDLERS};
use crate::core::ui::Ui;
use crate::core::visual::{Paint, Size};
use crate::core::xml::Attributes;
use crate::{cheap_string, Error};
use rgb::RGBA8;

const FACE: RGBA8 = RGBA8 { r: 64, g: 64, b: 64, a: 255 };
const TEXT_COLOR: RGBA8 = RGBA8 { r: 255, g: 255, b: 255, a: 255 };

/// Extra face space around the text layout.
const PADDING: Size = Size::new(16.0, 8.0);

pub const BUTTON: ControlClass = ControlClass {
    name: cheap_string("Button"),
    xml_tag: Some(cheap_string("button")),
    xml_attributes: &["text", "color"],
    accepts_children: false,
    handlers: Handlers { populate, input, ..DEFAULT_HANDLERS },
    storage: None,
};

fn populate(ui: &mut Ui, _: ClassIndex, control: ControlKey, attributes: &Attributes) -> Result<(), Error> {
    let text = attributes.require("text")?.clone();
    let face = attributes.as_color("color")?.unwrap_or(FACE);
    let layout = ui.create_text_layout(text, Size::zero())?;
    let text_size = layout.size();

    let node = &mut ui.tree[control];
    node.background = Paint::SolidColor(face);
    node.foreground = Paint::Text { layout, color: TEXT_COLOR };
    node.size = Size::new(text_size.w + PADDING.w, text_size.h + PADDING.h);
    Ok(())
}

fn input(ui: &mut Ui, _: ClassIndex, control: ControlKey, target: ControlKey, event: &InputEvent) -> Result<bool, Error> {
    if control != target {
        return Ok(false);
    }
    match event {
        InputEvent::PointerDown(_) => {
            ui.set_focus(Some(control));
            Ok(true)
        },
        InputEvent::PointerUp(_) => {
            activate(ui, control)?;
            Ok(true)
        },
        InputEvent::KeyPress(' ') | InputEvent::KeyPress('\r') => {
            activate(ui, control)?;
            Ok(true)
        },
        InputEvent::FocusLoss => Ok(true),
        _ => Ok(false),
    }
}

/// Fires the callback registered under this control's name. An unnamed
/// button, or a name nothing is registered for, activates silently.
fn activate(ui: &mut Ui, control: ControlKey) -> Result<(), Error> {
    let Some(name) = ui.tree[control].name.clone() else {
        return Ok(());
    };
    match ui.callbacks.contains_key(&name) {
        true => ui.fire_callback(&name, control),
        false => {
            log::debug!("button {:?} has no registered callback", &*name);
            Ok(())
        },
    }
}
