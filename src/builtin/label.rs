//! The label class: a leaf text control

use crate::core::arena::ControlKey;
use crate::core::control::ClassIndex;
use crate::core::event::{ControlClass, Handlers, DEFAULT_HANDLERS};
use crate::core::ui::Ui;
use crate::core::visual::{Paint, Size};
use crate::core::xml::Attributes;
use crate::{cheap_string, Error};
use rgb::RGBA8;

const TEXT_COLOR: RGBA8 = RGBA8 { r: 255, g: 255, b: 255, a: 255 };

pub const LABEL: ControlClass = ControlClass {
    name: cheap_string("Label"),
    xml_tag: Some(cheap_string("label")),
    xml_attributes: &["text", "color"],
    accepts_children: false,
    handlers: Handlers { populate, ..DEFAULT_HANDLERS },
    storage: None,
};

fn populate(ui: &mut Ui, _: ClassIndex, control: ControlKey, attributes: &Attributes) -> Result<(), Error> {
    let text = attributes.require("text")?.clone();
    let color = attributes.as_color("color")?.unwrap_or(TEXT_COLOR);
    let layout = ui.create_text_layout(text, Size::zero())?;

    let node = &mut ui.tree[control];
    node.size = layout.size();
    node.foreground = Paint::Text { layout, color };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::HeadlessDevice;

    #[test]
    fn labels_size_themselves_from_their_layout() {
        let mut ui = Ui::new(Box::new(HeadlessDevice::new()));
        ui.set_root_size(Size::new(200.0, 200.0));
        ui.load_xml(r##"<label name="status" text="hello" color="#ff0000"/>"##).unwrap();

        let label = ui.find_control("status").unwrap();
        let node = &ui.tree[label];
        let Paint::Text { layout, color } = &node.foreground else {
            panic!("label foreground is not text");
        };
        assert_eq!(node.size, layout.size());
        assert!(node.size.h > 0.0);
        assert_eq!(*color, RGBA8 { r: 255, g: 0, b: 0, a: 255 });
    }
}
