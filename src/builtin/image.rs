//! The image class: a leaf control drawing a bitmap from the shared
//! store
//!
//! `source` is an index into the store (see
//! [`Ui::register_bitmap`](crate::core::ui::Ui::register_bitmap)). A
//! missing entry is not an error: the control stays empty, the way an
//! application degrades when an optional asset failed to load.

use crate::core::arena::ControlKey;
use crate::core::control::ClassIndex;
use crate::core::event::{ControlClass, Handlers, DEFAULT_HANDLERS};
use crate::core::ui::Ui;
use crate::core::visual::{Paint, Size};
use crate::core::xml::Attributes;
use crate::{cheap_string, error, Error};

pub const IMAGE: ControlClass = ControlClass {
    name: cheap_string("Image"),
    xml_tag: Some(cheap_string("image")),
    xml_attributes: &["source", "width", "height"],
    accepts_children: false,
    handlers: Handlers { populate, ..DEFAULT_HANDLERS },
    storage: None,
};

fn populate(ui: &mut Ui, _: ClassIndex, control: ControlKey, attributes: &Attributes) -> Result<(), Error> {
    let source = attributes.require("source")?;
    let explicit = Size::new(
        attributes.as_f32("width", 0.0)?,
        attributes.as_f32("height", 0.0)?,
    );
    let index: usize = source
        .parse()
        .map_err(|_| error!("image source {:?} is not a bitmap index", &**source))?;

    match ui.bitmap(index) {
        Some(bitmap) => {
            let natural = bitmap.size();
            let node = &mut ui.tree[control];
            node.size = match explicit.is_zero() {
                true => natural,
                false => explicit,
            };
            node.background = Paint::Bitmap(bitmap);
        },
        None => {
            log::warn!("bitmap {} is not in the store; image stays empty", index);
            ui.tree[control].size = explicit;
        },
    }
    Ok(())
}
