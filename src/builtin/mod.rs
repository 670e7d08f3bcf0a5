//! Built-in control classes
//!
//! The stock classes every [`Ui`](crate::core::ui::Ui) starts with.
//! Their registry indices are stable, so embedders and tests can
//! reference them directly.

pub mod button;
pub mod container;
pub mod image;
pub mod label;
pub mod scrollbar;

use crate::core::event::ControlClass;

/// `<column>` — also the class of the root container.
pub const CONTAINER_CLASS: usize = 0;
/// `<row>`
pub const ROW_CLASS: usize = 1;
/// `<button>`
pub const BUTTON_CLASS: usize = 2;
/// `<label>`
pub const LABEL_CLASS: usize = 3;
/// `<image>`
pub const IMAGE_CLASS: usize = 4;
/// `<scrollbar>`
pub const SCROLLBAR_CLASS: usize = 5;

pub fn default_classes() -> Vec<ControlClass> {
    vec![
        container::COLUMN.clone(),
        container::ROW.clone(),
        button::BUTTON.clone(),
        label::LABEL.clone(),
        image::IMAGE.clone(),
        scrollbar::SCROLLBAR.clone(),
    ]
}
