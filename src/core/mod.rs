//! Arena, control tree, traversals, device facade & recreation protocol

pub mod arena;
pub mod bitmap;
pub mod container;
pub mod control;
pub mod device;
pub mod event;
pub mod tree;
pub mod ui;
pub mod inline;
pub mod visual;
pub mod xml;

pub use rgb;
