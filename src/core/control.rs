//! The Control structure

use super::arena::OptionalControlKey;
use super::container::ContainerState;
use super::visual::{Paint, Position, Size};
use crate::CheapString;
use bitflags::bitflags;

bitflags! {
    /// Capability & state bits of a control.
    pub struct ControlFlags: u32 {
        /// Rendered and hit-testable.
        const VISIBLE          = 0b0000_0001;
        /// Linked into a parent (list position or marginal slot).
        const ATTACHED         = 0b0000_0010;
        /// Lives in a fixed marginal slot, not in the sibling list.
        const MARGINAL         = 0b0000_0100;
        /// Container with at least one occupied marginal slot.
        const HAS_MARGINAL     = 0b0000_1000;
        /// Child list or geometry changed; container re-stacks on update.
        const LAYOUT_DIRTY     = 0b0001_0000;
        /// Last recreation attempt on this control failed.
        const RECREATE_FAILED  = 0b0010_0000;
        /// Container stacks its children top-to-bottom.
        const VERTICAL         = 0b0100_0000;
    }
}

/// Index of a [`ControlClass`](super::event::ControlClass) in the
/// [`Ui`](super::ui::Ui) registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ClassIndex(u16);

impl From<usize> for ClassIndex {
    fn from(i: usize) -> Self {
        Self(u16::try_from(i).expect("class registry overflow"))
    }
}

impl From<ClassIndex> for usize {
    fn from(i: ClassIndex) -> usize {
        i.0 as usize
    }
}

/// A node of the control tree.
///
/// The sibling links (`prev`/`next`) and the `parent` back-reference
/// are owned by the parent container: only the tree's structural
/// operations may touch them. Everything else is class/embedder state.
#[derive(Debug)]
pub struct Control {
    pub(crate) prev: OptionalControlKey,
    pub(crate) next: OptionalControlKey,
    /// Non-owning; `None` marks the logical root of its own subtree.
    pub(crate) parent: OptionalControlKey,

    pub flags: ControlFlags,
    pub class: ClassIndex,
    pub name: Option<CheapString>,

    /// Absolute position of the top-left corner.
    pub position: Position,
    pub size: Size,

    pub background: Paint,
    pub foreground: Paint,

    /// Device generation the control's resources were last built under;
    /// 0 means never built.
    pub(crate) device_generation: u64,

    /// The container capability, composed rather than inherited.
    pub container: Option<Box<ContainerState>>,
}

impl Control {
    pub fn new(class: ClassIndex) -> Self {
        Self {
            prev: OptionalControlKey::NONE,
            next: OptionalControlKey::NONE,
            parent: OptionalControlKey::NONE,
            flags: ControlFlags::VISIBLE,
            class,
            name: None,
            position: Position::zero(),
            size: Size::zero(),
            background: Paint::None,
            foreground: Paint::None,
            device_generation: 0,
            container: None,
        }
    }

    pub fn new_container(class: ClassIndex) -> Self {
        let mut control = Self::new(class);
        control.container = Some(Box::new(ContainerState::new()));
        control
    }

    /// Detached, or attached directly under no one: the root of its own
    /// subtree.
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_container(&self) -> bool {
        self.container.is_some()
    }

    /// The container state; precondition: this control is a container.
    pub fn container(&self) -> &ContainerState {
        self.container.as_deref().expect("not a container")
    }

    pub fn container_mut(&mut self) -> &mut ContainerState {
        self.container.as_deref_mut().expect("not a container")
    }

    pub fn rect(&self) -> (Position, Size) {
        (self.position, self.size)
    }

    /// True when `point` falls inside this control's rectangle.
    pub fn contains(&self, point: Position) -> bool {
        super::visual::rect_contains(self.rect(), point)
    }

    /// Device resources currently valid under `generation`?
    pub fn device_current(&self, generation: u64) -> bool {
        self.device_generation == generation
            && !self.flags.contains(ControlFlags::RECREATE_FAILED)
    }
}
