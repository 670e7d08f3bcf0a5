//! The `Ui` context: tree + classes + device + traversals
//!
//! One `Ui` is one control tree plus everything the tree's handlers
//! need: the class registry, the graphics device, the bitmap store and
//! the application callbacks. Embedders drive it from their message
//! loop: [`Ui::dispatch`] for input, [`Ui::update`] once per cycle,
//! [`Ui::render`] once per frame, and [`Ui::recreate`] after
//! [`Ui::notify_device_lost`].

use super::arena::ControlKey;
use super::bitmap::Bitmap;
use super::container::MarginalSlot;
use super::control::{ClassIndex, ControlFlags};
use super::device::{Canvas, GraphicsDevice, TextLayout};
use super::event::{Callback, CallbackMap, ControlClass, Handlers, InputEvent};
use super::tree::ControlTree;
use super::visual::{Paint, Position, Size};
use crate::{error, CheapString, Error};

pub struct Ui {
    pub tree: ControlTree,
    pub classes: Vec<ControlClass>,
    pub callbacks: CallbackMap,
    pub root: ControlKey,

    pub(crate) focused: Option<ControlKey>,
    pub(crate) hovered: Option<ControlKey>,

    device: Box<dyn GraphicsDevice>,
    device_generation: u64,
    bitmaps: Vec<Option<Bitmap>>,
    frames: u64,
}

impl std::fmt::Debug for Ui {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ui")
            .field("root", &self.root)
            .field("focused", &self.focused)
            .field("hovered", &self.hovered)
            .finish_non_exhaustive()
    }
}

impl Ui {
    /// Builds a context with the built-in classes registered and an
    /// empty root container.
    pub fn new(device: Box<dyn GraphicsDevice>) -> Self {
        let classes = crate::builtin::default_classes();
        let mut tree = ControlTree::new();
        let root = tree.create_container(crate::builtin::CONTAINER_CLASS.into());
        tree[root].flags.insert(ControlFlags::VERTICAL);

        Self {
            tree,
            classes,
            callbacks: CallbackMap::new(),
            root,
            focused: None,
            hovered: None,
            device,
            device_generation: 1,
            bitmaps: Vec::new(),
            frames: 0,
        }
    }

    /// Frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The window tells us its client size; the root view follows it.
    pub fn set_root_size(&mut self, size: Size) {
        let root = self.root;
        self.tree[root].size = size;
        self.tree[root].container_mut().set_view_size(size);
        self.tree[root].flags.insert(ControlFlags::LAYOUT_DIRTY);
    }

    pub fn register_class(&mut self, class: ControlClass) -> ClassIndex {
        self.classes.push(class);
        (self.classes.len() - 1).into()
    }

    pub fn register_callback(&mut self, name: CheapString, callback: Callback) {
        self.callbacks.insert(name, callback);
    }

    /// Class registered for an XML element, if any.
    pub fn class_for_tag(&self, tag: &str) -> Option<ClassIndex> {
        self.classes
            .iter()
            .position(|class| class.xml_tag.as_deref() == Some(tag))
            .map(ClassIndex::from)
    }

    /// Builds the view described by `source` into the root container.
    pub fn load_xml(&mut self, source: &str) -> Result<(), Error> {
        super::xml::load_view(self, source)
    }

    pub(crate) fn handlers(&self, key: ControlKey) -> (Handlers, ClassIndex) {
        let class = self.tree[key].class;
        (self.classes[usize::from(class)].handlers, class)
    }

    // ------------------------------------------------------- resources

    /// Current device generation; bumped by [`Self::notify_device_lost`].
    pub fn device_generation(&self) -> u64 {
        self.device_generation
    }

    /// Builds a text layout through the device, stamped with the
    /// current generation.
    pub fn create_text_layout(&mut self, text: CheapString, max_size: Size) -> Result<TextLayout, Error> {
        TextLayout::build(self.device.as_mut(), self.device_generation, text, max_size)
    }

    /// Adds `bitmap` to the shared store and uploads it; returns its
    /// index.
    pub fn register_bitmap(&mut self, bitmap: Bitmap) -> Result<usize, Error> {
        self.device.upload_bitmap(bitmap.size(), bitmap.data())?;
        bitmap.stamp_generation(self.device_generation);
        self.bitmaps.push(Some(bitmap));
        Ok(self.bitmaps.len() - 1)
    }

    /// A shared handle to the stored bitmap, or `None` for an invalid
    /// index. Dropping the handle is the release.
    pub fn bitmap(&self, index: usize) -> Option<Bitmap> {
        self.bitmaps.get(index)?.clone()
    }

    // ------------------------------------------------- tree operations

    /// Unlinks `control` and destroys its whole subtree: every node's
    /// class gets its detach notification exactly once, dangling
    /// focus/hover references are cleared, then the memory is freed.
    pub fn remove_clean(&mut self, control: ControlKey) {
        self.tree.remove_just(control);
        self.destroy_subtree(control);
    }

    fn destroy_subtree(&mut self, key: ControlKey) {
        while let Some(child) = self.tree.first_child(key) {
            self.tree.remove_just(child);
            self.destroy_subtree(child);
        }
        for slot in MarginalSlot::ALL {
            if let Some(marginal) = self.tree.marginal(key, slot) {
                self.tree.remove_just(marginal);
                self.destroy_subtree(marginal);
            }
        }

        let (handlers, class) = self.handlers(key);
        (handlers.detach)(self, class, key);

        if self.focused == Some(key) {
            self.focused = None;
        }
        if self.hovered == Some(key) {
            self.hovered = None;
        }
        self.tree.free(key);
    }

    /// Installs a marginal control and re-derives the owner's view
    /// rectangle.
    pub fn set_marginal(&mut self, owner: ControlKey, slot: MarginalSlot, control: ControlKey) {
        self.tree.attach_marginal(owner, slot, control);
        self.refresh_marginal_controls(owner);
    }

    /// Re-derives the owner's view size and the marginal strips' rects
    /// from the marginal controls' thicknesses.
    pub fn refresh_marginal_controls(&mut self, owner: ControlKey) {
        let (origin, size) = self.tree[owner].rect();

        let thickness = |ui: &Self, slot: MarginalSlot| -> f32 {
            match ui.tree.marginal(owner, slot) {
                Some(key) => match slot {
                    MarginalSlot::Left | MarginalSlot::Right => ui.tree[key].size.w,
                    MarginalSlot::Top | MarginalSlot::Bottom => ui.tree[key].size.h,
                },
                None => 0.0,
            }
        };

        let left = thickness(self, MarginalSlot::Left);
        let top = thickness(self, MarginalSlot::Top);
        let right = thickness(self, MarginalSlot::Right);
        let bottom = thickness(self, MarginalSlot::Bottom);

        let view = Size::new(
            (size.w - left - right).max(0.0),
            (size.h - top - bottom).max(0.0),
        );
        self.tree[owner].container_mut().set_view_size(view);

        // top & bottom strips span the full width; left & right sit
        // between them
        if let Some(key) = self.tree.marginal(owner, MarginalSlot::Top) {
            self.tree[key].position = origin;
            self.tree[key].size = Size::new(size.w, top);
        }
        if let Some(key) = self.tree.marginal(owner, MarginalSlot::Bottom) {
            self.tree[key].position = Position::new(origin.x, origin.y + size.h - bottom);
            self.tree[key].size = Size::new(size.w, bottom);
        }
        if let Some(key) = self.tree.marginal(owner, MarginalSlot::Left) {
            self.tree[key].position = Position::new(origin.x, origin.y + top);
            self.tree[key].size = Size::new(left, view.h);
        }
        if let Some(key) = self.tree.marginal(owner, MarginalSlot::Right) {
            self.tree[key].position = Position::new(origin.x + size.w - right, origin.y + top);
            self.tree[key].size = Size::new(right, view.h);
        }
    }

    // -------------------------------------------------------- lookups

    /// Depth-first search by name; `None` on a miss.
    pub fn find_control(&self, name: &str) -> Option<ControlKey> {
        self.find_named(self.root, name)
    }

    fn find_named(&self, key: ControlKey, name: &str) -> Option<ControlKey> {
        if self.tree[key].name.as_deref() == Some(name) {
            return Some(key);
        }
        for slot in MarginalSlot::ALL {
            if let Some(marginal) = self.tree.marginal(key, slot) {
                if let Some(found) = self.find_named(marginal, name) {
                    return Some(found);
                }
            }
        }
        self.tree
            .children(key)
            .find_map(|child| self.find_named(child, name))
    }

    /// Topmost child of `parent` containing `point` — front-to-back,
    /// i.e. reverse list order, since later siblings render on top.
    /// One level only; `None` when no child matches.
    pub fn find_child(&self, parent: ControlKey, point: Position) -> Option<ControlKey> {
        self.tree.children(parent).rev().find(|&child| {
            let control = &self.tree[child];
            control.flags.contains(ControlFlags::VISIBLE) && control.contains(point)
        })
    }

    /// Deepest visible control containing `point`, starting at the
    /// root. Marginal controls sit on top of their owner's view.
    pub fn find_control_at(&self, point: Position) -> Option<ControlKey> {
        let root = &self.tree[self.root];
        if !root.flags.contains(ControlFlags::VISIBLE) || !root.contains(point) {
            return None;
        }

        let mut current = self.root;
        loop {
            let marginal_hit = MarginalSlot::ALL.iter().find_map(|&slot| {
                let key = self.tree.marginal(current, slot)?;
                let control = &self.tree[key];
                (control.flags.contains(ControlFlags::VISIBLE) && control.contains(point))
                    .then_some(key)
            });

            match marginal_hit.or_else(|| self.find_child(current, point)) {
                Some(deeper) => current = deeper,
                None => return Some(current),
            }
        }
    }

    // ----------------------------------------------------- traversals

    /// One update cycle over the whole tree. Controls may mutate the
    /// list during their own update; the traversal captures each next
    /// sibling before invoking the current control.
    pub fn update(&mut self) -> Result<(), Error> {
        self.update_control(self.root)
    }

    pub fn update_control(&mut self, key: ControlKey) -> Result<(), Error> {
        let (handlers, class) = self.handlers(key);
        (handlers.update)(self, class, key)?;

        if !self.tree.contains(key) {
            // the control removed itself; nothing below it to visit
            return Ok(());
        }

        let mut cursor = self.tree.cursor(key);
        while let Some(child) = cursor.next(&self.tree) {
            self.update_control(child)?;
        }
        for slot in MarginalSlot::ALL {
            if let Some(marginal) = self.tree.marginal(key, slot) {
                self.update_control(marginal)?;
            }
        }
        Ok(())
    }

    /// One frame. The canvas is the embedder's render target for this
    /// frame; children draw in list order (back to front).
    pub fn render(&mut self, canvas: &mut dyn Canvas) -> Result<(), Error> {
        self.frames += 1;
        self.render_control(self.root, canvas)
    }

    pub fn render_control(&mut self, key: ControlKey, canvas: &mut dyn Canvas) -> Result<(), Error> {
        if !self.tree[key].flags.contains(ControlFlags::VISIBLE) {
            return Ok(());
        }
        let (handlers, class) = self.handlers(key);
        (handlers.render)(self, class, key, canvas)
    }

    /// Routes one input event.
    ///
    /// Pointer events hit-test front-to-back and then bubble towards
    /// the root; wheel events start at the hovered control; key presses
    /// go to the focused control, or broadcast head-to-tail when
    /// nothing holds focus. Returns whether some control consumed the
    /// event.
    pub fn dispatch(&mut self, event: &InputEvent) -> Result<bool, Error> {
        if let Some(point) = event.position() {
            let target = self.find_control_at(point);
            if matches!(event, InputEvent::PointerMove(_)) {
                self.hovered = target;
            }
            return match target {
                Some(target) => self.bubble(target, event),
                None => Ok(false),
            };
        }

        match event {
            InputEvent::WheelX(_) | InputEvent::WheelY(_) => match self.hovered {
                Some(hovered) if self.tree.contains(hovered) => self.bubble(hovered, event),
                _ => Ok(false),
            },
            InputEvent::KeyPress(_) => match self.focused {
                Some(focused) if self.tree.contains(focused) => self.bubble(focused, event),
                _ => self.broadcast(self.root, event),
            },
            InputEvent::FocusLoss => match self.focused.take() {
                Some(focused) if self.tree.contains(focused) => {
                    let (handlers, class) = self.handlers(focused);
                    (handlers.input)(self, class, focused, focused, event)
                },
                _ => Ok(false),
            },
            _ => unreachable!("positional events are routed above"),
        }
    }

    /// Delivers `event` to `target` and then to its ancestors until
    /// one consumes it. The parent link is captured before each
    /// handler runs, so handlers may unlink the control they run on.
    fn bubble(&mut self, target: ControlKey, event: &InputEvent) -> Result<bool, Error> {
        let mut current = Some(target);
        while let Some(key) = current {
            if !self.tree.contains(key) {
                break;
            }
            let parent = self.tree.parent(key);
            let (handlers, class) = self.handlers(key);
            if (handlers.input)(self, class, key, target, event)? {
                return Ok(true);
            }
            current = parent;
        }
        Ok(false)
    }

    /// Head-to-tail delivery, stopping at the first consumer.
    fn broadcast(&mut self, key: ControlKey, event: &InputEvent) -> Result<bool, Error> {
        let (handlers, class) = self.handlers(key);
        if (handlers.input)(self, class, key, key, event)? {
            return Ok(true);
        }
        let mut cursor = self.tree.cursor(key);
        while let Some(child) = cursor.next(&self.tree) {
            if self.broadcast(child, event)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ----------------------------------------- the recreation protocol

    /// The adapter is gone; every device resource in the tree is now
    /// stale. Call [`Self::recreate`] next.
    pub fn notify_device_lost(&mut self) {
        self.device_generation += 1;
        log::warn!("graphics device lost; resources are stale (generation {})", self.device_generation);
    }

    /// Rebuilds every device resource in the tree, children first,
    /// bottom-up: list children, then marginal controls, then the
    /// container itself, so no control ever observes a partially
    /// rebuilt descendant.
    ///
    /// A failing control is flagged [`ControlFlags::RECREATE_FAILED`]
    /// and reported, but its siblings are still attempted — the first
    /// failure is returned once the whole tree has been walked. Calling
    /// this twice without an intervening loss is safe and leaves an
    /// equivalent resource state.
    pub fn recreate(&mut self) -> Result<(), Error> {
        let mut first_failure = None;

        // shared bitmaps before any control that may draw them
        let handles: Vec<Bitmap> = self.bitmaps.iter().flatten().cloned().collect();
        for bitmap in handles {
            match self.device.upload_bitmap(bitmap.size(), bitmap.data()) {
                Ok(()) => bitmap.stamp_generation(self.device_generation),
                Err(e) => {
                    log::warn!("bitmap re-upload failed: {}", e);
                    first_failure.get_or_insert(e);
                },
            }
        }

        self.recreate_control(self.root, &mut first_failure);

        match first_failure {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    fn recreate_control(&mut self, key: ControlKey, first_failure: &mut Option<Error>) {
        let mut cursor = self.tree.cursor(key);
        while let Some(child) = cursor.next(&self.tree) {
            self.recreate_control(child, first_failure);
        }
        for slot in MarginalSlot::ALL {
            if let Some(marginal) = self.tree.marginal(key, slot) {
                self.recreate_control(marginal, first_failure);
            }
        }

        let (handlers, class) = self.handlers(key);
        match (handlers.recreate)(self, class, key) {
            Ok(()) => {
                let generation = self.device_generation;
                let node = &mut self.tree[key];
                node.device_generation = generation;
                node.flags.remove(ControlFlags::RECREATE_FAILED);
            },
            Err(e) => {
                log::warn!("recreation failed for control {}: {}", key.index(), e);
                self.tree[key].flags.insert(ControlFlags::RECREATE_FAILED);
                first_failure.get_or_insert(e);
            },
        }
    }

    /// Rebuilds the device side of a control's paint slots under the
    /// current generation. The default recreate handler; classes with
    /// extra resources call it and then rebuild their own.
    pub fn recreate_paints(&mut self, key: ControlKey) -> Result<(), Error> {
        self.recreate_paint_slot(key, false)?;
        self.recreate_paint_slot(key, true)
    }

    fn recreate_paint_slot(&mut self, key: ControlKey, foreground: bool) -> Result<(), Error> {
        let description = {
            let control = &self.tree[key];
            let paint = match foreground {
                true => &control.foreground,
                false => &control.background,
            };
            match paint {
                Paint::Text { layout, color } => {
                    Some((layout.text().clone(), layout.max_size(), *color))
                },
                _ => None,
            }
        };

        if let Some((text, max_size, color)) = description {
            let layout = self.create_text_layout(text, max_size)?;
            let control = &mut self.tree[key];
            let slot = match foreground {
                true => &mut control.foreground,
                false => &mut control.background,
            };
            // the stale layout drops here; nothing dangles
            *slot = Paint::Text { layout, color };
        }
        Ok(())
    }

    /// Marks `key`'s resources as built under the current generation.
    /// The loader calls this after a successful populate.
    pub(crate) fn mark_device_current(&mut self, key: ControlKey) {
        let generation = self.device_generation;
        self.tree[key].device_generation = generation;
    }

    pub fn focused(&self) -> Option<ControlKey> {
        self.focused
    }

    /// Grabs or releases keyboard focus.
    pub fn set_focus(&mut self, key: Option<ControlKey>) {
        self.focused = key;
    }

    /// Fires the named application callback, if one is registered.
    pub fn fire_callback(&mut self, name: &CheapString, source: ControlKey) -> Result<(), Error> {
        match self.callbacks.get(name) {
            Some(callback) => callback(self, source),
            None => Err(error!("no callback registered under {:?}", &**name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::test_device::FailingDevice;
    use crate::core::device::HeadlessDevice;
    use crate::core::visual::Paint;
    use rgb::RGBA8;

    fn headless_ui() -> Ui {
        let mut ui = Ui::new(Box::new(HeadlessDevice::new()));
        ui.set_root_size(Size::new(640.0, 480.0));
        ui
    }

    fn labelled_child(ui: &mut Ui, text: &'static str, position: Position, size: Size) -> ControlKey {
        let key = ui.tree.create(crate::builtin::LABEL_CLASS.into());
        let layout = ui
            .create_text_layout(text.into(), Size::new(0.0, 0.0))
            .unwrap();
        let control = &mut ui.tree[key];
        control.background = Paint::Text { layout, color: RGBA8::new(0, 0, 0, 255) };
        control.position = position;
        control.size = size;
        ui.tree.push(ui.root, key);
        ui.mark_device_current(key);
        key
    }

    #[test]
    fn end_to_end_list_scenario() {
        let mut ui = headless_ui();
        let a = labelled_child(&mut ui, "a", Position::new(0.0, 0.0), Size::new(100.0, 50.0));
        let b = labelled_child(&mut ui, "b", Position::new(0.0, 50.0), Size::new(100.0, 50.0));
        let c = labelled_child(&mut ui, "c", Position::new(0.0, 100.0), Size::new(100.0, 50.0));
        let _ = a;

        assert_eq!(ui.tree.child_at(ui.root, 1), Some(b));
        ui.tree.remove_just(b);
        assert_eq!(ui.tree.child_at(ui.root, 1), Some(c));
        assert_eq!(ui.tree.count(ui.root), 2);

        // inside C's bounds, outside A's
        let hit = ui.find_child(ui.root, Position::new(50.0, 120.0));
        assert_eq!(hit, Some(c));
    }

    #[test]
    fn find_child_prefers_the_topmost_sibling() {
        let mut ui = headless_ui();
        let below = labelled_child(&mut ui, "below", Position::new(0.0, 0.0), Size::new(100.0, 100.0));
        let above = labelled_child(&mut ui, "above", Position::new(50.0, 50.0), Size::new(100.0, 100.0));

        // overlap region: the later sibling renders on top and wins
        assert_eq!(ui.find_child(ui.root, Position::new(75.0, 75.0)), Some(above));
        assert_eq!(ui.find_child(ui.root, Position::new(25.0, 25.0)), Some(below));
        assert_eq!(ui.find_child(ui.root, Position::new(200.0, 200.0)), None);
    }

    #[test]
    fn find_control_walks_names_depth_first() {
        let mut ui = headless_ui();
        let inner = ui.tree.create_container(crate::builtin::CONTAINER_CLASS.into());
        ui.tree.push(ui.root, inner);
        let leaf = ui.tree.create(crate::builtin::LABEL_CLASS.into());
        ui.tree[leaf].name = Some("status".into());
        ui.tree.push(inner, leaf);

        assert_eq!(ui.find_control("status"), Some(leaf));
        assert_eq!(ui.find_control("missing"), None);
    }

    #[test]
    fn recreate_is_idempotent() {
        let mut ui = headless_ui();
        let a = labelled_child(&mut ui, "a", Position::new(0.0, 0.0), Size::new(100.0, 50.0));
        let b = labelled_child(&mut ui, "b", Position::new(0.0, 50.0), Size::new(100.0, 50.0));

        ui.notify_device_lost();
        ui.recreate().unwrap();
        let generation = ui.device_generation();
        let snapshot = |ui: &Ui| {
            [a, b, ui.root].map(|key| {
                let control = &ui.tree[key];
                (control.device_current(generation), control.flags)
            })
        };
        let first = snapshot(&ui);
        assert!(first.iter().all(|(current, _)| *current));

        ui.recreate().unwrap();
        assert_eq!(snapshot(&ui), first);
    }

    #[test]
    fn recreate_attempts_every_sibling_and_reports_the_first_failure() {
        let mut device = FailingDevice::new();
        device.fail_marker = Some("poison");
        let mut ui = Ui::new(Box::new(device));
        ui.set_root_size(Size::new(640.0, 480.0));

        let a = labelled_child(&mut ui, "a", Position::new(0.0, 0.0), Size::new(100.0, 50.0));
        let b = labelled_child(&mut ui, "b-poison", Position::new(0.0, 50.0), Size::new(100.0, 50.0));
        let c = labelled_child(&mut ui, "c", Position::new(0.0, 100.0), Size::new(100.0, 50.0));

        ui.notify_device_lost();
        let err = ui.recreate().unwrap_err();
        assert!(err.msg.as_deref().unwrap_or("").contains("poison"));

        let generation = ui.device_generation();
        // the third child was still attempted, and succeeded
        assert!(ui.tree[c].device_current(generation));
        assert!(ui.tree[a].device_current(generation));
        // the failing child is explicitly failed, not skipped
        assert!(ui.tree[b].flags.contains(ControlFlags::RECREATE_FAILED));
        assert!(!ui.tree[b].device_current(generation));
    }

    #[test]
    fn remove_clean_notifies_and_clears_references() {
        let mut ui = headless_ui();
        let inner = ui.tree.create_container(crate::builtin::CONTAINER_CLASS.into());
        ui.tree.push(ui.root, inner);
        let leaf = labelled_child(&mut ui, "leaf", Position::new(0.0, 0.0), Size::new(10.0, 10.0));
        ui.tree.remove_just(leaf);
        ui.tree.push(inner, leaf);

        ui.focused = Some(leaf);
        ui.hovered = Some(inner);

        ui.remove_clean(inner);
        assert!(!ui.tree.contains(inner));
        assert!(!ui.tree.contains(leaf));
        assert_eq!(ui.focused, None);
        assert_eq!(ui.hovered, None);
        assert_eq!(ui.tree.count(ui.root), 0);
    }

    #[test]
    fn bitmap_lookup_misses_are_none() {
        let mut ui = headless_ui();
        assert!(ui.bitmap(0).is_none());
        let bitmap = Bitmap::solid(RGBA8::new(1, 2, 3, 255), 2, 2);
        let index = ui.register_bitmap(bitmap.clone()).unwrap();
        let handle = ui.bitmap(index).unwrap();
        assert!(handle.ptr_eq(&bitmap));
        assert!(ui.bitmap(index + 1).is_none());
    }
}
