//! The control tree: arena storage + doubly linked sibling order
//!
//! Containers own the membership links of their children; every
//! structural operation here maintains three invariants at all times:
//!
//! * bidirectional consistency — `head.prev == None`,
//!   `tail.next == None`, and `n.next.prev == n` for every linked `n`;
//! * the cached child count equals the number of nodes reachable from
//!   `head`;
//! * a control is linked into at most one place (one list position or
//!   one marginal slot).
//!
//! Mutation during traversal is legal under the cursor discipline: the
//! next key to visit is captured *before* the current control's
//! callback runs, so that callback may unlink or insert siblings
//! freely. See [`Cursor`].

use super::arena::{Arena, ControlKey, OptionalControlKey};
use super::container::MarginalSlot;
use super::control::{ClassIndex, Control, ControlFlags};

pub struct ControlTree {
    arena: Arena,
}

impl ControlTree {
    pub fn new() -> Self {
        Self { arena: Arena::new() }
    }

    /// Creates a detached leaf control.
    pub fn create(&mut self, class: ClassIndex) -> ControlKey {
        self.arena.insert(Control::new(class))
    }

    /// Creates a detached container control.
    pub fn create_container(&mut self, class: ClassIndex) -> ControlKey {
        self.arena.insert(Control::new_container(class))
    }

    pub fn contains(&self, key: ControlKey) -> bool {
        self.arena.contains(key)
    }

    pub fn get(&self, key: ControlKey) -> Option<&Control> {
        self.arena.get(key)
    }

    pub fn get_mut(&mut self, key: ControlKey) -> Option<&mut Control> {
        self.arena.get_mut(key)
    }

    /// Keys of every live control, in arena order (not tree order).
    pub fn keys(&self) -> impl Iterator<Item = ControlKey> + '_ {
        self.arena.keys()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn parent(&self, key: ControlKey) -> Option<ControlKey> {
        self.arena[key].parent.get()
    }

    pub fn next_sibling(&self, key: ControlKey) -> Option<ControlKey> {
        self.arena[key].next.get()
    }

    pub fn prev_sibling(&self, key: ControlKey) -> Option<ControlKey> {
        self.arena[key].prev.get()
    }

    pub fn first_child(&self, parent: ControlKey) -> Option<ControlKey> {
        self.arena[parent].container.as_ref()?.head.get()
    }

    pub fn last_child(&self, parent: ControlKey) -> Option<ControlKey> {
        self.arena[parent].container.as_ref()?.tail.get()
    }

    /// Cached list length; 0 for non-containers.
    pub fn count(&self, parent: ControlKey) -> usize {
        match self.arena[parent].container.as_ref() {
            Some(state) => state.count,
            None => 0,
        }
    }

    /// Appends `child` at the tail of `parent`'s list and runs the
    /// post-insert hook. Precondition: `child` is not linked anywhere.
    pub fn push(&mut self, parent: ControlKey, child: ControlKey) {
        self.insert_only(parent, None, child);
        self.after_insert(parent, child);
    }

    /// Splices `child` immediately before `before`, or at the tail when
    /// `before` is `None` (the end position), then runs the post-insert
    /// hook.
    pub fn insert(&mut self, parent: ControlKey, before: Option<ControlKey>, child: ControlKey) {
        self.insert_only(parent, before, child);
        self.after_insert(parent, child);
    }

    /// The splice itself, without the post-insert hook. [`Self::insert`]
    /// and [`Self::move_child_to`] share it; the latter must not fire
    /// the hook a second time.
    fn insert_only(&mut self, parent: ControlKey, before: Option<ControlKey>, child: ControlKey) {
        debug_assert!(self.arena[parent].is_container(), "insert into a non-container");
        debug_assert!(
            self.arena[child].parent.is_none()
                && self.arena[child].prev.is_none()
                && self.arena[child].next.is_none(),
            "control is already linked",
        );
        debug_assert!(
            before.map_or(true, |b| self.arena[b].parent.get() == Some(parent)),
            "insert position belongs to another container",
        );

        match before {
            None => {
                let tail = self.arena[parent].container().tail.get();
                match tail {
                    Some(tail) => {
                        self.arena[tail].next = child.into();
                        self.arena[child].prev = tail.into();
                    },
                    None => self.arena[parent].container_mut().head = child.into(),
                }
                self.arena[parent].container_mut().tail = child.into();
            },
            Some(before) => {
                let prev = self.arena[before].prev.get();
                self.arena[child].next = before.into();
                self.arena[before].prev = child.into();
                match prev {
                    Some(prev) => {
                        self.arena[prev].next = child.into();
                        self.arena[child].prev = prev.into();
                    },
                    None => self.arena[parent].container_mut().head = child.into(),
                }
            },
        }

        self.arena[parent].container_mut().count += 1;
        self.arena[child].parent = parent.into();
        self.arena[child].flags.insert(ControlFlags::ATTACHED);
    }

    /// Post-insert hook: dirties the parent's layout and keeps its
    /// marginal-presence flag honest.
    fn after_insert(&mut self, parent: ControlKey, child: ControlKey) {
        let marginal = self.arena[child].flags.contains(ControlFlags::MARGINAL);
        let parent_node = &mut self.arena[parent];
        parent_node.flags.insert(ControlFlags::LAYOUT_DIRTY);
        if marginal {
            parent_node.flags.insert(ControlFlags::HAS_MARGINAL);
        }
        log::trace!("control {} attached under {}", child.index(), parent.index());
    }

    /// Installs `child` in a fixed marginal slot of `parent`. Any
    /// previous occupant is detached (not destroyed) first.
    /// Precondition: `child` is not linked anywhere.
    pub fn attach_marginal(&mut self, parent: ControlKey, slot: MarginalSlot, child: ControlKey) {
        debug_assert!(self.arena[parent].is_container(), "marginal on a non-container");
        debug_assert!(
            self.arena[child].parent.is_none(),
            "control is already linked",
        );

        if let Some(old) = self.arena[parent].container().marginal[slot as usize].get() {
            self.remove_just(old);
        }

        self.arena[parent].container_mut().marginal[slot as usize] = child.into();
        self.arena[child].parent = parent.into();
        self.arena[child].flags.insert(ControlFlags::ATTACHED | ControlFlags::MARGINAL);
        self.after_insert(parent, child);
    }

    pub fn marginal(&self, parent: ControlKey, slot: MarginalSlot) -> Option<ControlKey> {
        self.arena[parent].container.as_ref()?.marginal[slot as usize].get()
    }

    /// Unlinks `child` from wherever it sits — its list position or its
    /// marginal slot — re-stitching the neighbors and endpoints, and
    /// nulls the child's own links. Does not destroy anything; the
    /// control becomes the detached root of its own subtree.
    pub fn remove_just(&mut self, child: ControlKey) {
        let Some(parent) = self.arena[child].parent.get() else {
            log::warn!("remove_just on a detached control");
            return;
        };

        if self.arena[child].flags.contains(ControlFlags::MARGINAL) {
            self.remove_marginal(parent, child);
        } else {
            let prev = self.arena[child].prev.get();
            let next = self.arena[child].next.get();
            match prev {
                Some(prev) => self.arena[prev].next = next.into(),
                None => self.arena[parent].container_mut().head = next.into(),
            }
            match next {
                Some(next) => self.arena[next].prev = prev.into(),
                None => self.arena[parent].container_mut().tail = prev.into(),
            }
            self.arena[parent].container_mut().count -= 1;
        }

        let child_node = &mut self.arena[child];
        child_node.prev = OptionalControlKey::NONE;
        child_node.next = OptionalControlKey::NONE;
        child_node.parent = OptionalControlKey::NONE;
        child_node.flags.remove(ControlFlags::ATTACHED);
        self.arena[parent].flags.insert(ControlFlags::LAYOUT_DIRTY);
    }

    fn remove_marginal(&mut self, parent: ControlKey, child: ControlKey) {
        let state = self.arena[parent].container_mut();
        for slot in state.marginal.iter_mut() {
            if slot.get() == Some(child) {
                *slot = OptionalControlKey::NONE;
            }
        }
        let occupied = state.marginal.iter().any(|slot| slot.get().is_some());
        if !occupied {
            self.arena[parent].flags.remove(ControlFlags::HAS_MARGINAL);
        }
    }

    /// Exchanges the list positions of `a` and `b` without touching any
    /// other node's identity. Adjacent pairs are handled specially so no
    /// transient self-loop ever exists. Self-inverse.
    pub fn swap_children(&mut self, a: ControlKey, b: ControlKey) {
        if a == b {
            return;
        }
        debug_assert_eq!(
            self.arena[a].parent.get(),
            self.arena[b].parent.get(),
            "swap across containers",
        );
        let parent = self.arena[a].parent.get().expect("swap of detached controls");

        if self.arena[a].next.get() == Some(b) {
            self.swap_adjacent(parent, a, b);
        } else if self.arena[b].next.get() == Some(a) {
            self.swap_adjacent(parent, b, a);
        } else {
            let (a_prev, a_next) = (self.arena[a].prev.get(), self.arena[a].next.get());
            let (b_prev, b_next) = (self.arena[b].prev.get(), self.arena[b].next.get());

            self.arena[a].prev = b_prev.into();
            self.arena[a].next = b_next.into();
            self.arena[b].prev = a_prev.into();
            self.arena[b].next = a_next.into();

            match a_prev {
                Some(prev) => self.arena[prev].next = b.into(),
                None => self.arena[parent].container_mut().head = b.into(),
            }
            match a_next {
                Some(next) => self.arena[next].prev = b.into(),
                None => self.arena[parent].container_mut().tail = b.into(),
            }
            match b_prev {
                Some(prev) => self.arena[prev].next = a.into(),
                None => self.arena[parent].container_mut().head = a.into(),
            }
            match b_next {
                Some(next) => self.arena[next].prev = a.into(),
                None => self.arena[parent].container_mut().tail = a.into(),
            }
        }

        self.arena[parent].flags.insert(ControlFlags::LAYOUT_DIRTY);
    }

    /// `second` is `first.next` on entry.
    fn swap_adjacent(&mut self, parent: ControlKey, first: ControlKey, second: ControlKey) {
        let before = self.arena[first].prev.get();
        let after = self.arena[second].next.get();

        self.arena[second].prev = before.into();
        self.arena[second].next = first.into();
        self.arena[first].prev = second.into();
        self.arena[first].next = after.into();

        match before {
            Some(before) => self.arena[before].next = second.into(),
            None => self.arena[parent].container_mut().head = second.into(),
        }
        match after {
            Some(after) => self.arena[after].prev = first.into(),
            None => self.arena[parent].container_mut().tail = first.into(),
        }
    }

    /// Removes `child` and splices it back in before `before` (tail for
    /// `None`), atomically as far as any traversal can observe. The
    /// post-insert hook does not fire again.
    pub fn move_child_to(&mut self, child: ControlKey, before: Option<ControlKey>) {
        debug_assert_ne!(before, Some(child), "move before itself");
        let parent = self.arena[child].parent.get().expect("move of a detached control");
        self.remove_just(child);
        self.insert_only(parent, before, child);
    }

    /// Index of `child` in `parent`'s list; `count` — never a valid
    /// index — when absent.
    pub fn index_of(&self, parent: ControlKey, child: ControlKey) -> usize {
        let mut index = 0;
        let mut current = self.first_child(parent);
        while let Some(key) = current {
            if key == child {
                return index;
            }
            index += 1;
            current = self.next_sibling(key);
        }
        self.count(parent)
    }

    /// Child at `index`; `None` when `index >= count`.
    pub fn child_at(&self, parent: ControlKey, index: usize) -> Option<ControlKey> {
        self.children(parent).nth(index)
    }

    /// Borrowing iterator over `parent`'s children, head to tail.
    /// Reversible for front-to-back order.
    pub fn children(&self, parent: ControlKey) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(parent),
            next_back: self.last_child(parent),
        }
    }

    /// A reentrancy-safe cursor over `parent`'s children.
    pub fn cursor(&self, parent: ControlKey) -> Cursor {
        Cursor { next: self.first_child(parent) }
    }

    /// Frees one detached, childless control. The caller (the
    /// [`Ui`](super::ui::Ui) removal path) guarantees the
    /// before-deleted notification ran exactly once beforehand, so no
    /// live node still refers to this one.
    pub(crate) fn free(&mut self, key: ControlKey) -> Control {
        debug_assert!(self.arena[key].parent.is_none(), "freeing a linked control");
        debug_assert!(
            self.arena[key].container.as_ref().map_or(true, |state| {
                state.count == 0 && state.marginal.iter().all(|slot| slot.is_none())
            }),
            "freeing a container that still owns children",
        );
        self.arena.remove(key).expect("double free of a control")
    }
}

impl Default for ControlTree {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<ControlKey> for ControlTree {
    type Output = Control;

    fn index(&self, key: ControlKey) -> &Control {
        &self.arena[key]
    }
}

impl std::ops::IndexMut<ControlKey> for ControlTree {
    fn index_mut(&mut self, key: ControlKey) -> &mut Control {
        &mut self.arena[key]
    }
}

/// Double-ended borrowing child iterator. Do not mutate the tree while
/// one is alive (the borrow checker enforces this); use [`Cursor`] for
/// traversals that mutate.
pub struct Children<'a> {
    tree: &'a ControlTree,
    next: Option<ControlKey>,
    next_back: Option<ControlKey>,
}

impl Iterator for Children<'_> {
    type Item = ControlKey;

    fn next(&mut self) -> Option<ControlKey> {
        let current = self.next?;
        if Some(current) == self.next_back {
            self.next = None;
            self.next_back = None;
        } else {
            self.next = self.tree.next_sibling(current);
        }
        Some(current)
    }
}

impl DoubleEndedIterator for Children<'_> {
    fn next_back(&mut self) -> Option<ControlKey> {
        let current = self.next_back?;
        if Some(current) == self.next {
            self.next = None;
            self.next_back = None;
        } else {
            self.next_back = self.tree.prev_sibling(current);
        }
        Some(current)
    }
}

/// Non-borrowing child cursor for traversals whose callbacks mutate the
/// list.
///
/// `next` captures the following sibling *before* handing out the
/// current one, so the callback may unlink the current control, insert
/// siblings, or remove later siblings. The one structural edit a
/// callback must not rely on is destroying the already-captured next
/// sibling: the cursor detects the stale key and ends the walk instead
/// of touching freed state.
pub struct Cursor {
    next: Option<ControlKey>,
}

impl Cursor {
    pub fn next(&mut self, tree: &ControlTree) -> Option<ControlKey> {
        let current = self.next?;
        if !tree.contains(current) {
            log::warn!("captured sibling was destroyed mid-traversal; walk ends early");
            self.next = None;
            return None;
        }
        self.next = tree.next_sibling(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::container::MarginalSlot;

    fn tree_with_children(n: usize) -> (ControlTree, ControlKey, Vec<ControlKey>) {
        let mut tree = ControlTree::new();
        let parent = tree.create_container(ClassIndex::default());
        let children: Vec<_> = (0..n)
            .map(|_| {
                let child = tree.create(ClassIndex::default());
                tree.push(parent, child);
                child
            })
            .collect();
        (tree, parent, children)
    }

    /// Asserts every list invariant: endpoint nulls, bidirectional
    /// consistency, count cache, parent back-references.
    fn check_list(tree: &ControlTree, parent: ControlKey) {
        let state = tree[parent].container();
        if let Some(head) = state.head.get() {
            assert_eq!(tree.prev_sibling(head), None);
        }
        if let Some(tail) = state.tail.get() {
            assert_eq!(tree.next_sibling(tail), None);
        }
        assert_eq!(state.head.get().is_none(), state.tail.get().is_none());

        let mut reachable = 0;
        let mut current = state.head.get();
        while let Some(key) = current {
            assert_eq!(tree.parent(key), Some(parent));
            let next = tree.next_sibling(key);
            if let Some(next) = next {
                assert_eq!(tree.prev_sibling(next), Some(key));
            } else {
                assert_eq!(state.tail.get(), Some(key));
            }
            reachable += 1;
            assert!(reachable <= state.count, "cycle or count mismatch");
            current = next;
        }
        assert_eq!(reachable, state.count);
    }

    #[test]
    fn push_keeps_insertion_order() {
        let (tree, parent, children) = tree_with_children(5);
        check_list(&tree, parent);

        let forward: Vec<_> = tree.children(parent).collect();
        assert_eq!(forward, children);

        let backward: Vec<_> = tree.children(parent).rev().collect();
        let mut expected = children.clone();
        expected.reverse();
        assert_eq!(backward, expected);
    }

    #[test]
    fn mixed_mutation_sequences_hold_the_invariants() {
        let (mut tree, parent, children) = tree_with_children(4);
        let &[a, b, c, d] = &children[..] else { unreachable!() };

        tree.remove_just(b);
        check_list(&tree, parent);
        assert_eq!(tree.count(parent), 3);

        let e = tree.create(ClassIndex::default());
        tree.insert(parent, Some(c), e);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![a, e, c, d]);

        tree.remove_just(a);
        tree.remove_just(d);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![e, c]);

        // detached controls are their own top-level roots again
        assert!(tree[a].is_top_level());
        assert!(tree[b].is_top_level());
    }

    #[test]
    fn index_of_round_trips_and_reports_the_sentinel() {
        let (mut tree, parent, children) = tree_with_children(3);
        for (i, child) in children.iter().enumerate() {
            assert_eq!(tree.index_of(parent, *child), i);
            assert_eq!(tree.child_at(parent, i), Some(*child));
        }
        assert_eq!(tree.child_at(parent, 3), None);

        let stranger = tree.create(ClassIndex::default());
        assert_eq!(tree.index_of(parent, stranger), tree.count(parent));

        // the sentinel tracks the count as the list shrinks
        tree.remove_just(children[0]);
        assert_eq!(tree.index_of(parent, stranger), 2);
        assert_eq!(tree.index_of(parent, children[0]), 2);
    }

    #[test]
    fn swap_is_self_inverse() {
        let (mut tree, parent, children) = tree_with_children(4);
        let &[a, b, c, d] = &children[..] else { unreachable!() };

        // distant pair
        tree.swap_children(a, d);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![d, b, c, a]);
        tree.swap_children(a, d);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), children);

        // adjacent pair, both argument orders
        tree.swap_children(b, c);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![a, c, b, d]);
        tree.swap_children(b, c);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), children);

        // adjacent pair at the endpoints
        tree.swap_children(a, b);
        tree.swap_children(a, b);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), children);
    }

    #[test]
    fn remove_and_reinsert_restores_the_list() {
        let (mut tree, parent, children) = tree_with_children(3);
        let &[_, b, c] = &children[..] else { unreachable!() };

        tree.remove_just(b);
        assert!(tree[b].is_top_level());
        tree.insert(parent, Some(c), b);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), children);

        // same for the tail position
        let tail = children[2];
        tree.remove_just(tail);
        tree.insert(parent, None, tail);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), children);
    }

    #[test]
    fn move_child_to_repositions_in_one_step() {
        let (mut tree, parent, children) = tree_with_children(4);
        let &[a, b, c, d] = &children[..] else { unreachable!() };

        tree.move_child_to(d, Some(a));
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![d, a, b, c]);

        tree.move_child_to(d, None);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![a, b, c, d]);
    }

    #[test]
    fn cursor_survives_removal_of_later_siblings() {
        let (mut tree, parent, children) = tree_with_children(5);
        let &[a, b, c, d, e] = &children[..] else { unreachable!() };

        let mut visited = Vec::new();
        let mut cursor = tree.cursor(parent);
        while let Some(key) = cursor.next(&tree) {
            visited.push(key);
            if key == b {
                // a control removing a later (non-adjacent) sibling
                tree.remove_just(d);
            }
        }
        assert_eq!(visited, vec![a, b, c, e]);
        check_list(&tree, parent);
        assert_eq!(tree.count(parent), 4);
    }

    #[test]
    fn cursor_survives_self_removal() {
        let (mut tree, parent, children) = tree_with_children(3);
        let &[a, b, c] = &children[..] else { unreachable!() };

        let mut visited = Vec::new();
        let mut cursor = tree.cursor(parent);
        while let Some(key) = cursor.next(&tree) {
            visited.push(key);
            if key == b {
                tree.remove_just(b);
            }
        }
        assert_eq!(visited, vec![a, b, c]);
        check_list(&tree, parent);
        assert_eq!(tree.children(parent).collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn cursor_tolerates_insertion_mid_walk() {
        let (mut tree, parent, children) = tree_with_children(2);
        let &[a, b] = &children[..] else { unreachable!() };

        let mut visited = Vec::new();
        let mut cursor = tree.cursor(parent);
        while let Some(key) = cursor.next(&tree) {
            visited.push(key);
            if key == a {
                // inserted before the captured next: not revisited,
                // but the list stays consistent
                let new = tree.create(ClassIndex::default());
                tree.insert(parent, Some(b), new);
            }
        }
        assert_eq!(visited, vec![a, b]);
        check_list(&tree, parent);
        assert_eq!(tree.count(parent), 3);
    }

    #[test]
    fn marginal_slots_track_the_presence_flag() {
        let mut tree = ControlTree::new();
        let parent = tree.create_container(ClassIndex::default());
        let bar = tree.create(ClassIndex::default());

        tree.attach_marginal(parent, MarginalSlot::Right, bar);
        assert!(tree[parent].flags.contains(ControlFlags::HAS_MARGINAL));
        assert_eq!(tree.marginal(parent, MarginalSlot::Right), Some(bar));
        // marginal controls do not occupy list positions
        assert_eq!(tree.count(parent), 0);

        tree.remove_just(bar);
        assert!(!tree[parent].flags.contains(ControlFlags::HAS_MARGINAL));
        assert_eq!(tree.marginal(parent, MarginalSlot::Right), None);
        assert!(tree[bar].is_top_level());
    }

    #[test]
    fn marginal_replacement_detaches_the_old_occupant() {
        let mut tree = ControlTree::new();
        let parent = tree.create_container(ClassIndex::default());
        let old = tree.create(ClassIndex::default());
        let new = tree.create(ClassIndex::default());

        tree.attach_marginal(parent, MarginalSlot::Bottom, old);
        tree.attach_marginal(parent, MarginalSlot::Bottom, new);

        assert_eq!(tree.marginal(parent, MarginalSlot::Bottom), Some(new));
        assert!(tree[old].is_top_level());
        assert!(tree[parent].flags.contains(ControlFlags::HAS_MARGINAL));
    }
}
