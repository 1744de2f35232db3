//! Parent/child attachment primitive shared by every render object.
//!
//! The tree stores payloads in an [`indextree::Arena`] and layers the
//! attachment lifecycle on top: depth tracking, attach/detach propagation,
//! and adoption/drop of children. Violating the lifecycle (double attach,
//! dropping a non-child, re-parenting a parented node) is a programming
//! error and panics at the call site.

use tracing::trace;

pub use indextree::NodeId;

/// Payload contract for nodes managed by [`NodeTree`].
///
/// Concrete payloads store the two attachment fields and expose them here;
/// the tree owns all transitions.
pub trait Attachable {
    /// Current depth; strictly greater than the parent's while parented.
    fn depth(&self) -> u32;
    /// Overwrites the depth. Called by the tree only.
    fn set_depth(&mut self, depth: u32);
    /// Whether the node is reachable from an attached root.
    fn attached(&self) -> bool;
    /// Overwrites the attached flag. Called by the tree only.
    fn set_attached(&mut self, attached: bool);
}

/// Arena-backed node tree with attachment bookkeeping.
pub struct NodeTree<T: Attachable> {
    arena: indextree::Arena<T>,
}

impl<T: Attachable> Default for NodeTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Attachable> NodeTree<T> {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            arena: indextree::Arena::new(),
        }
    }

    /// Creates a detached node holding `payload`.
    pub fn create(&mut self, payload: T) -> NodeId {
        self.arena.new_node(payload)
    }

    /// Returns the payload of `id`, if the node still exists.
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.arena
            .get(id)
            .filter(|node| !node.is_removed())
            .map(|node| node.get())
    }

    /// Returns the mutable payload of `id`, if the node still exists.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match self.arena.get_mut(id) {
            Some(node) if !node.is_removed() => Some(node.get_mut()),
            _ => None,
        }
    }

    /// Returns the parent of `id`, if any.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena
            .get(id)
            .filter(|node| !node.is_removed())
            .and_then(|node| node.parent())
    }

    /// Iterates the children of `id` in insertion (paint) order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Iterates the children of `id` topmost-first (reverse paint order).
    pub fn reverse_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.reverse_children(&self.arena)
    }

    /// Iterates `id` and its ancestors up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.ancestors(&self.arena)
    }

    /// Iterates `id` and all descendants in pre-order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    /// Current depth of `id`.
    pub fn depth(&self, id: NodeId) -> u32 {
        self.arena[id].get().depth()
    }

    /// Whether `id` is attached.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.arena[id].get().attached()
    }

    /// Makes `child` the last child of `parent`.
    ///
    /// Panics if the child already has a parent. On success the child is
    /// attached when the parent is attached, then redepthed.
    pub fn adopt_child(&mut self, parent: NodeId, child: NodeId) {
        assert_ne!(parent, child, "adopt_child: node cannot adopt itself");
        if self.arena[child].parent().is_some() {
            panic!("adopt_child: node already has a parent");
        }
        parent.append(child, &mut self.arena);
        if self.arena[parent].get().attached() {
            self.attach_subtree(child);
        }
        self.redepth_child(parent, child);
        trace!(?parent, ?child, "adopted child");
    }

    /// Severs `child` from `parent`.
    ///
    /// Panics if `parent` is not in fact the child's parent, or if the
    /// attachment state of the two disagrees. Detaches the subtree when the
    /// parent was attached.
    pub fn drop_child(&mut self, parent: NodeId, child: NodeId) {
        if self.arena[child].parent() != Some(parent) {
            panic!("drop_child: node is not a child of this parent");
        }
        let parent_attached = self.arena[parent].get().attached();
        let child_attached = self.arena[child].get().attached();
        assert_eq!(
            parent_attached, child_attached,
            "drop_child: attachment state of parent and child disagree"
        );
        child.detach(&mut self.arena);
        if parent_attached {
            self.detach_subtree(child);
        }
        trace!(?parent, ?child, "dropped child");
    }

    /// Attaches a parentless node explicitly, making it a root.
    ///
    /// Panics if the node is already attached or still has a parent.
    pub fn attach_root(&mut self, id: NodeId) {
        assert!(
            self.arena[id].parent().is_none(),
            "attach_root: node has a parent"
        );
        self.attach_subtree(id);
    }

    /// Detaches a previously attached root.
    pub fn detach_root(&mut self, id: NodeId) {
        assert!(
            self.arena[id].parent().is_none(),
            "detach_root: node has a parent"
        );
        self.detach_subtree(id);
    }

    /// Removes `id` and its whole subtree from the arena.
    ///
    /// The node must already be parentless and detached; `dispose` handles
    /// that ordering.
    pub fn remove_subtree(&mut self, id: NodeId) {
        debug_assert!(self.arena[id].parent().is_none());
        id.remove_subtree(&mut self.arena);
    }

    /// Updates `child`'s depth relative to `parent`.
    ///
    /// The depth becomes `parent.depth + 1` only if it is not already
    /// greater, and the walk recurses into grandchildren only when the
    /// depth actually changed. Re-parenting deep subtrees therefore costs
    /// O(changed nodes), not O(subtree).
    fn redepth_child(&mut self, parent: NodeId, child: NodeId) {
        let parent_depth = self.arena[parent].get().depth();
        self.redepth(child, parent_depth);
    }

    fn redepth(&mut self, node: NodeId, parent_depth: u32) {
        if self.arena[node].get().depth() > parent_depth {
            return;
        }
        let new_depth = parent_depth + 1;
        self.arena[node].get_mut().set_depth(new_depth);
        let children: Vec<NodeId> = node.children(&self.arena).collect();
        for child in children {
            self.redepth(child, new_depth);
        }
    }

    fn attach_subtree(&mut self, root: NodeId) {
        let nodes: Vec<NodeId> = root.descendants(&self.arena).collect();
        for id in nodes {
            let payload = self.arena[id].get_mut();
            if payload.attached() {
                panic!("attach: node is already attached");
            }
            payload.set_attached(true);
        }
    }

    fn detach_subtree(&mut self, root: NodeId) {
        // Children first, so every node's children are already detached by
        // the time the node itself detaches.
        let nodes: Vec<NodeId> = root.descendants(&self.arena).collect();
        for id in nodes.into_iter().rev() {
            let still_attached_child = id
                .children(&self.arena)
                .any(|child| self.arena[child].get().attached());
            assert!(
                !still_attached_child,
                "detach: node still has attached children"
            );
            let payload = self.arena[id].get_mut();
            if !payload.attached() {
                panic!("detach: node is not attached");
            }
            payload.set_attached(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Probe {
        depth: u32,
        attached: bool,
    }

    impl Attachable for Probe {
        fn depth(&self) -> u32 {
            self.depth
        }
        fn set_depth(&mut self, depth: u32) {
            self.depth = depth;
        }
        fn attached(&self) -> bool {
            self.attached
        }
        fn set_attached(&mut self, attached: bool) {
            self.attached = attached;
        }
    }

    fn tree() -> NodeTree<Probe> {
        NodeTree::new()
    }

    #[test]
    fn adopt_sets_depth_parent_and_attachment() {
        let mut tree = tree();
        let root = tree.create(Probe::default());
        let child = tree.create(Probe::default());
        tree.attach_root(root);

        tree.adopt_child(root, child);
        assert_eq!(tree.parent(child), Some(root));
        assert!(tree.depth(child) > tree.depth(root));
        assert_eq!(tree.is_attached(child), tree.is_attached(root));
    }

    #[test]
    fn adopt_into_detached_parent_leaves_child_detached() {
        let mut tree = tree();
        let parent = tree.create(Probe::default());
        let child = tree.create(Probe::default());
        tree.adopt_child(parent, child);
        assert!(!tree.is_attached(child));
        assert_eq!(tree.depth(child), 1);
    }

    #[test]
    #[should_panic(expected = "already has a parent")]
    fn adopting_a_parented_child_panics() {
        let mut tree = tree();
        let a = tree.create(Probe::default());
        let b = tree.create(Probe::default());
        let child = tree.create(Probe::default());
        tree.adopt_child(a, child);
        tree.adopt_child(b, child);
    }

    #[test]
    #[should_panic(expected = "not a child of this parent")]
    fn dropping_a_non_child_panics() {
        let mut tree = tree();
        let a = tree.create(Probe::default());
        let stranger = tree.create(Probe::default());
        tree.drop_child(a, stranger);
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attach_panics() {
        let mut tree = tree();
        let root = tree.create(Probe::default());
        tree.attach_root(root);
        tree.attach_root(root);
    }

    #[test]
    #[should_panic(expected = "not attached")]
    fn detach_without_attach_panics() {
        let mut tree = tree();
        let root = tree.create(Probe::default());
        tree.detach_root(root);
    }

    #[test]
    fn drop_child_detaches_subtree() {
        let mut tree = tree();
        let root = tree.create(Probe::default());
        let mid = tree.create(Probe::default());
        let leaf = tree.create(Probe::default());
        tree.attach_root(root);
        tree.adopt_child(root, mid);
        tree.adopt_child(mid, leaf);
        assert!(tree.is_attached(leaf));

        tree.drop_child(root, mid);
        assert!(!tree.is_attached(mid));
        assert!(!tree.is_attached(leaf));
        assert!(tree.parent(mid).is_none());
    }

    #[test]
    fn redepth_skips_subtrees_that_are_already_deep_enough() {
        let mut tree = tree();
        let root = tree.create(Probe::default());
        let deep_parent = tree.create(Probe::default());
        let x = tree.create(Probe::default());
        let y = tree.create(Probe::default());
        tree.adopt_child(x, y);
        tree.adopt_child(root, deep_parent);
        tree.adopt_child(deep_parent, x);
        assert_eq!(tree.depth(x), 2);
        assert_eq!(tree.depth(y), 3);

        // Re-parent x directly under the root: its depth (2) is already
        // greater than root.depth + 1 would require, so nothing changes.
        tree.drop_child(deep_parent, x);
        tree.adopt_child(root, x);
        assert_eq!(tree.depth(x), 2);
        assert_eq!(tree.depth(y), 3);
    }
}
