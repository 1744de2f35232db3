//! Synthetic pointer dispatch.
//!
//! Runs once per frame after geometry is final: hit-tests each buffered
//! native event against the tree (depth-first, topmost child first), builds
//! the ancestor path, and walks it root→target (capture) then target→root
//! (bubble). Enter/leave/over/out are synthesized by diffing the previous
//! and current hit-target chains — a pure function of the two chains.
//!
//! Detached or removed objects are transparent to all of this: a buffered
//! event may legitimately race with a removal from the previous frame, so
//! dispatch skips them instead of failing.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::trace;

use crate::{
    events::{FlushedEvents, NativePointerEvent, PointerType},
    foundation::NestedMap,
    object::{RenderObject, element_spec},
    px::PxPosition,
    style::ElementKind,
    tree::{Attachable, NodeId, NodeTree},
};

/// Which leg of the dispatch walk an event is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    /// Root→target, listeners registered with `capture`.
    Capture,
    /// At the hit target; all listeners fire in registration order.
    Target,
    /// Target→root, listeners registered without `capture`.
    Bubble,
}

/// A dispatched pointer event, handed mutably to listeners.
#[derive(Debug)]
pub struct PointerEvent {
    /// Semantic type.
    pub ty: PointerType,
    /// Current dispatch phase.
    pub phase: EventPhase,
    /// Deepest hit render object, if any.
    pub target: Option<NodeId>,
    /// Position in surface client coordinates.
    pub position: PxPosition,
    /// Horizontal wheel delta.
    pub wheel_delta_x: f32,
    /// Vertical wheel delta.
    pub wheel_delta_y: f32,
    stop: bool,
    stop_immediate: bool,
}

impl PointerEvent {
    fn new(ty: PointerType, target: Option<NodeId>, native: &NativePointerEvent) -> Self {
        Self {
            ty,
            phase: EventPhase::Target,
            target,
            position: native.position,
            wheel_delta_x: native.wheel_delta_x,
            wheel_delta_y: native.wheel_delta_y,
            stop: false,
            stop_immediate: false,
        }
    }

    /// Halts traversal after the current node's listeners finish.
    pub fn stop_propagation(&mut self) {
        self.stop = true;
    }

    /// Halts traversal and skips remaining listeners on the current node.
    pub fn stop_immediate_propagation(&mut self) {
        self.stop = true;
        self.stop_immediate = true;
    }

    /// Whether a listener stopped propagation.
    pub fn propagation_stopped(&self) -> bool {
        self.stop
    }
}

/// Listener callback; identity is the allocation, compared with
/// [`Arc::ptr_eq`].
pub type ListenerFn = Arc<dyn Fn(&mut PointerEvent)>;

#[derive(Clone)]
struct ListenerSlot {
    callback: ListenerFn,
    capture: bool,
}

fn slot_eq(a: &ListenerSlot, b: &ListenerSlot) -> bool {
    Arc::ptr_eq(&a.callback, &b.callback) && a.capture == b.capture
}

type Chain = SmallVec<[NodeId; 8]>;

/// Per-tree pointer dispatcher: listener table plus the two-slot hover
/// state (previous chain vs current chain) per pointer identity.
pub struct Dispatcher {
    listeners: NestedMap<(NodeId, PointerType), ListenerSlot, ()>,
    hover_chains: FxHashMap<i32, Chain>,
    down_chains: FxHashMap<i32, Chain>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with no listeners and no hover state.
    pub fn new() -> Self {
        Self {
            listeners: NestedMap::new(slot_eq),
            hover_chains: FxHashMap::default(),
            down_chains: FxHashMap::default(),
        }
    }

    /// Registers `callback` for `ty` on `node`.
    ///
    /// `capture` selects the phase the listener participates in.
    /// Registering the same callback for the same node, type and phase
    /// twice is a programming error and panics.
    pub fn add_listener(
        &mut self,
        node: NodeId,
        ty: PointerType,
        callback: ListenerFn,
        capture: bool,
    ) {
        let slot = ListenerSlot { callback, capture };
        if self.listeners.get(&(node, ty), &slot).is_some() {
            panic!("add_listener: callback already registered for this node, type and phase");
        }
        self.listeners.set((node, ty), slot, ());
    }

    /// Unregisters a previously added listener. Returns false on no match.
    pub fn remove_listener(
        &mut self,
        node: NodeId,
        ty: PointerType,
        callback: ListenerFn,
        capture: bool,
    ) -> bool {
        let slot = ListenerSlot { callback, capture };
        self.listeners.delete(&(node, ty), &slot)
    }

    /// Drops every listener registered on `node`.
    pub fn remove_node(&mut self, node: NodeId) {
        for ty in PointerType::ALL {
            self.listeners.delete_outer(&(node, ty));
        }
    }

    /// Dispatches one flush window worth of native events.
    ///
    /// Pointers are processed in ascending id order, and each pointer's
    /// slots in the fixed native-type order, so a frame's dispatch is
    /// deterministic.
    pub fn dispatch(
        &mut self,
        tree: &NodeTree<RenderObject>,
        root: Option<NodeId>,
        flushed: FlushedEvents,
    ) {
        let mut pointer_ids: Vec<i32> = flushed.keys().copied().collect();
        pointer_ids.sort_unstable();
        for pointer_id in pointer_ids {
            let Some(bucket) = flushed.get(&pointer_id) else {
                continue;
            };
            for ty in PointerType::NATIVE {
                let Some(native) = bucket.get(&ty) else {
                    continue;
                };
                self.dispatch_native(tree, root, native);
            }
        }
    }

    fn dispatch_native(
        &mut self,
        tree: &NodeTree<RenderObject>,
        root: Option<NodeId>,
        native: &NativePointerEvent,
    ) {
        let hit = root.and_then(|root| hit_test(tree, root, native.position));
        trace!(ty = ?native.ty, pointer = native.pointer_id, target = ?hit, "dispatching");
        match native.ty {
            PointerType::Move => {
                let new_chain = hit.map(|target| ancestor_chain(tree, target)).unwrap_or_default();
                let old_chain = self
                    .hover_chains
                    .remove(&native.pointer_id)
                    .unwrap_or_default();
                self.synthesize_hover(tree, &old_chain, &new_chain, native);
                if let Some(target) = hit {
                    let mut event = PointerEvent::new(PointerType::Move, Some(target), native);
                    self.dispatch_along(tree, &new_chain, &mut event);
                }
                if !new_chain.is_empty() {
                    self.hover_chains.insert(native.pointer_id, new_chain);
                }
            }
            PointerType::Down => {
                if let Some(target) = hit {
                    let chain = ancestor_chain(tree, target);
                    let mut event = PointerEvent::new(PointerType::Down, Some(target), native);
                    self.dispatch_along(tree, &chain, &mut event);
                    self.down_chains.insert(native.pointer_id, chain);
                }
            }
            PointerType::Up => {
                self.down_chains.remove(&native.pointer_id);
                if let Some(target) = hit {
                    let chain = ancestor_chain(tree, target);
                    let mut event = PointerEvent::new(PointerType::Up, Some(target), native);
                    self.dispatch_along(tree, &chain, &mut event);
                }
            }
            PointerType::UpOutside => {
                // The release landed outside the surface; close the
                // interaction on whatever took the down, if it still exists.
                let Some(chain) = self.down_chains.remove(&native.pointer_id) else {
                    return;
                };
                let live: Chain = chain
                    .into_iter()
                    .filter(|&node| is_live(tree, node))
                    .collect();
                if live.is_empty() {
                    return;
                }
                let target = live.last().copied();
                let mut event = PointerEvent::new(PointerType::UpOutside, target, native);
                self.dispatch_along(tree, &live, &mut event);
            }
            PointerType::Wheel => {
                if let Some(target) = hit {
                    let chain = ancestor_chain(tree, target);
                    let mut event = PointerEvent::new(PointerType::Wheel, Some(target), native);
                    self.dispatch_along(tree, &chain, &mut event);
                }
            }
            PointerType::Enter | PointerType::Leave | PointerType::Over | PointerType::Out => {
                unreachable!("derived types never appear in the native buffer")
            }
        }
    }

    /// Derives enter/leave/over/out from the previous and current hit
    /// chains. Exited nodes are the old chain past the common prefix;
    /// entered nodes the new chain past it.
    fn synthesize_hover(
        &mut self,
        tree: &NodeTree<RenderObject>,
        old_chain: &Chain,
        new_chain: &Chain,
        native: &NativePointerEvent,
    ) {
        if old_chain == new_chain {
            return;
        }
        let common = old_chain
            .iter()
            .zip(new_chain.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let old_target = old_chain.last().copied();
        let new_target = new_chain.last().copied();

        // Out bubbles from the old target.
        if old_target != new_target {
            if let Some(target) = old_target {
                let mut event = PointerEvent::new(PointerType::Out, Some(target), native);
                self.dispatch_along(tree, old_chain, &mut event);
            }
        }
        // Leave fires directly on each exited node, deepest first.
        for &node in old_chain[common..].iter().rev() {
            let mut event = PointerEvent::new(PointerType::Leave, old_target, native);
            self.deliver(tree, node, &mut event, EventPhase::Target);
        }
        // Over bubbles from the new target.
        if new_target != old_target {
            if let Some(target) = new_target {
                let mut event = PointerEvent::new(PointerType::Over, Some(target), native);
                self.dispatch_along(tree, new_chain, &mut event);
            }
        }
        // Enter fires directly on each entered node, outermost first.
        for &node in &new_chain[common..] {
            let mut event = PointerEvent::new(PointerType::Enter, new_target, native);
            self.deliver(tree, node, &mut event, EventPhase::Target);
        }
    }

    /// Walks `chain` (root→target) through capture, target and bubble.
    fn dispatch_along(
        &self,
        tree: &NodeTree<RenderObject>,
        chain: &Chain,
        event: &mut PointerEvent,
    ) {
        let Some((&target, ancestors)) = chain.split_last() else {
            return;
        };
        for &node in ancestors {
            self.deliver(tree, node, event, EventPhase::Capture);
            if event.stop {
                return;
            }
        }
        self.deliver(tree, target, event, EventPhase::Target);
        if event.stop {
            return;
        }
        for &node in ancestors.iter().rev() {
            self.deliver(tree, node, event, EventPhase::Bubble);
            if event.stop {
                return;
            }
        }
    }

    /// Invokes the listeners of one node for one phase.
    fn deliver(
        &self,
        tree: &NodeTree<RenderObject>,
        node: NodeId,
        event: &mut PointerEvent,
        phase: EventPhase,
    ) {
        if !is_live(tree, node) {
            return;
        }
        event.phase = phase;
        let slots: SmallVec<[ListenerSlot; 4]> = self
            .listeners
            .iter_outer(&(node, event.ty))
            .map(|(slot, ())| slot.clone())
            .collect();
        for slot in slots {
            let participates = match phase {
                EventPhase::Capture => slot.capture,
                EventPhase::Bubble => !slot.capture,
                EventPhase::Target => true,
            };
            if !participates {
                continue;
            }
            (slot.callback)(event);
            if event.stop_immediate {
                break;
            }
        }
    }
}

fn is_live(tree: &NodeTree<RenderObject>, node: NodeId) -> bool {
    tree.get(node).is_some_and(Attachable::attached)
}

/// Chain of ancestors from the root down to `target`, inclusive.
fn ancestor_chain(tree: &NodeTree<RenderObject>, target: NodeId) -> Chain {
    let mut chain: Chain = tree.ancestors(target).collect();
    chain.reverse();
    chain
}

/// Finds the deepest attached object under `point`.
///
/// Children are tested topmost-first (reverse paint order); scroll
/// containers clip to their bounds and map the point through their scroll
/// offset; detached or removed nodes are transparent.
pub(crate) fn hit_test(
    tree: &NodeTree<RenderObject>,
    id: NodeId,
    point: PxPosition,
) -> Option<NodeId> {
    let object = tree.get(id)?;
    if !object.attached() {
        return None;
    }
    let local = point - object.offset();
    let bounds = object.bounds();
    let kind = object.kind();
    if kind == ElementKind::ScrollView && !bounds.contains(local) {
        return None;
    }
    let content = if kind == ElementKind::ScrollView {
        local + object.style().scroll_offset
    } else {
        local
    };
    for child in tree.reverse_children(id) {
        if let Some(hit) = hit_test(tree, child, content) {
            return Some(hit);
        }
    }
    if object.size().is_empty() {
        return None;
    }
    if bounds.contains(local) && element_spec(kind).hit_test_self(object, local) {
        Some(id)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::px::{Px, PxSize};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sized(kind: ElementKind, x: f32, y: f32, w: f32, h: f32) -> RenderObject {
        let mut object = RenderObject::new(kind);
        object.offset = PxPosition::new(Px(x), Px(y));
        object.size = PxSize::new(Px(w), Px(h));
        object
    }

    /// root(200x200) > panel(10,10,100x100) > leaf(20,20,30x30)
    fn fixture() -> (NodeTree<RenderObject>, NodeId, NodeId, NodeId) {
        let mut tree = NodeTree::new();
        let root = tree.create(sized(ElementKind::View, 0.0, 0.0, 200.0, 200.0));
        let panel = tree.create(sized(ElementKind::View, 10.0, 10.0, 100.0, 100.0));
        let leaf = tree.create(sized(ElementKind::Rect, 20.0, 20.0, 30.0, 30.0));
        tree.attach_root(root);
        tree.adopt_child(root, panel);
        tree.adopt_child(panel, leaf);
        (tree, root, panel, leaf)
    }

    fn record(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> ListenerFn {
        let log = log.clone();
        Arc::new(move |_event| log.borrow_mut().push(tag))
    }

    #[test]
    fn hit_test_finds_deepest_object() {
        let (tree, root, panel, leaf) = fixture();
        let inside_leaf = PxPosition::new(Px(35.0), Px(35.0));
        assert_eq!(hit_test(&tree, root, inside_leaf), Some(leaf));
        let inside_panel = PxPosition::new(Px(15.0), Px(15.0));
        assert_eq!(hit_test(&tree, root, inside_panel), Some(panel));
        let outside = PxPosition::new(Px(150.0), Px(150.0));
        assert_eq!(hit_test(&tree, root, outside), Some(root));
    }

    #[test]
    fn hit_test_prefers_topmost_sibling() {
        let mut tree = NodeTree::new();
        let root = tree.create(sized(ElementKind::View, 0.0, 0.0, 100.0, 100.0));
        let below = tree.create(sized(ElementKind::Rect, 0.0, 0.0, 50.0, 50.0));
        let above = tree.create(sized(ElementKind::Rect, 0.0, 0.0, 50.0, 50.0));
        tree.attach_root(root);
        tree.adopt_child(root, below);
        tree.adopt_child(root, above);
        assert_eq!(
            hit_test(&tree, root, PxPosition::new(Px(10.0), Px(10.0))),
            Some(above)
        );
    }

    #[test]
    fn hit_test_maps_through_scroll_offset_and_clips() {
        let mut tree = NodeTree::new();
        let root = tree.create(sized(ElementKind::View, 0.0, 0.0, 200.0, 200.0));
        let scroller = tree.create(sized(ElementKind::ScrollView, 0.0, 0.0, 100.0, 100.0));
        let item = tree.create(sized(ElementKind::Rect, 0.0, 120.0, 100.0, 40.0));
        tree.attach_root(root);
        tree.adopt_child(root, scroller);
        tree.adopt_child(scroller, item);

        // Unscrolled: the item sits below the viewport.
        assert_eq!(
            hit_test(&tree, root, PxPosition::new(Px(50.0), Px(30.0))),
            Some(scroller)
        );
        tree.get_mut(scroller)
            .expect("scroller exists")
            .style
            .scroll_offset = PxPosition::new(Px::ZERO, Px(100.0));
        // Scrolled down 100px: content y=130 appears at viewport y=30.
        assert_eq!(
            hit_test(&tree, root, PxPosition::new(Px(50.0), Px(30.0))),
            Some(item)
        );
        // Outside the scroller's bounds stays clipped even though content
        // extends there.
        assert_eq!(
            hit_test(&tree, root, PxPosition::new(Px(50.0), Px(110.0))),
            Some(root)
        );
    }

    #[test]
    fn capture_then_target_then_bubble_order() {
        let (tree, root, panel, leaf) = fixture();
        let mut dispatcher = Dispatcher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        dispatcher.add_listener(root, PointerType::Down, record(&log, "root-capture"), true);
        dispatcher.add_listener(root, PointerType::Down, record(&log, "root-bubble"), false);
        dispatcher.add_listener(panel, PointerType::Down, record(&log, "panel-bubble"), false);
        dispatcher.add_listener(leaf, PointerType::Down, record(&log, "leaf"), false);

        let mut flushed = FlushedEvents::default();
        let native = NativePointerEvent::new(
            1,
            PointerType::Down,
            PxPosition::new(Px(35.0), Px(35.0)),
        );
        flushed
            .entry(1)
            .or_default()
            .insert(PointerType::Down, native);
        dispatcher.dispatch(&tree, Some(root), flushed);

        assert_eq!(
            log.borrow().as_slice(),
            ["root-capture", "leaf", "panel-bubble", "root-bubble"]
        );
    }

    #[test]
    fn stop_immediate_propagation_skips_same_node_listeners() {
        let (tree, root, _panel, leaf) = fixture();
        let mut dispatcher = Dispatcher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = log.clone();
            dispatcher.add_listener(
                leaf,
                PointerType::Down,
                Arc::new(move |event| {
                    log.borrow_mut().push("first");
                    event.stop_immediate_propagation();
                }),
                false,
            );
        }
        dispatcher.add_listener(leaf, PointerType::Down, record(&log, "second"), false);
        dispatcher.add_listener(root, PointerType::Down, record(&log, "ancestor"), false);

        let mut flushed = FlushedEvents::default();
        flushed.entry(1).or_default().insert(
            PointerType::Down,
            NativePointerEvent::new(1, PointerType::Down, PxPosition::new(Px(35.0), Px(35.0))),
        );
        dispatcher.dispatch(&tree, Some(root), flushed);
        assert_eq!(log.borrow().as_slice(), ["first"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_listener_registration_panics() {
        let (tree, root, ..) = fixture();
        let _ = &tree;
        let mut dispatcher = Dispatcher::new();
        let callback: ListenerFn = Arc::new(|_| {});
        dispatcher.add_listener(root, PointerType::Down, callback.clone(), false);
        dispatcher.add_listener(root, PointerType::Down, callback, false);
    }

    #[test]
    fn hover_diff_fires_enter_leave_over_out() {
        let (tree, root, panel, leaf) = fixture();
        let mut dispatcher = Dispatcher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        dispatcher.add_listener(leaf, PointerType::Enter, record(&log, "leaf-enter"), false);
        dispatcher.add_listener(leaf, PointerType::Leave, record(&log, "leaf-leave"), false);
        dispatcher.add_listener(panel, PointerType::Enter, record(&log, "panel-enter"), false);
        dispatcher.add_listener(panel, PointerType::Leave, record(&log, "panel-leave"), false);
        dispatcher.add_listener(root, PointerType::Over, record(&log, "root-over"), false);
        dispatcher.add_listener(root, PointerType::Out, record(&log, "root-out"), false);

        let move_to = |dispatcher: &mut Dispatcher, x: f32, y: f32| {
            let mut flushed = FlushedEvents::default();
            flushed.entry(1).or_default().insert(
                PointerType::Move,
                NativePointerEvent::new(1, PointerType::Move, PxPosition::new(Px(x), Px(y))),
            );
            dispatcher.dispatch(&tree, Some(root), flushed);
        };

        // Frame 1: into the leaf — enter fires outermost-in, over bubbles.
        move_to(&mut dispatcher, 35.0, 35.0);
        assert_eq!(
            log.borrow().as_slice(),
            ["root-over", "panel-enter", "leaf-enter"]
        );
        log.borrow_mut().clear();

        // Frame 2: still inside the leaf — no boundary crossing, nothing.
        move_to(&mut dispatcher, 36.0, 36.0);
        assert!(log.borrow().is_empty());

        // Frame 3: out to bare root — leaf and panel exit, deepest first.
        move_to(&mut dispatcher, 150.0, 150.0);
        assert_eq!(
            log.borrow().as_slice(),
            ["root-out", "leaf-leave", "panel-leave", "root-over"]
        );
    }

    #[test]
    fn wheel_bubbles_with_deltas_intact() {
        let (tree, root, _panel, leaf) = fixture();
        let mut dispatcher = Dispatcher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let log = log.clone();
            dispatcher.add_listener(
                leaf,
                PointerType::Wheel,
                Arc::new(move |event| {
                    log.borrow_mut().push(("leaf", event.wheel_delta_y));
                }),
                false,
            );
        }
        {
            let log = log.clone();
            dispatcher.add_listener(
                root,
                PointerType::Wheel,
                Arc::new(move |event| {
                    log.borrow_mut().push(("root", event.wheel_delta_y));
                }),
                false,
            );
        }

        let mut flushed = FlushedEvents::default();
        flushed.entry(1).or_default().insert(
            PointerType::Wheel,
            NativePointerEvent::wheel(1, PxPosition::new(Px(35.0), Px(35.0)), 0.0, -42.0),
        );
        dispatcher.dispatch(&tree, Some(root), flushed);
        assert_eq!(log.borrow().as_slice(), [("leaf", -42.0), ("root", -42.0)]);
    }

    #[test]
    fn up_outside_closes_interaction_on_down_target() {
        let (tree, root, _panel, leaf) = fixture();
        let mut dispatcher = Dispatcher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        dispatcher.add_listener(leaf, PointerType::UpOutside, record(&log, "leaf-out"), false);

        let mut down = FlushedEvents::default();
        down.entry(1).or_default().insert(
            PointerType::Down,
            NativePointerEvent::new(1, PointerType::Down, PxPosition::new(Px(35.0), Px(35.0))),
        );
        dispatcher.dispatch(&tree, Some(root), down);

        let mut up = FlushedEvents::default();
        up.entry(1).or_default().insert(
            PointerType::UpOutside,
            NativePointerEvent::new(
                1,
                PointerType::UpOutside,
                PxPosition::new(Px(900.0), Px(900.0)),
            ),
        );
        dispatcher.dispatch(&tree, Some(root), up);
        assert_eq!(log.borrow().as_slice(), ["leaf-out"]);
    }

    #[test]
    fn detached_nodes_are_transparent_to_hit_testing() {
        let (mut tree, root, panel, _leaf) = fixture();
        tree.drop_child(root, panel);
        assert_eq!(
            hit_test(&tree, root, PxPosition::new(Px(35.0), Px(35.0))),
            Some(root)
        );
    }

    #[test]
    fn stale_down_chain_skips_nodes_detached_since_the_down() {
        let (mut tree, root, panel, leaf) = fixture();
        let mut dispatcher = Dispatcher::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        dispatcher.add_listener(leaf, PointerType::UpOutside, record(&log, "leaf"), false);
        dispatcher.add_listener(root, PointerType::UpOutside, record(&log, "root"), false);

        let mut down = FlushedEvents::default();
        down.entry(1).or_default().insert(
            PointerType::Down,
            NativePointerEvent::new(1, PointerType::Down, PxPosition::new(Px(35.0), Px(35.0))),
        );
        dispatcher.dispatch(&tree, Some(root), down);

        // The subtree that took the down goes away before the release.
        tree.drop_child(root, panel);

        let mut up = FlushedEvents::default();
        up.entry(1).or_default().insert(
            PointerType::UpOutside,
            NativePointerEvent::new(
                1,
                PointerType::UpOutside,
                PxPosition::new(Px(900.0), Px(900.0)),
            ),
        );
        dispatcher.dispatch(&tree, Some(root), up);
        // The detached leaf is transparent; the surviving root still hears
        // the close.
        assert_eq!(log.borrow().as_slice(), ["root"]);
    }
}
