//! The Owner: frame pipeline and dirty batching.
//!
//! One pipeline coordinates one attached tree (one per on-screen surface).
//! Property setters mark objects dirty and request a frame; when the
//! embedder runs the frame the pipeline drains dirty layout boundaries,
//! then dirty paint boundaries, then composites — strictly in that order,
//! never interleaved, because paint reads finalized geometry. Pointer
//! dispatch runs after compositing against the frame's post-layout
//! geometry.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use crate::{
    compositor::{self, Frame, RasterCache},
    debug::{DebugFlags, DebugOptions},
    dispatch::{Dispatcher, ListenerFn},
    events::{EventBinding, NativePointerEvent, PointerType},
    object::{LayoutContext, RenderObject, layout_node, record_boundary},
    picture::{Picture, PictureId},
    px::{Px, PxPosition, PxSize},
    scheduler::{FramePacer, Surface},
    style::{Color, ElementKind, FlexDirection, ImageSource, Stroke},
    text::{TextShaper, TextStyle},
    tree::{Attachable, NodeId, NodeTree},
};

/// Frame state machine, strictly ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Between frames; mutation requests schedule work.
    Idle,
    /// Draining layout-dirty boundaries.
    FlushLayout,
    /// Draining paint-dirty boundaries.
    FlushPaint,
    /// Producing the composite frame.
    Composite,
}

/// Tree-scoped coordinator: owns the render tree, the per-frame dirty
/// sets, the raster cache and the input plumbing.
pub struct Pipeline {
    tree: NodeTree<RenderObject>,
    root: Option<NodeId>,
    layout_dirty: Vec<NodeId>,
    layout_dirty_set: FxHashSet<NodeId>,
    paint_dirty: Vec<NodeId>,
    paint_dirty_set: FxHashSet<NodeId>,
    phase: FramePhase,
    pacer: FramePacer,
    surface: Surface,
    shaper: Box<dyn TextShaper>,
    debug: DebugOptions,
    pictures: FxHashMap<NodeId, Arc<Picture>>,
    cache: RasterCache,
    binding: EventBinding,
    dispatcher: Dispatcher,
    next_picture: u64,
}

impl Pipeline {
    /// Creates a pipeline drawing to `surface`, paced by `pacer`.
    pub fn new(surface: Surface, pacer: FramePacer, shaper: Box<dyn TextShaper>) -> Self {
        Self {
            tree: NodeTree::new(),
            root: None,
            layout_dirty: Vec::new(),
            layout_dirty_set: FxHashSet::default(),
            paint_dirty: Vec::new(),
            paint_dirty_set: FxHashSet::default(),
            phase: FramePhase::Idle,
            pacer,
            surface,
            shaper,
            debug: DebugOptions::default(),
            pictures: FxHashMap::default(),
            cache: RasterCache::new(),
            binding: EventBinding::new(),
            dispatcher: Dispatcher::new(),
            next_picture: 0,
        }
    }

    /// The pacer shared with the embedder's tick source.
    pub fn pacer(&self) -> &FramePacer {
        &self.pacer
    }

    /// The surface this pipeline draws to.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Applies a new logical surface size and schedules a relayout.
    pub fn set_surface_size(&mut self, logical_size: PxSize) {
        if self.surface.logical_size == logical_size {
            return;
        }
        self.surface.logical_size = logical_size;
        if let Some(root) = self.root {
            self.mark_needs_layout(root);
        }
    }

    /// Replaces the debug overlay flags and re-records every boundary so
    /// the overlays appear (or vanish) on the next frame.
    pub fn set_debug_flags(&mut self, flags: DebugFlags) {
        self.debug = DebugOptions { flags };
        let Some(root) = self.root else {
            return;
        };
        let nodes: Vec<NodeId> = self.tree.descendants(root).collect();
        for node in nodes {
            if let Some(object) = self.tree.get_mut(node) {
                if object.repaint_boundary || Some(node) == self.root {
                    object.needs_paint = true;
                }
            }
        }
        self.register_subtree_paint(root);
        self.request_frame();
    }

    /// The raster cache, for introspection.
    pub fn cache(&self) -> &RasterCache {
        &self.cache
    }

    /// Currently registered layout-dirty boundaries.
    pub fn layout_dirty(&self) -> &[NodeId] {
        &self.layout_dirty
    }

    /// Currently registered paint-dirty boundaries.
    pub fn paint_dirty(&self) -> &[NodeId] {
        &self.paint_dirty
    }

    /// Read access to a render object.
    pub fn object(&self, id: NodeId) -> Option<&RenderObject> {
        self.tree.get(id)
    }

    /// The most recent recording for a repaint boundary.
    pub fn picture(&self, id: NodeId) -> Option<Arc<Picture>> {
        self.pictures.get(&id).cloned()
    }

    /// Whether `id` is attached to this pipeline's tree.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.tree.get(id).is_some_and(Attachable::attached)
    }

    // --- Factory and tree surface (consumed by the component layer) ---

    /// Creates a detached render object of the given kind.
    ///
    /// Scroll containers default to being repaint boundaries; scrolling is
    /// the translation case the raster cache exists for.
    pub fn create_element(&mut self, kind: ElementKind) -> NodeId {
        let mut object = RenderObject::new(kind);
        if kind == ElementKind::ScrollView {
            object.repaint_boundary = true;
            object.picture = Some(self.alloc_picture());
        }
        self.tree.create(object)
    }

    /// Attaches `id` as the pipeline root and prepares its first frame.
    ///
    /// The root is an implicit repaint boundary and receives a picture
    /// identity if it does not already carry one.
    pub fn set_root(&mut self, id: NodeId) {
        assert!(self.root.is_none(), "set_root: pipeline already has a root");
        let picture = self.alloc_picture();
        if let Some(object) = self.tree.get_mut(id) {
            if object.picture.is_none() {
                object.picture = Some(picture);
            }
        }
        self.tree.attach_root(id);
        self.root = Some(id);
        self.prepare_initial_frame();
    }

    /// Marks the root layout-dirty, registers it, and schedules a frame.
    ///
    /// Guarantees that a freshly attached root paints at least once even
    /// with no further mutation.
    pub fn prepare_initial_frame(&mut self) {
        let Some(root) = self.root else {
            warn!("prepare_initial_frame called without a root");
            return;
        };
        self.mark_needs_layout(root);
        self.register_subtree_paint(root);
        self.pacer.schedule_frame();
    }

    /// Makes `child` the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.tree.adopt_child(parent, child);
        self.mark_needs_layout(child);
        if self.is_attached(child) {
            // A subtree built while detached may carry dirty boundaries of
            // its own; they register now that an owner can see them.
            self.register_subtree_paint(child);
        }
    }

    /// Severs `child` from `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.tree.drop_child(parent, child);
        self.mark_needs_layout(parent);
        self.mark_needs_paint(parent);
    }

    /// Returns the `index`-th child of `parent`.
    pub fn child(&self, parent: NodeId, index: usize) -> Option<NodeId> {
        self.tree.children(parent).nth(index)
    }

    /// Iterates the children of `parent` in paint order.
    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.tree.children(parent)
    }

    /// Detaches `id`, clears its listeners and cache entries, and removes
    /// the whole subtree.
    pub fn dispose(&mut self, id: NodeId) {
        if self.tree.get(id).is_none() {
            return;
        }
        let subtree: Vec<NodeId> = self.tree.descendants(id).collect();
        if let Some(parent) = self.tree.parent(id) {
            self.tree.drop_child(parent, id);
            self.mark_needs_layout(parent);
            self.mark_needs_paint(parent);
        } else if self.is_attached(id) {
            self.tree.detach_root(id);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        let removed: FxHashSet<NodeId> = subtree.iter().copied().collect();
        for node in &subtree {
            self.dispatcher.remove_node(*node);
            if let Some(object) = self.tree.get(*node) {
                if let Some(picture) = object.picture {
                    self.cache.evict_picture(picture);
                }
            }
            self.pictures.remove(node);
        }
        self.layout_dirty.retain(|node| !removed.contains(node));
        self.layout_dirty_set
            .retain(|node| !removed.contains(node));
        self.paint_dirty.retain(|node| !removed.contains(node));
        self.paint_dirty_set.retain(|node| !removed.contains(node));
        self.tree.remove_subtree(id);
        debug!(?id, nodes = subtree.len(), "disposed subtree");
    }

    // --- Property setters (component layer and animation both land here) ---

    /// Moves an object within its parent. Paint-only: translation never
    /// invalidates layout.
    pub fn set_offset(&mut self, id: NodeId, offset: PxPosition) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.offset == offset {
                return;
            }
            object.offset = offset;
        }
        self.mark_needs_paint(id);
    }

    /// Fixes both dimensions of an object.
    pub fn set_size(&mut self, id: NodeId, size: PxSize) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.width == Some(size.width) && object.style.height == Some(size.height) {
                return;
            }
            object.style.width = Some(size.width);
            object.style.height = Some(size.height);
        }
        self.mark_needs_layout(id);
    }

    /// Sets or clears the explicit width.
    pub fn set_width(&mut self, id: NodeId, width: Option<Px>) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.width == width {
                return;
            }
            object.style.width = width;
        }
        self.mark_needs_layout(id);
    }

    /// Sets or clears the explicit height.
    pub fn set_height(&mut self, id: NodeId, height: Option<Px>) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.height == height {
                return;
            }
            object.style.height = height;
        }
        self.mark_needs_layout(id);
    }

    /// Sets the fill color.
    pub fn set_fill(&mut self, id: NodeId, fill: Option<Color>) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.fill == fill {
                return;
            }
            object.style.fill = fill;
        }
        self.mark_needs_paint(id);
    }

    /// Sets the outline stroke.
    pub fn set_stroke(&mut self, id: NodeId, stroke: Option<Stroke>) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.stroke == stroke {
                return;
            }
            object.style.stroke = stroke;
        }
        self.mark_needs_paint(id);
    }

    /// Sets the rotation in radians.
    pub fn set_rotation(&mut self, id: NodeId, rotation: f32) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.rotation == rotation {
                return;
            }
            object.style.rotation = rotation;
        }
        self.mark_needs_paint(id);
    }

    /// Sets the opacity multiplier.
    pub fn set_opacity(&mut self, id: NodeId, opacity: f32) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.opacity == opacity {
                return;
            }
            object.style.opacity = opacity;
        }
        self.mark_needs_paint(id);
    }

    /// Sets the corner radius used by rounded rectangles.
    pub fn set_corner_radius(&mut self, id: NodeId, radius: f32) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.corner_radius == radius {
                return;
            }
            object.style.corner_radius = radius;
        }
        self.mark_needs_paint(id);
    }

    /// Scrolls a scroll container. Paint-only: geometry is unchanged and
    /// boundary descendants translate through the compositor, which is
    /// exactly the case the raster cache accelerates.
    pub fn set_scroll_offset(&mut self, id: NodeId, scroll: PxPosition) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.scroll_offset == scroll {
                return;
            }
            object.style.scroll_offset = scroll;
        }
        self.mark_needs_paint(id);
    }

    /// Sets the flex main-axis direction.
    pub fn set_flex_direction(&mut self, id: NodeId, direction: FlexDirection) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.direction == direction {
                return;
            }
            object.style.direction = direction;
        }
        self.mark_needs_layout(id);
    }

    /// Sets the gap between flex children.
    pub fn set_gap(&mut self, id: NodeId, gap: Px) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.gap == gap {
                return;
            }
            object.style.gap = gap;
        }
        self.mark_needs_layout(id);
    }

    /// Replaces the text content of a text element.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        let text = text.into();
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.text == text {
                return;
            }
            object.style.text = text;
        }
        self.mark_needs_layout(id);
    }

    /// Replaces the text shaping parameters.
    pub fn set_text_style(&mut self, id: NodeId, text_style: TextStyle) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.text_style == text_style {
                return;
            }
            object.style.text_style = text_style;
        }
        self.mark_needs_layout(id);
    }

    /// Replaces the image source.
    pub fn set_image(&mut self, id: NodeId, image: Option<ImageSource>) {
        if let Some(object) = self.tree.get_mut(id) {
            if object.style.image == image {
                return;
            }
            object.style.image = image;
        }
        self.mark_needs_layout(id);
    }

    /// Promotes or demotes `id` as a repaint boundary.
    pub fn set_repaint_boundary(&mut self, id: NodeId, enabled: bool) {
        let picture = self.alloc_picture();
        let Some(object) = self.tree.get_mut(id) else {
            return;
        };
        if object.repaint_boundary == enabled {
            return;
        }
        object.repaint_boundary = enabled;
        if enabled {
            if object.picture.is_none() {
                object.picture = Some(picture);
            }
        } else if self.root != Some(id) {
            if let Some(old) = object.picture.take() {
                self.cache.evict_picture(old);
                self.pictures.remove(&id);
            }
        }
        self.mark_needs_paint(id);
        if let Some(parent) = self.tree.parent(id) {
            // The enclosing layer gains or absorbs a child-layer slot.
            self.mark_needs_paint(parent);
        }
    }

    // --- Dirty protocol ---

    /// Marks `id` layout-dirty, walking up to the nearest relayout
    /// boundary and registering it. Idempotent; attached objects only
    /// register, detached ones just keep their flags.
    pub fn mark_needs_layout(&mut self, id: NodeId) {
        let mut current = id;
        loop {
            let Some(object) = self.tree.get_mut(current) else {
                return;
            };
            object.needs_layout = true;
            let bounds_here =
                object.is_relayout_boundary() || Some(current) == self.root;
            if bounds_here {
                break;
            }
            match self.tree.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        if self.tree.get(current).is_some_and(Attachable::attached) {
            if self.layout_dirty_set.insert(current) {
                self.layout_dirty.push(current);
            }
            self.request_frame();
        }
    }

    /// Marks `id` paint-dirty, walking up to the nearest repaint boundary
    /// and registering it. The boundary's cached raster is invalidated
    /// before the next composite.
    pub fn mark_needs_paint(&mut self, id: NodeId) {
        let mut current = id;
        loop {
            let Some(object) = self.tree.get_mut(current) else {
                return;
            };
            object.needs_paint = true;
            let bounds_here = object.repaint_boundary || Some(current) == self.root;
            if bounds_here {
                break;
            }
            match self.tree.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        if self.tree.get(current).is_some_and(Attachable::attached) {
            if self.paint_dirty_set.insert(current) {
                self.paint_dirty.push(current);
            }
            self.request_frame();
        }
    }

    fn request_frame(&mut self) {
        // Mid-frame marks are picked up by the running flush; only idle
        // marks need a new frame.
        if self.phase == FramePhase::Idle {
            self.pacer.schedule_frame();
        }
    }

    fn alloc_picture(&mut self) -> PictureId {
        self.next_picture += 1;
        PictureId(self.next_picture)
    }

    /// Registers every attached repaint boundary under `root` that still
    /// needs paint.
    fn register_subtree_paint(&mut self, root: NodeId) {
        let nodes: Vec<NodeId> = self.tree.descendants(root).collect();
        for node in nodes {
            let Some(object) = self.tree.get(node) else {
                continue;
            };
            let is_boundary = object.repaint_boundary || Some(node) == self.root;
            if object.attached() && is_boundary && object.needs_paint {
                if self.paint_dirty_set.insert(node) {
                    self.paint_dirty.push(node);
                }
            }
        }
    }

    // --- Frame production ---

    /// Runs one full frame: layout, paint, composite.
    ///
    /// Must only be called between frames; re-entering a frame in progress
    /// is a programming error.
    pub fn draw_frame(&mut self) -> Frame {
        assert_eq!(
            self.phase,
            FramePhase::Idle,
            "draw_frame: frame already in progress"
        );
        let Some(root) = self.root else {
            return Frame::default();
        };
        self.phase = FramePhase::FlushLayout;
        self.flush_layout();
        self.phase = FramePhase::FlushPaint;
        self.flush_paint();
        self.phase = FramePhase::Composite;
        let frame = compositor::composite(&self.tree, root, &self.pictures, &self.cache, self.debug);
        self.phase = FramePhase::Idle;
        frame
    }

    /// Runs the scheduled frame, if any, then dispatches buffered pointer
    /// events against the fresh geometry. This is the embedder's per-tick
    /// entry point.
    pub fn pump(&mut self) -> Option<Frame> {
        self.pacer.run_frame()?;
        let frame = self.draw_frame();
        self.dispatch_pointer_events();
        Some(frame)
    }

    /// All layout resolves before any paint: the drain loops until layout
    /// stops producing newly dirty boundaries.
    fn flush_layout(&mut self) {
        while !self.layout_dirty.is_empty() {
            let mut batch = std::mem::take(&mut self.layout_dirty);
            self.layout_dirty_set.clear();
            batch.sort_by_key(|&id| self.tree.get(id).map(Attachable::depth).unwrap_or(0));
            for id in batch {
                let (attached, needs_layout, fixed) = match self.tree.get(id) {
                    Some(object) => (
                        object.attached(),
                        object.needs_layout,
                        object.style().fixed_size(),
                    ),
                    None => continue,
                };
                if !attached || !needs_layout {
                    continue;
                }
                let max = if Some(id) == self.root {
                    self.surface.logical_size
                } else {
                    fixed.unwrap_or(self.surface.logical_size)
                };
                let mut ctx = LayoutContext {
                    tree: &mut self.tree,
                    shaper: self.shaper.as_ref(),
                };
                layout_node(&mut ctx, id, max);
                debug!(?id, "laid out boundary");
                // Fresh geometry must repaint; layout set paint bits on
                // every resized node, the boundaries register here.
                self.mark_needs_paint(id);
                self.register_subtree_paint(id);
            }
        }
    }

    /// Re-records every registered paint-dirty boundary, deepest first,
    /// evicting its raster cache entries.
    fn flush_paint(&mut self) {
        let mut batch = std::mem::take(&mut self.paint_dirty);
        self.paint_dirty_set.clear();
        batch.sort_by_key(|&id| {
            std::cmp::Reverse(self.tree.get(id).map(Attachable::depth).unwrap_or(0))
        });
        for id in batch {
            let (attached, needs_paint, picture_id) = match self.tree.get(id) {
                Some(object) => (object.attached(), object.needs_paint, object.picture),
                None => continue,
            };
            if !attached || !needs_paint {
                continue;
            }
            let Some(picture_id) = picture_id else {
                warn!(?id, "paint-dirty boundary without picture identity");
                continue;
            };
            let picture = record_boundary(&mut self.tree, id, picture_id, self.debug);
            self.cache.evict_picture(picture_id);
            self.pictures.insert(id, Arc::new(picture));
            debug!(?id, "re-recorded boundary");
        }
    }

    // --- Pointer input ---

    /// Buffers a native pointer event and schedules a dispatch frame.
    pub fn push_pointer_event(&mut self, event: NativePointerEvent) {
        let bounds = self.surface.bounds();
        self.binding.push(event, bounds);
        self.pacer.schedule_frame();
    }

    /// Flushes the buffer and walks listeners. Called by [`pump`](Self::pump)
    /// after geometry is final; exposed for embedders driving phases
    /// manually.
    pub fn dispatch_pointer_events(&mut self) {
        let flushed = self.binding.flush();
        if flushed.is_empty() {
            return;
        }
        self.dispatcher.dispatch(&self.tree, self.root, flushed);
    }

    /// Registers a pointer listener on a render object.
    pub fn add_listener(
        &mut self,
        id: NodeId,
        ty: PointerType,
        callback: ListenerFn,
        capture: bool,
    ) {
        self.dispatcher.add_listener(id, ty, callback, capture);
    }

    /// Removes a previously registered listener.
    pub fn remove_listener(
        &mut self,
        id: NodeId,
        ty: PointerType,
        callback: ListenerFn,
        capture: bool,
    ) -> bool {
        self.dispatcher.remove_listener(id, ty, callback, capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scheduler::{HeadlessHost, SurfaceHost},
        text::FixedAdvanceShaper,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn pipeline() -> Pipeline {
        let mut host = HeadlessHost::default();
        let surface = host.create_surface(PxSize::new(Px(200.0), Px(200.0)), 1.0);
        Pipeline::new(
            surface,
            FramePacer::new(),
            Box::new(FixedAdvanceShaper::default()),
        )
    }

    fn rect(pipeline: &mut Pipeline, parent: NodeId, x: f32, y: f32, w: f32, h: f32) -> NodeId {
        let id = pipeline.create_element(ElementKind::Rect);
        pipeline.set_size(id, PxSize::new(Px(w), Px(h)));
        pipeline.set_offset(id, PxPosition::new(Px(x), Px(y)));
        pipeline.set_fill(id, Some(Color::RED));
        pipeline.append_child(parent, id);
        id
    }

    #[test]
    fn initial_frame_paints_everything_clean() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let panel = pipeline.create_element(ElementKind::View);
        pipeline.append_child(root, panel);
        let leaf = rect(&mut pipeline, panel, 10.0, 10.0, 50.0, 50.0);

        let frame = pipeline.pump().expect("initial frame was scheduled");
        assert!(!frame.items.is_empty());
        for id in [root, panel, leaf] {
            let object = pipeline.object(id).expect("object exists");
            assert!(!object.needs_paint(), "{id:?} still paint-dirty");
            assert!(!object.needs_layout(), "{id:?} still layout-dirty");
        }
        // Nothing left scheduled.
        assert!(pipeline.pump().is_none());
    }

    #[test]
    fn dirty_registration_is_deduplicated() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let leaf = rect(&mut pipeline, root, 0.0, 0.0, 10.0, 10.0);
        pipeline.pump();

        pipeline.set_fill(leaf, Some(Color::GREEN));
        pipeline.set_fill(leaf, Some(Color::BLUE));
        pipeline.set_rotation(leaf, 0.3);
        assert_eq!(pipeline.paint_dirty().len(), 1);
    }

    #[test]
    fn layout_resolves_before_paint_within_a_frame() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let leaf = rect(&mut pipeline, root, 0.0, 0.0, 10.0, 10.0);
        pipeline.pump();

        pipeline.set_size(leaf, PxSize::new(Px(80.0), Px(40.0)));
        pipeline.pump();
        // Paint saw the finalized geometry: the recorded rect has the new
        // size.
        let picture = pipeline.picture(root).expect("root picture");
        let found = picture.ops.iter().any(|op| {
            matches!(
                op,
                crate::picture::PaintOp::Rect { rect, .. }
                    if rect.width == Px(80.0) && rect.height == Px(40.0)
            )
        });
        assert!(found, "expected the resized rect in the root picture");
    }

    #[test]
    fn scroll_only_change_reuses_cached_boundary_layer() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let scroller = pipeline.create_element(ElementKind::ScrollView);
        pipeline.set_size(scroller, PxSize::new(Px(100.0), Px(100.0)));
        pipeline.append_child(root, scroller);
        let content = rect(&mut pipeline, scroller, 0.0, 0.0, 100.0, 400.0);
        pipeline.set_repaint_boundary(content, true);
        pipeline.pump();

        pipeline.set_scroll_offset(scroller, PxPosition::new(Px::ZERO, Px(120.0)));
        let frame = pipeline.pump().expect("scroll frame");
        let content_picture = pipeline.picture(content).expect("content picture");
        let item = frame
            .items
            .iter()
            .find(|item| item.picture.id == content_picture.id)
            .expect("content layer in frame");
        assert!(item.from_cache, "pure translation must hit the cache");
        // The delta translation landed in the transform.
        assert_eq!(item.transform.ty, -120.0);
    }

    #[test]
    fn content_change_invalidates_the_boundary_cache() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let scroller = pipeline.create_element(ElementKind::ScrollView);
        pipeline.set_size(scroller, PxSize::new(Px(100.0), Px(100.0)));
        pipeline.append_child(root, scroller);
        let content = rect(&mut pipeline, scroller, 0.0, 0.0, 100.0, 400.0);
        pipeline.set_repaint_boundary(content, true);
        pipeline.pump();

        pipeline.set_fill(content, Some(Color::GREEN));
        let frame = pipeline.pump().expect("repaint frame");
        let picture = pipeline.picture(content).expect("content picture");
        let item = frame
            .items
            .iter()
            .find(|item| item.picture.id == picture.id)
            .expect("content layer in frame");
        assert!(!item.from_cache, "content change must re-record");
    }

    #[test]
    fn pointerdown_hits_leaf_and_bubbles_to_ancestors() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let panel = pipeline.create_element(ElementKind::View);
        pipeline.set_offset(panel, PxPosition::new(Px(10.0), Px(10.0)));
        pipeline.set_size(panel, PxSize::new(Px(100.0), Px(100.0)));
        pipeline.append_child(root, panel);
        let leaf = rect(&mut pipeline, panel, 20.0, 20.0, 30.0, 30.0);
        pipeline.pump();

        let log = Rc::new(RefCell::new(Vec::new()));
        let tag = |log: &Rc<RefCell<Vec<(&'static str, bool)>>>, name: &'static str| {
            let log = log.clone();
            let callback: ListenerFn = Arc::new(move |event| {
                log.borrow_mut()
                    .push((name, event.target.is_some()));
            });
            callback
        };
        pipeline.add_listener(leaf, PointerType::Down, tag(&log, "leaf"), false);
        pipeline.add_listener(panel, PointerType::Down, tag(&log, "panel"), false);
        pipeline.add_listener(root, PointerType::Down, tag(&log, "root"), false);

        pipeline.push_pointer_event(NativePointerEvent::new(
            1,
            PointerType::Down,
            PxPosition::new(Px(35.0), Px(35.0)),
        ));
        pipeline.pump().expect("dispatch frame");

        let names: Vec<&str> = log.borrow().iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["leaf", "panel", "root"]);
        assert!(log.borrow().iter().all(|(_, has_target)| *has_target));
    }

    #[test]
    fn dispose_clears_listeners_pictures_and_cache() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let scroller = pipeline.create_element(ElementKind::ScrollView);
        pipeline.set_size(scroller, PxSize::new(Px(50.0), Px(50.0)));
        pipeline.append_child(root, scroller);
        pipeline.add_listener(scroller, PointerType::Down, Arc::new(|_| {}), false);
        pipeline.pump();
        assert!(pipeline.picture(scroller).is_some());

        pipeline.dispose(scroller);
        assert!(pipeline.object(scroller).is_none());
        assert!(pipeline.picture(scroller).is_none());
        // Re-registering the (dropped) listener on a fresh node is fine; the
        // old node's entries are gone.
        pipeline.pump();
    }

    #[test]
    fn offset_animation_marks_paint_without_layout() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let leaf = rect(&mut pipeline, root, 0.0, 0.0, 10.0, 10.0);
        pipeline.pump();

        pipeline.set_offset(leaf, PxPosition::new(Px(5.0), Px(7.0)));
        assert!(pipeline.layout_dirty().is_empty());
        assert_eq!(pipeline.paint_dirty().len(), 1);
        pipeline.pump().expect("animation frame");
    }

    #[test]
    fn debug_flags_add_overlays_without_changing_geometry() {
        let mut pipeline = pipeline();
        let root = pipeline.create_element(ElementKind::View);
        pipeline.set_root(root);
        let leaf = rect(&mut pipeline, root, 0.0, 0.0, 10.0, 10.0);
        pipeline.pump();
        let size_before = pipeline.object(leaf).expect("leaf").size();

        pipeline.set_debug_flags(DebugFlags::NODE_BOUNDS | DebugFlags::LAYER_BOUNDS);
        pipeline.pump().expect("overlay frame");
        let picture = pipeline.picture(root).expect("root picture");
        assert!(
            picture
                .ops
                .iter()
                .any(|op| matches!(op, crate::picture::PaintOp::DebugRect { .. }))
        );
        assert_eq!(pipeline.object(leaf).expect("leaf").size(), size_before);
    }

    #[test]
    #[should_panic(expected = "already has a root")]
    fn second_root_attachment_panics() {
        let mut pipeline = pipeline();
        let first = pipeline.create_element(ElementKind::View);
        let second = pipeline.create_element(ElementKind::View);
        pipeline.set_root(first);
        pipeline.set_root(second);
    }
}
