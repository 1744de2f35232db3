//! Render objects and their per-kind layout/paint strategies.
//!
//! A render object is one drawable/layoutable unit. Concrete kinds differ
//! only in how they size themselves and which ops they record; that
//! behavior lives in stateless [`ElementSpec`] strategy objects looked up
//! from a capability table, not in a subclass chain. Tree structure,
//! dirty flags and attachment state are shared by composition.

use tracing::warn;

use crate::{
    debug::{DebugFlags, DebugOptions},
    picture::{PaintOp, Picture, PictureId, PictureRecorder},
    px::{Px, PxPosition, PxRect, PxSize},
    style::{Color, ElementKind, FlexDirection, Style},
    text::{ShapedLine, TextAlign, TextShaper},
    tree::{Attachable, NodeId, NodeTree},
};

/// One drawable/layoutable unit in the render tree.
pub struct RenderObject {
    pub(crate) kind: ElementKind,
    pub(crate) style: Style,
    pub(crate) offset: PxPosition,
    pub(crate) size: PxSize,
    pub(crate) needs_layout: bool,
    pub(crate) needs_paint: bool,
    pub(crate) repaint_boundary: bool,
    pub(crate) picture: Option<PictureId>,
    pub(crate) shaped_lines: Vec<ShapedLine>,
    depth: u32,
    attached: bool,
}

impl RenderObject {
    /// Creates a detached object of the given kind with default style.
    pub(crate) fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            style: Style::default(),
            offset: PxPosition::ZERO,
            size: PxSize::ZERO,
            needs_layout: true,
            needs_paint: true,
            repaint_boundary: false,
            picture: None,
            shaped_lines: Vec::new(),
            depth: 0,
            attached: false,
        }
    }

    /// The element kind this object was created as.
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Current style.
    pub fn style(&self) -> &Style {
        &self.style
    }

    /// Offset within the parent's content box.
    pub fn offset(&self) -> PxPosition {
        self.offset
    }

    /// Size resolved by the last layout pass.
    pub fn size(&self) -> PxSize {
        self.size
    }

    /// Whether this object must re-run layout.
    pub fn needs_layout(&self) -> bool {
        self.needs_layout
    }

    /// Whether this object must be repainted.
    pub fn needs_paint(&self) -> bool {
        self.needs_paint
    }

    /// Whether this object roots a compositing layer.
    pub fn is_repaint_boundary(&self) -> bool {
        self.repaint_boundary
    }

    /// Local bounds at the origin.
    pub fn bounds(&self) -> PxRect {
        PxRect::from_pos_size(PxPosition::ZERO, self.size)
    }

    /// Whether this object bounds upward layout-dirty propagation.
    ///
    /// A fixed-size object's size cannot depend on a dirty descendant.
    pub(crate) fn is_relayout_boundary(&self) -> bool {
        self.style.fixed_size().is_some()
    }
}

impl Attachable for RenderObject {
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

/// State handed to layout strategies.
pub(crate) struct LayoutContext<'a> {
    pub tree: &'a mut NodeTree<RenderObject>,
    pub shaper: &'a dyn TextShaper,
}

/// Per-kind layout and paint strategy.
///
/// Implementations are stateless singletons; all state lives on the render
/// object. `layout` resolves the node's size and may place children;
/// `paint` records the node's own ops only — the boundary walk handles
/// structure (save/restore, translation, clipping, recursion).
pub(crate) trait ElementSpec: Sync {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize;

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, debug: DebugOptions);

    /// Refines a bounds hit; the walk has already checked containment.
    fn hit_test_self(&self, _object: &RenderObject, _local: PxPosition) -> bool {
        true
    }
}

/// Capability table mapping kinds to their strategy singletons.
pub(crate) fn element_spec(kind: ElementKind) -> &'static dyn ElementSpec {
    match kind {
        ElementKind::View | ElementKind::Canvas => &ViewSpec,
        ElementKind::Chunk => &ChunkSpec,
        ElementKind::Flex => &FlexSpec,
        ElementKind::ScrollView => &ScrollSpec,
        ElementKind::Rect => &RectSpec,
        ElementKind::RRect => &RRectSpec,
        ElementKind::Circle => &CircleSpec,
        ElementKind::Text => &TextSpec,
        ElementKind::Image => &ImageSpec,
    }
}

/// Resolves layout for `id` under `max`, writing the size back and
/// clearing its layout-dirty bit. Recurses through the strategy.
pub(crate) fn layout_node(ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
    let Some(object) = ctx.tree.get(id) else {
        warn!(?id, "layout requested for a removed node; skipping");
        return PxSize::ZERO;
    };
    let spec = element_spec(object.kind);
    let size = spec.layout(ctx, id, max);
    if let Some(object) = ctx.tree.get_mut(id) {
        if object.size != size {
            // Fresh geometry invalidates the recorded picture.
            object.needs_paint = true;
        }
        object.size = size;
        object.needs_layout = false;
    }
    size
}

/// Lays out children at their own offsets and returns the explicit size,
/// falling back to the children's bounding box. Shared by the positioned
/// container kinds and the shape kinds.
fn layout_positioned(ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
    let (explicit_width, explicit_height) = {
        let Some(object) = ctx.tree.get(id) else {
            return PxSize::ZERO;
        };
        (object.style.width, object.style.height)
    };
    let child_max = PxSize::new(
        explicit_width.unwrap_or(max.width),
        explicit_height.unwrap_or(max.height),
    );
    let children: Vec<NodeId> = ctx.tree.children(id).collect();
    let mut bbox = PxSize::ZERO;
    for child in children {
        let child_size = layout_node(ctx, child, child_max);
        if let Some(child_object) = ctx.tree.get(child) {
            let offset = child_object.offset;
            bbox.width = bbox.width.max(offset.x + child_size.width);
            bbox.height = bbox.height.max(offset.y + child_size.height);
        }
    }
    PxSize::new(
        explicit_width.unwrap_or(bbox.width),
        explicit_height.unwrap_or(bbox.height),
    )
}

fn paint_background(object: &RenderObject, recorder: &mut PictureRecorder) {
    if object.style.fill.is_some() || object.style.stroke.is_some() {
        recorder.push(PaintOp::Rect {
            rect: object.bounds(),
            fill: object.style.fill,
            stroke: object.style.stroke,
        });
    }
}

fn paint_path_bounds(object: &RenderObject, recorder: &mut PictureRecorder, debug: DebugOptions) {
    if debug.has(DebugFlags::PATH_BOUNDS) {
        recorder.push(PaintOp::DebugRect {
            rect: object.bounds(),
            color: Color::GREEN,
        });
    }
}

struct ViewSpec;

impl ElementSpec for ViewSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
        layout_positioned(ctx, id, max)
    }

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, _debug: DebugOptions) {
        paint_background(object, recorder);
    }
}

struct ChunkSpec;

impl ElementSpec for ChunkSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
        layout_positioned(ctx, id, max)
    }

    fn paint(&self, _object: &RenderObject, _recorder: &mut PictureRecorder, _debug: DebugOptions) {
        // Grouping only; nothing of its own to draw.
    }
}

struct FlexSpec;

impl ElementSpec for FlexSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
        let (style_width, style_height, direction, gap) = {
            let Some(object) = ctx.tree.get(id) else {
                return PxSize::ZERO;
            };
            (
                object.style.width,
                object.style.height,
                object.style.direction,
                object.style.gap,
            )
        };
        let child_max = PxSize::new(
            style_width.unwrap_or(max.width),
            style_height.unwrap_or(max.height),
        );
        let children: Vec<NodeId> = ctx.tree.children(id).collect();
        let mut main = Px::ZERO;
        let mut cross = Px::ZERO;
        for (index, child) in children.iter().copied().enumerate() {
            let child_size = layout_node(ctx, child, child_max);
            if index > 0 {
                main += gap;
            }
            let position = match direction {
                FlexDirection::Row => PxPosition::new(main, Px::ZERO),
                FlexDirection::Column => PxPosition::new(Px::ZERO, main),
            };
            if let Some(child_object) = ctx.tree.get_mut(child) {
                child_object.offset = position;
            }
            match direction {
                FlexDirection::Row => {
                    main += child_size.width;
                    cross = cross.max(child_size.height);
                }
                FlexDirection::Column => {
                    main += child_size.height;
                    cross = cross.max(child_size.width);
                }
            }
        }
        let content = match direction {
            FlexDirection::Row => PxSize::new(main, cross),
            FlexDirection::Column => PxSize::new(cross, main),
        };
        PxSize::new(
            style_width.unwrap_or(content.width),
            style_height.unwrap_or(content.height),
        )
    }

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, _debug: DebugOptions) {
        paint_background(object, recorder);
    }
}

struct ScrollSpec;

impl ElementSpec for ScrollSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
        // Content may exceed the viewport; children lay out unconstrained.
        let unbounded = PxSize::new(Px(f32::INFINITY), Px(f32::INFINITY));
        let (explicit_width, explicit_height) = {
            let Some(object) = ctx.tree.get(id) else {
                return PxSize::ZERO;
            };
            (object.style.width, object.style.height)
        };
        let children: Vec<NodeId> = ctx.tree.children(id).collect();
        let mut bbox = PxSize::ZERO;
        for child in children {
            let child_size = layout_node(ctx, child, unbounded);
            if let Some(child_object) = ctx.tree.get(child) {
                let offset = child_object.offset;
                bbox.width = bbox.width.max(offset.x + child_size.width);
                bbox.height = bbox.height.max(offset.y + child_size.height);
            }
        }
        PxSize::new(
            explicit_width.unwrap_or(bbox.width.min(max.width)),
            explicit_height.unwrap_or(bbox.height.min(max.height)),
        )
    }

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, _debug: DebugOptions) {
        paint_background(object, recorder);
    }
}

struct RectSpec;

impl ElementSpec for RectSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
        layout_positioned(ctx, id, max)
    }

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, debug: DebugOptions) {
        recorder.push(PaintOp::Rect {
            rect: object.bounds(),
            fill: object.style.fill,
            stroke: object.style.stroke,
        });
        paint_path_bounds(object, recorder, debug);
    }
}

struct RRectSpec;

impl ElementSpec for RRectSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
        layout_positioned(ctx, id, max)
    }

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, debug: DebugOptions) {
        recorder.push(PaintOp::RRect {
            rect: object.bounds(),
            radius: object.style.corner_radius,
            fill: object.style.fill,
            stroke: object.style.stroke,
        });
        paint_path_bounds(object, recorder, debug);
    }
}

struct CircleSpec;

impl ElementSpec for CircleSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
        layout_positioned(ctx, id, max)
    }

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, debug: DebugOptions) {
        recorder.push(PaintOp::Circle {
            rect: object.bounds(),
            fill: object.style.fill,
            stroke: object.style.stroke,
        });
        paint_path_bounds(object, recorder, debug);
    }

    fn hit_test_self(&self, object: &RenderObject, local: PxPosition) -> bool {
        let size = object.size;
        let radius = size.width.0.min(size.height.0) / 2.0;
        let center_x = size.width.0 / 2.0;
        let center_y = size.height.0 / 2.0;
        let dx = local.x.0 - center_x;
        let dy = local.y.0 - center_y;
        dx * dx + dy * dy <= radius * radius
    }
}

struct TextSpec;

impl ElementSpec for TextSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, max: PxSize) -> PxSize {
        let (style, text) = {
            let Some(object) = ctx.tree.get(id) else {
                return PxSize::ZERO;
            };
            (object.style.text_style.clone(), object.style.text.clone())
        };
        let max_width = {
            let Some(object) = ctx.tree.get(id) else {
                return PxSize::ZERO;
            };
            object.style.width.unwrap_or(max.width)
        };
        let lines = ctx.shaper.shape(&style, &text, max_width);
        let widest = lines
            .iter()
            .map(|line| line.advance)
            .fold(Px::ZERO, Px::max);
        let measured = PxSize::new(
            widest,
            style.line_advance() * lines.len() as f32,
        );
        if let Some(object) = ctx.tree.get_mut(id) {
            object.shaped_lines = lines;
            PxSize::new(
                object.style.width.unwrap_or(measured.width),
                object.style.height.unwrap_or(measured.height),
            )
        } else {
            measured
        }
    }

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, debug: DebugOptions) {
        let text_style = &object.style.text_style;
        let color = object.style.fill.unwrap_or(Color::BLACK);
        let line_advance = text_style.line_advance();
        for (index, line) in object.shaped_lines.iter().enumerate() {
            let slack = object.size.width - line.advance;
            let x = match text_style.align {
                TextAlign::Start => Px::ZERO,
                TextAlign::Center => slack / 2.0,
                TextAlign::End => slack,
            };
            let origin = PxPosition::new(x, line_advance * index as f32);
            recorder.push(PaintOp::TextLine {
                origin,
                text: line.text.clone(),
                advance: line.advance,
                font_size: text_style.font_size,
                color,
            });
            if debug.has(DebugFlags::TEXT_LINE_BOUNDS) {
                recorder.push(PaintOp::DebugRect {
                    rect: PxRect::from_pos_size(origin, PxSize::new(line.advance, line_advance)),
                    color: Color::BLUE,
                });
            }
        }
    }
}

struct ImageSpec;

impl ElementSpec for ImageSpec {
    fn layout(&self, ctx: &mut LayoutContext<'_>, id: NodeId, _max: PxSize) -> PxSize {
        let Some(object) = ctx.tree.get(id) else {
            return PxSize::ZERO;
        };
        let natural = object
            .style
            .image
            .as_ref()
            .map(|image| image.natural_size)
            .unwrap_or(PxSize::ZERO);
        PxSize::new(
            object.style.width.unwrap_or(natural.width),
            object.style.height.unwrap_or(natural.height),
        )
    }

    fn paint(&self, object: &RenderObject, recorder: &mut PictureRecorder, _debug: DebugOptions) {
        if let Some(image) = &object.style.image {
            recorder.push(PaintOp::Image {
                rect: object.bounds(),
                uri: image.uri.clone(),
            });
        }
    }
}

/// Records the picture for one repaint boundary.
///
/// The walk descends the boundary's subtree in paint order, emitting
/// structural ops for offsets, rotation, opacity and scroll clipping, and
/// stopping at nested boundaries with a [`PaintOp::ChildLayer`] marker.
/// Paint-dirty bits are cleared on every visited node. The boundary's own
/// offset and rotation are *not* baked in; the compositor applies them as
/// the layer transform so the raster cache can key on them.
pub(crate) fn record_boundary(
    tree: &mut NodeTree<RenderObject>,
    boundary: NodeId,
    picture: PictureId,
    debug: DebugOptions,
) -> Picture {
    let mut recorder = PictureRecorder::new(picture);
    paint_subtree(tree, boundary, &mut recorder, debug, true);
    let bounds = tree.get(boundary).map(RenderObject::size).unwrap_or_default();
    if debug.has(DebugFlags::LAYER_BOUNDS) {
        recorder.push(PaintOp::DebugRect {
            rect: PxRect::from_pos_size(PxPosition::ZERO, bounds),
            color: Color::RED,
        });
    }
    recorder.finish(bounds)
}

fn paint_subtree(
    tree: &mut NodeTree<RenderObject>,
    id: NodeId,
    recorder: &mut PictureRecorder,
    debug: DebugOptions,
    is_boundary_root: bool,
) {
    let Some(object) = tree.get(id) else {
        warn!(?id, "paint requested for a removed node; skipping");
        return;
    };
    if object.repaint_boundary && !is_boundary_root {
        // Nested layer: composited separately, leave a marker at its slot.
        if let Some(picture) = object.picture {
            recorder.push(PaintOp::ChildLayer {
                picture,
                offset: object.offset,
            });
        }
        return;
    }

    let kind = object.kind;
    let offset = object.offset;
    let size = object.size;
    let rotation = object.style.rotation;
    let opacity = object.style.opacity;
    let scroll = object.style.scroll_offset;
    let spec = element_spec(kind);

    recorder.push(PaintOp::Save);
    if !is_boundary_root {
        if offset != PxPosition::ZERO {
            recorder.push(PaintOp::Translate(offset));
        }
        if rotation != 0.0 {
            // Spin about the element center.
            let center = PxPosition::new(size.width / 2.0, size.height / 2.0);
            recorder.push(PaintOp::Translate(center));
            recorder.push(PaintOp::Rotate(rotation));
            recorder.push(PaintOp::Translate(PxPosition::ZERO - center));
        }
    }
    if opacity < 1.0 {
        recorder.push(PaintOp::Opacity(opacity));
    }
    if kind == ElementKind::ScrollView {
        recorder.push(PaintOp::ClipRect(PxRect::from_pos_size(
            PxPosition::ZERO,
            size,
        )));
    }

    if let Some(object) = tree.get(id) {
        spec.paint(object, recorder, debug);
        if debug.has(DebugFlags::NODE_BOUNDS) {
            recorder.push(PaintOp::DebugRect {
                rect: object.bounds(),
                color: Color::new(1.0, 0.0, 1.0, 1.0),
            });
        }
        if debug.has(DebugFlags::NODE_ID) {
            recorder.push(PaintOp::DebugLabel {
                origin: PxPosition::ZERO,
                text: format!("{id:?}"),
            });
        }
    }

    let scrolls = kind == ElementKind::ScrollView && scroll != PxPosition::ZERO;
    if scrolls {
        recorder.push(PaintOp::Translate(PxPosition::ZERO - scroll));
    }
    let children: Vec<NodeId> = tree.children(id).collect();
    for child in children {
        paint_subtree(tree, child, recorder, debug, false);
    }
    recorder.push(PaintOp::Restore);

    if let Some(object) = tree.get_mut(id) {
        object.needs_paint = false;
    }
}
