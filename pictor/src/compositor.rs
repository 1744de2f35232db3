//! Compositing and the raster cache.
//!
//! Each repaint boundary owns one recorded picture. The compositor walks
//! the render tree accumulating layer transforms, consults the cache per
//! boundary, and emits a flat back-to-front [`Frame`] for the presenter.
//!
//! The cache key is the picture identity plus the transform with its
//! translation zeroed: pure translation (scroll, pan) of an unchanged
//! subtree reuses the cached recording, while a rotation or scale change
//! misses. A key match is trusted as content-equal by construction; there
//! is no verification path. Nothing bounds the cache beyond same-key
//! overwrite and explicit invalidation — an LRU policy is a documented
//! extension point, not implemented here.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::{debug, warn};

use crate::{
    debug::{DebugFlags, DebugOptions},
    object::RenderObject,
    picture::{Picture, PictureId},
    px::{PxPosition, Transform2D},
    style::ElementKind,
    tree::{NodeId, NodeTree},
};

/// Builds the raster cache key for a picture under a transform.
pub(crate) fn cache_key(picture: PictureId, transform: Transform2D) -> String {
    format!("pic:{}|{}", picture.0, transform.translation_invariant_key())
}

struct CacheEntry {
    picture: Arc<Picture>,
}

/// Hit/miss counters for one cache lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to (re)record.
    pub misses: u64,
}

/// Picture cache keyed by identity + translation-zeroed transform.
pub struct RasterCache {
    entries: DashMap<String, CacheEntry, FxBuildHasher>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for RasterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(FxBuildHasher),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Current hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Exact-match lookup. Counts a hit or a miss.
    pub(crate) fn lookup(&self, key: &str) -> Option<Arc<Picture>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.picture.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts (or overwrites) the entry for `key`.
    pub(crate) fn insert(&self, key: String, picture: Arc<Picture>) {
        self.entries.insert(key, CacheEntry { picture });
    }

    /// Drops every entry recorded for the given picture identity.
    ///
    /// Called when a paint-dirty mark lands on the boundary's subtree; the
    /// next composite must not reuse stale content.
    pub(crate) fn evict_picture(&self, picture: PictureId) {
        let prefix = format!("pic:{}|", picture.0);
        self.entries.retain(|key, _| !key.starts_with(&prefix));
    }
}

/// One composited layer in back-to-front order.
#[derive(Clone)]
pub struct FrameItem {
    /// The recorded picture to draw.
    pub picture: Arc<Picture>,
    /// Placement of the picture in surface coordinates.
    pub transform: Transform2D,
    /// Whether the picture came from the raster cache.
    pub from_cache: bool,
    /// Whether the presenter should stamp the cache watermark overlay.
    pub watermark: bool,
}

/// Output of one composite pass.
#[derive(Default, Clone)]
pub struct Frame {
    /// Layers in back-to-front order.
    pub items: Vec<FrameItem>,
}

/// Composites the attached tree into a [`Frame`].
pub(crate) fn composite(
    tree: &NodeTree<RenderObject>,
    root: NodeId,
    pictures: &FxHashMap<NodeId, Arc<Picture>>,
    cache: &RasterCache,
    debug: DebugOptions,
) -> Frame {
    let mut frame = Frame::default();
    walk(
        tree,
        root,
        Transform2D::IDENTITY,
        true,
        pictures,
        cache,
        debug,
        &mut frame,
    );
    debug!(layers = frame.items.len(), "composited frame");
    frame
}

#[allow(clippy::too_many_arguments)]
fn walk(
    tree: &NodeTree<RenderObject>,
    id: NodeId,
    parent_transform: Transform2D,
    is_root: bool,
    pictures: &FxHashMap<NodeId, Arc<Picture>>,
    cache: &RasterCache,
    debug: DebugOptions,
    frame: &mut Frame,
) {
    let Some(object) = tree.get(id) else {
        return;
    };

    // Offset within the parent, then rotation about the element center.
    let mut node_transform = Transform2D::IDENTITY;
    if object.style().rotation != 0.0 {
        let center = PxPosition::new(object.size().width / 2.0, object.size().height / 2.0);
        node_transform = Transform2D::translation(-center.x.0, -center.y.0)
            .then(Transform2D::rotation(object.style().rotation))
            .then(Transform2D::translation(center.x.0, center.y.0));
    }
    let offset = object.offset();
    let node_transform = node_transform
        .then(Transform2D::translation(offset.x.0, offset.y.0))
        .then(parent_transform);

    if object.is_repaint_boundary() || is_root {
        let Some(picture_id) = object.picture else {
            warn!(?id, "repaint boundary has no picture identity; skipping");
            return;
        };
        let key = cache_key(picture_id, node_transform);
        let (picture, from_cache) = match cache.lookup(&key) {
            Some(picture) => (picture, true),
            None => match pictures.get(&id) {
                Some(picture) => {
                    cache.insert(key, picture.clone());
                    (picture.clone(), false)
                }
                None => {
                    warn!(?id, "repaint boundary has no recorded picture; skipping");
                    return;
                }
            },
        };
        frame.items.push(FrameItem {
            picture,
            transform: node_transform,
            from_cache,
            watermark: from_cache && debug.has(DebugFlags::CACHE_WATERMARK),
        });
    }

    // Children of a scroll container live in scrolled content coordinates.
    let mut child_transform = node_transform;
    if object.kind() == ElementKind::ScrollView {
        let scroll = object.style().scroll_offset;
        if scroll != PxPosition::ZERO {
            child_transform =
                Transform2D::translation(-scroll.x.0, -scroll.y.0).then(node_transform);
        }
    }
    for child in tree.children(id) {
        walk(
            tree,
            child,
            child_transform,
            false,
            pictures,
            cache,
            debug,
            frame,
        );
    }
}
