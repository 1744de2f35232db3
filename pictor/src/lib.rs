//! pictor is a retained-mode rendering engine core: a tree of drawable
//! objects, minimal re-layout/re-paint from property mutations, a cached
//! picture compositor, and pointer dispatch with capture/bubble semantics.
//!
//! # Architecture
//!
//! A [`Pipeline`] owns one render tree per drawable [`Surface`]. External
//! collaborators (a declarative component layer, an animation system)
//! mutate the tree through the pipeline's factory, tree and property
//! surface; every mutation marks the minimal dirty region and requests a
//! frame through the [`FramePacer`]. When the embedder's tick source runs
//! the frame, the pipeline drains layout, then paint, then composites
//! cached pictures into a [`Frame`] — and only then dispatches buffered
//! pointer input against the fresh geometry.
//!
//! # Example
//!
//! ```
//! use pictor::{
//!     ElementKind, FramePacer, HeadlessHost, Pipeline, Px, PxSize, SurfaceHost,
//!     text::FixedAdvanceShaper,
//! };
//!
//! let mut host = HeadlessHost::default();
//! let surface = host.create_surface(PxSize::new(Px(640.0), Px(480.0)), 1.0);
//! let mut pipeline = Pipeline::new(
//!     surface,
//!     FramePacer::new(),
//!     Box::new(FixedAdvanceShaper::default()),
//! );
//!
//! let root = pipeline.create_element(ElementKind::View);
//! pipeline.set_root(root);
//! let frame = pipeline.pump().expect("initial frame is scheduled");
//! assert!(!frame.items.is_empty());
//! ```
#![deny(missing_docs, clippy::unwrap_used)]

pub mod compositor;
pub mod debug;
pub mod dispatch;
pub mod events;
pub mod foundation;
mod object;
pub mod picture;
pub mod pipeline;
pub mod px;
pub mod scheduler;
pub mod style;
pub mod text;
pub mod tree;

/// Installs a default `tracing` subscriber for binaries and tests.
///
/// Honors `RUST_LOG` when set, otherwise logs errors globally and
/// informational events from this crate. Safe to call more than once; later
/// calls are no-ops.
pub fn init_tracing() {
    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match tracing_subscriber::EnvFilter::try_new("error,pictor=info") {
            Ok(filter) => filter,
            Err(_) => tracing_subscriber::EnvFilter::new("error"),
        },
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub use crate::{
    compositor::{CacheStats, Frame, FrameItem, RasterCache},
    debug::{DebugFlags, DebugOptions},
    dispatch::{Dispatcher, EventPhase, ListenerFn, PointerEvent},
    events::{EventBinding, FlushedEvents, NativePointerEvent, PointerType},
    foundation::{NestedMap, SlotKey, SlotList},
    object::RenderObject,
    picture::{PaintOp, Picture, PictureId, PictureRecorder},
    pipeline::{FramePhase, Pipeline},
    px::{Px, PxPosition, PxRect, PxSize, Transform2D},
    scheduler::{
        FrameCallback, FrameCallbackHandle, FramePacer, FrameStamp, HeadlessHost, Surface,
        SurfaceHost, SurfaceId,
    },
    style::{Color, ElementKind, FlexDirection, ImageSource, Stroke, Style},
    text::{FixedAdvanceShaper, ShapedLine, TextAlign, TextShaper, TextStyle},
    tree::{Attachable, NodeId, NodeTree},
};
