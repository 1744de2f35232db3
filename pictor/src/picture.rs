//! Recorded pictures.
//!
//! Paint does not rasterize; it records a flat display list of [`PaintOp`]s
//! per repaint boundary. A picture's identity is stable across re-records
//! of the same boundary, which is what the raster cache keys on.

use crate::{
    px::{Px, PxPosition, PxRect, PxSize},
    style::{Color, Stroke},
};

/// Stable identity of a recorded picture.
///
/// Allocated once per repaint boundary; re-recording the boundary produces
/// new ops under the same identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PictureId(pub u64);

/// One draw op inside a picture.
///
/// Structural ops (`Save`/`Restore`/`Translate`/`Rotate`/clip) mirror a
/// canvas API; `ChildLayer` marks where a nested repaint boundary
/// composites into this picture.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    /// Pushes the current transform/clip state.
    Save,
    /// Pops to the most recent save.
    Restore,
    /// Translates subsequent ops.
    Translate(PxPosition),
    /// Rotates subsequent ops about the current origin, in radians.
    Rotate(f32),
    /// Scales subsequent op alpha.
    Opacity(f32),
    /// Clips subsequent ops to a rectangle in current coordinates.
    ClipRect(PxRect),
    /// Filled/stroked rectangle.
    Rect {
        /// Target rectangle.
        rect: PxRect,
        /// Interior fill, if any.
        fill: Option<Color>,
        /// Outline stroke, if any.
        stroke: Option<Stroke>,
    },
    /// Rounded rectangle.
    RRect {
        /// Target rectangle.
        rect: PxRect,
        /// Corner radius.
        radius: f32,
        /// Interior fill, if any.
        fill: Option<Color>,
        /// Outline stroke, if any.
        stroke: Option<Stroke>,
    },
    /// Circle centered in `rect`, diameter the smaller extent.
    Circle {
        /// Bounding rectangle.
        rect: PxRect,
        /// Interior fill, if any.
        fill: Option<Color>,
        /// Outline stroke, if any.
        stroke: Option<Stroke>,
    },
    /// One shaped text line.
    TextLine {
        /// Line origin (top-left of the line box).
        origin: PxPosition,
        /// The characters to draw.
        text: String,
        /// Measured advance of the line.
        advance: Px,
        /// Font size in pixels.
        font_size: f32,
        /// Text color.
        color: Color,
    },
    /// Bitmap image stretched into `rect`.
    Image {
        /// Target rectangle.
        rect: PxRect,
        /// Source URI resolved by the presenter.
        uri: String,
    },
    /// Placeholder where a nested repaint boundary composites.
    ChildLayer {
        /// Identity of the nested boundary's picture.
        picture: PictureId,
        /// Offset of the nested layer within this picture.
        offset: PxPosition,
    },
    /// Debug overlay rectangle; additive only.
    DebugRect {
        /// Outlined rectangle.
        rect: PxRect,
        /// Outline color.
        color: Color,
    },
    /// Debug overlay label; additive only.
    DebugLabel {
        /// Label anchor.
        origin: PxPosition,
        /// Label text.
        text: String,
    },
}

/// A recorded display list with a stable identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    /// Identity of this picture.
    pub id: PictureId,
    /// Ops in paint order.
    pub ops: Vec<PaintOp>,
    /// Size of the boundary the picture was recorded for.
    pub bounds: PxSize,
}

/// Records ops for one picture.
pub struct PictureRecorder {
    id: PictureId,
    ops: Vec<PaintOp>,
}

impl PictureRecorder {
    /// Starts a recording under the given identity.
    pub fn new(id: PictureId) -> Self {
        Self {
            id,
            ops: Vec::new(),
        }
    }

    /// Appends one op.
    pub fn push(&mut self, op: PaintOp) {
        self.ops.push(op);
    }

    /// Number of ops recorded so far.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Finishes the recording into a [`Picture`].
    pub fn finish(self, bounds: PxSize) -> Picture {
        Picture {
            id: self.id,
            ops: self.ops,
            bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_preserves_op_order_and_identity() {
        let mut recorder = PictureRecorder::new(PictureId(7));
        recorder.push(PaintOp::Save);
        recorder.push(PaintOp::Translate(PxPosition::new(Px(1.0), Px(2.0))));
        recorder.push(PaintOp::Restore);
        let picture = recorder.finish(PxSize::new(Px(10.0), Px(10.0)));
        assert_eq!(picture.id, PictureId(7));
        assert_eq!(picture.ops.len(), 3);
        assert!(matches!(picture.ops[0], PaintOp::Save));
        assert!(matches!(picture.ops[2], PaintOp::Restore));
    }
}
