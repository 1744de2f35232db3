//! Debug paint overlays.
//!
//! A process-wide-style set of named boolean flags, held as an explicit
//! options value on the pipeline and injected into the paint path. Overlays
//! are purely additive draw ops; they never change layout or paint results.

use bitflags::bitflags;

bitflags! {
    /// Named overlay flags, toggled as a bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugFlags: u32 {
        /// Outline every repaint-boundary layer.
        const LAYER_BOUNDS = 1 << 0;
        /// Outline every render object.
        const NODE_BOUNDS = 1 << 1;
        /// Label every render object with its arena id.
        const NODE_ID = 1 << 2;
        /// Outline each shaped text line.
        const TEXT_LINE_BOUNDS = 1 << 3;
        /// Stamp composited layers that came from the raster cache.
        const CACHE_WATERMARK = 1 << 4;
        /// Outline shape geometry (circle/rounded-rect path boxes).
        const PATH_BOUNDS = 1 << 5;
    }
}

/// Paint-path debug options carried by the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugOptions {
    /// Active overlay flags.
    pub flags: DebugFlags,
}

impl DebugOptions {
    /// Returns true when the given flag is set.
    pub fn has(self, flag: DebugFlags) -> bool {
        self.flags.contains(flag)
    }
}
