//! Platform adapter: frame pacing and drawable surfaces.
//!
//! The engine never talks to a display directly. Dirty-marking operations
//! request a frame through the [`FramePacer`], which coalesces any number
//! of requests into a single callback per frame; the embedder's tick source
//! (vsync, `requestAnimationFrame`, a test loop) decides when that frame
//! actually runs. Surfaces carry logical size and device-pixel-ratio; what
//! backs them is the embedder's business.

use std::sync::{
    Arc, Weak,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use parking_lot::Mutex;
use tracing::trace;

use crate::px::{Px, PxPosition, PxRect, PxSize};

/// Identity of one pacer frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStamp {
    /// Monotonic frame counter, starting at 1.
    pub frame_index: u64,
}

/// Callback fired once per delivered frame.
pub type FrameCallback = Arc<dyn Fn(FrameStamp) + Send + Sync>;

struct PacerShared {
    pending: AtomicBool,
    frame_index: AtomicU64,
    next_registration: AtomicU64,
    callbacks: Mutex<Vec<(u64, FrameCallback)>>,
}

/// Coalescing frame scheduler.
///
/// Any number of [`schedule_frame`](Self::schedule_frame) calls before the
/// embedder runs the frame result in exactly one delivery. Cloning shares
/// the underlying state.
#[derive(Clone)]
pub struct FramePacer {
    shared: Arc<PacerShared>,
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePacer {
    /// Creates a pacer with no pending frame and no callbacks.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PacerShared {
                pending: AtomicBool::new(false),
                frame_index: AtomicU64::new(0),
                next_registration: AtomicU64::new(0),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Requests a frame. Idempotent until the frame runs; returns true only
    /// when this call transitioned the pacer from idle to pending.
    pub fn schedule_frame(&self) -> bool {
        let newly = !self.shared.pending.swap(true, Ordering::AcqRel);
        if newly {
            trace!("frame scheduled");
        }
        newly
    }

    /// Whether a frame is currently pending.
    pub fn has_pending_frame(&self) -> bool {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Registers `callback` for every future frame.
    ///
    /// Registering the same callback (by allocation identity) twice is a
    /// programming error and panics. The returned handle unregisters on
    /// [`dispose`](FrameCallbackHandle::dispose); disposing does not affect
    /// a delivery already in flight.
    pub fn on_frame(&self, callback: FrameCallback) -> FrameCallbackHandle {
        let mut callbacks = self.shared.callbacks.lock();
        if callbacks
            .iter()
            .any(|(_, registered)| Arc::ptr_eq(registered, &callback))
        {
            panic!("on_frame: callback is already registered");
        }
        let id = self.shared.next_registration.fetch_add(1, Ordering::Relaxed);
        callbacks.push((id, callback));
        FrameCallbackHandle {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Runs the pending frame, if any: clears the pending flag, advances
    /// the frame counter, and fires registered callbacks in registration
    /// order. Returns the stamp of the frame that ran.
    pub fn run_frame(&self) -> Option<FrameStamp> {
        if !self.shared.pending.swap(false, Ordering::AcqRel) {
            return None;
        }
        let stamp = FrameStamp {
            frame_index: self.shared.frame_index.fetch_add(1, Ordering::AcqRel) + 1,
        };
        // Snapshot so a callback disposing another registration mid-flight
        // cannot invalidate the iteration.
        let snapshot: Vec<FrameCallback> = {
            let callbacks = self.shared.callbacks.lock();
            callbacks.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in snapshot {
            callback(stamp);
        }
        Some(stamp)
    }

    /// Index of the most recently run frame.
    pub fn frame_index(&self) -> u64 {
        self.shared.frame_index.load(Ordering::Acquire)
    }
}

/// Disposer returned by [`FramePacer::on_frame`].
pub struct FrameCallbackHandle {
    id: u64,
    shared: Weak<PacerShared>,
}

impl FrameCallbackHandle {
    /// Stops future deliveries to the registered callback.
    pub fn dispose(self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .callbacks
                .lock()
                .retain(|(registered, _)| *registered != self.id);
        }
    }
}

/// Identity of a drawable surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// A drawable surface in logical pixels plus its device-pixel-ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    /// Identity assigned by the host.
    pub id: SurfaceId,
    /// Size in logical pixels.
    pub logical_size: PxSize,
    /// Physical pixels per logical pixel.
    pub device_pixel_ratio: f32,
}

impl Surface {
    /// Size in physical pixels.
    pub fn physical_size(&self) -> PxSize {
        PxSize::new(
            Px(self.logical_size.width.0 * self.device_pixel_ratio),
            Px(self.logical_size.height.0 * self.device_pixel_ratio),
        )
    }

    /// Bounds in logical client coordinates, origin at zero.
    pub fn bounds(&self) -> PxRect {
        PxRect::from_pos_size(PxPosition::ZERO, self.logical_size)
    }
}

/// Creates and resizes surfaces.
pub trait SurfaceHost {
    /// Creates a surface of the given logical size.
    fn create_surface(&mut self, logical_size: PxSize, device_pixel_ratio: f32) -> Surface;
    /// Resizes an existing surface in place.
    fn resize_surface(&mut self, surface: &mut Surface, logical_size: PxSize);
}

/// Host backed by nothing; enough for tests and headless embedding.
#[derive(Debug, Default)]
pub struct HeadlessHost {
    next_id: u32,
}

impl SurfaceHost for HeadlessHost {
    fn create_surface(&mut self, logical_size: PxSize, device_pixel_ratio: f32) -> Surface {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        Surface {
            id,
            logical_size,
            device_pixel_ratio,
        }
    }

    fn resize_surface(&mut self, surface: &mut Surface, logical_size: PxSize) {
        surface.logical_size = logical_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn repeated_scheduling_coalesces_into_one_delivery() {
        let pacer = FramePacer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = fired.clone();
        let _handle = pacer.on_frame(Arc::new(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
        }));

        for _ in 0..5 {
            pacer.schedule_frame();
        }
        assert!(pacer.run_frame().is_some());
        assert!(pacer.run_frame().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_callback_registration_panics() {
        let pacer = FramePacer::new();
        let callback: FrameCallback = Arc::new(|_| {});
        let _first = pacer.on_frame(callback.clone());
        let _second = pacer.on_frame(callback);
    }

    #[test]
    fn disposed_callback_stops_receiving_frames() {
        let pacer = FramePacer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let observed = fired.clone();
        let handle = pacer.on_frame(Arc::new(move |_| {
            observed.fetch_add(1, Ordering::SeqCst);
        }));

        pacer.schedule_frame();
        pacer.run_frame();
        handle.dispose();
        pacer.schedule_frame();
        pacer.run_frame();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn frame_stamps_are_monotonic() {
        let pacer = FramePacer::new();
        pacer.schedule_frame();
        let first = pacer.run_frame().map(|stamp| stamp.frame_index);
        pacer.schedule_frame();
        let second = pacer.run_frame().map(|stamp| stamp.frame_index);
        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
    }

    #[test]
    fn headless_host_creates_and_resizes_surfaces() {
        let mut host = HeadlessHost::default();
        let mut surface = host.create_surface(PxSize::new(Px(100.0), Px(50.0)), 2.0);
        assert_eq!(surface.physical_size(), PxSize::new(Px(200.0), Px(100.0)));
        host.resize_surface(&mut surface, PxSize::new(Px(10.0), Px(10.0)));
        assert_eq!(surface.logical_size, PxSize::new(Px(10.0), Px(10.0)));
    }
}
