//! Native pointer event capture and buffering.
//!
//! One binding listens on one surface. Between flushes it keeps at most
//! one (the latest) native event per `(pointer id, semantic type)`; a
//! `pointerup` observed outside the surface bounds is remapped to
//! `pointerupoutside` so an interaction can close even when the release
//! lands elsewhere. Flushing is destructive: it returns the accumulated
//! buffer and clears it.

use rustc_hash::FxHashMap;

use crate::px::{PxPosition, PxRect};

/// Semantic pointer event vocabulary.
///
/// The first five are captured natively and buffered; `Enter`, `Leave`,
/// `Over` and `Out` are derived during dispatch by diffing hit targets
/// between frames and never appear in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerType {
    /// Button or touch press.
    Down,
    /// Release inside the surface.
    Up,
    /// Release observed outside the surface.
    UpOutside,
    /// Pointer movement.
    Move,
    /// Wheel / trackpad scroll.
    Wheel,
    /// Derived: pointer entered an object (non-bubbling).
    Enter,
    /// Derived: pointer left an object (non-bubbling).
    Leave,
    /// Derived: pointer moved over an object (bubbling).
    Over,
    /// Derived: pointer moved out of an object (bubbling).
    Out,
}

impl PointerType {
    /// Types captured from the platform, in dispatch order.
    pub const NATIVE: [Self; 5] = [Self::Move, Self::Down, Self::Up, Self::UpOutside, Self::Wheel];

    /// Every semantic type, native and derived.
    pub const ALL: [Self; 9] = [
        Self::Move,
        Self::Down,
        Self::Up,
        Self::UpOutside,
        Self::Wheel,
        Self::Enter,
        Self::Leave,
        Self::Over,
        Self::Out,
    ];

    /// Returns true for types the binding accepts from the platform.
    pub fn is_native(self) -> bool {
        Self::NATIVE.contains(&self)
    }
}

/// A platform pointer event in surface client coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct NativePointerEvent {
    /// Platform-assigned contact identity.
    pub pointer_id: i32,
    /// Semantic type; must be one of the native types.
    pub ty: PointerType,
    /// Position in logical client coordinates.
    pub position: PxPosition,
    /// Horizontal wheel delta; zero for non-wheel events.
    pub wheel_delta_x: f32,
    /// Vertical wheel delta; zero for non-wheel events.
    pub wheel_delta_y: f32,
}

impl NativePointerEvent {
    /// Convenience constructor for non-wheel events.
    pub fn new(pointer_id: i32, ty: PointerType, position: PxPosition) -> Self {
        Self {
            pointer_id,
            ty,
            position,
            wheel_delta_x: 0.0,
            wheel_delta_y: 0.0,
        }
    }

    /// Convenience constructor for wheel events.
    pub fn wheel(pointer_id: i32, position: PxPosition, delta_x: f32, delta_y: f32) -> Self {
        Self {
            pointer_id,
            ty: PointerType::Wheel,
            position,
            wheel_delta_x: delta_x,
            wheel_delta_y: delta_y,
        }
    }
}

/// Buffered events for one flush window: pointer id → type → latest event.
pub type FlushedEvents = FxHashMap<i32, FxHashMap<PointerType, NativePointerEvent>>;

/// Per-surface native pointer event buffer.
#[derive(Default)]
pub struct EventBinding {
    buffer: FlushedEvents,
}

impl EventBinding {
    /// Creates an empty binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers a native event, keeping only the latest per
    /// `(pointer id, type)`.
    ///
    /// `Up` outside `surface_bounds` is stored as `UpOutside`. Feeding a
    /// derived type is a programming error.
    pub fn push(&mut self, mut event: NativePointerEvent, surface_bounds: PxRect) {
        assert!(
            event.ty.is_native(),
            "event binding only accepts native pointer types"
        );
        if event.ty == PointerType::Up && !surface_bounds.contains(event.position) {
            event.ty = PointerType::UpOutside;
        }
        self.buffer
            .entry(event.pointer_id)
            .or_default()
            .insert(event.ty, event);
    }

    /// Returns true when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the accumulated buffer and clears it.
    pub fn flush(&mut self) -> FlushedEvents {
        std::mem::take(&mut self.buffer)
    }
}
