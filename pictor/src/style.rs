//! Style properties and the closed element-kind set.

use crate::{
    px::{Px, PxPosition, PxSize},
    text::TextStyle,
};

/// A color in the linear sRGB color space with an alpha component.
///
/// Values are stored as `f32`s, typically in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red component.
    pub r: f32,
    /// Green component.
    pub g: f32,
    /// Blue component.
    pub b: f32,
    /// Alpha component.
    pub a: f32,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);
    /// Opaque black.
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    /// Opaque white.
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0, 1.0);
    /// Opaque red.
    pub const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    /// Opaque green.
    pub const GREEN: Color = Color::new(0.0, 1.0, 0.0, 1.0);
    /// Opaque blue.
    pub const BLUE: Color = Color::new(0.0, 0.0, 1.0, 1.0);

    /// Creates a new `Color` from four `f32` values (red, green, blue, alpha).
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Creates a new opaque `Color` from three `f32` values.
    #[inline]
    pub const fn from_rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Creates a new `Color` from four `u8` values.
    #[inline]
    pub fn from_rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Creates a new opaque `Color` from three `u8` values.
    #[inline]
    pub fn from_rgb_u8(r: u8, g: u8, b: u8) -> Self {
        Self::from_rgba_u8(r, g, b, 255)
    }

    /// Converts the color to an array of `[f32; 4]`.
    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// The default color is fully transparent.
impl Default for Color {
    #[inline]
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

/// Stroke applied around a shape's outline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    /// Stroke color.
    pub color: Color,
    /// Stroke width in pixels.
    pub width: f32,
}

/// Source of an image element: a URI plus the decoded natural size.
///
/// Decoding itself is a platform concern; layout only needs the natural
/// size, paint only needs the URI to reference the decoded bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSource {
    /// Location of the image data.
    pub uri: String,
    /// Intrinsic pixel size of the decoded image.
    pub natural_size: PxSize,
}

/// Main-axis direction of a flex container.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FlexDirection {
    /// Children flow left to right.
    #[default]
    Row,
    /// Children flow top to bottom.
    Column,
}

/// The closed set of element kinds producible by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// Generic positioned container.
    View,
    /// Container laying children out along one axis.
    Flex,
    /// Free-draw surface; paints whatever its recorded ops hold.
    Canvas,
    /// Filled/stroked rectangle.
    Rect,
    /// Rounded rectangle.
    RRect,
    /// Circle inscribed in the element bounds.
    Circle,
    /// Clipping container with a scroll offset.
    ScrollView,
    /// Shaped text block.
    Text,
    /// Bitmap image.
    Image,
    /// Inline grouping element with no painting of its own.
    Chunk,
}

/// Mutable style of a render object.
///
/// Property setters on the pipeline write here and mark the object dirty;
/// layout and paint read it.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    /// Explicit width; `None` lets the kind's layout decide.
    pub width: Option<Px>,
    /// Explicit height; `None` lets the kind's layout decide.
    pub height: Option<Px>,
    /// Interior fill for shape kinds.
    pub fill: Option<Color>,
    /// Outline stroke for shape kinds.
    pub stroke: Option<Stroke>,
    /// Rotation about the element center, in radians.
    pub rotation: f32,
    /// Opacity multiplier in `[0.0, 1.0]`.
    pub opacity: f32,
    /// Corner radius for `RRect`.
    pub corner_radius: f32,
    /// Scroll offset for `ScrollView`; applied to children at paint time.
    pub scroll_offset: PxPosition,
    /// Main-axis direction for `Flex`.
    pub direction: FlexDirection,
    /// Gap between `Flex` children.
    pub gap: Px,
    /// Text content for `Text`.
    pub text: String,
    /// Text shaping parameters for `Text`.
    pub text_style: TextStyle,
    /// Bitmap source for `Image`.
    pub image: Option<ImageSource>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fill: None,
            stroke: None,
            rotation: 0.0,
            opacity: 1.0,
            corner_radius: 0.0,
            scroll_offset: PxPosition::ZERO,
            direction: FlexDirection::Row,
            gap: Px::ZERO,
            text: String::new(),
            text_style: TextStyle::default(),
            image: None,
        }
    }
}

impl Style {
    /// Returns the explicitly fixed size, when both dimensions are set.
    ///
    /// A fixed-size object is a relayout boundary: its size cannot depend
    /// on a dirty descendant.
    pub fn fixed_size(&self) -> Option<PxSize> {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Some(PxSize::new(width, height)),
            _ => None,
        }
    }
}
