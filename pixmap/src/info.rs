//! Geometry and format descriptions of a buffer.
use pixmap_texel::{AlphaType, ColorSpace, PixelFormat};

use crate::memory::AllocatorKind;

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

/// A pixel coordinate, negative values are representable so that they can be rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// A rectangle in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

/// Describes the pixels of a buffer, independent of where they are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ImageInfo {
    pub size: Size,
    pub pixel_format: PixelFormat,
    pub alpha_type: AlphaType,
    pub color_space: ColorSpace,
    pub base_density: i32,
}

/// How an image is fitted to a target of a different size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScaleMode {
    /// Stretch both axes independently to the target.
    #[default]
    FitTargetSize,
    /// Scale uniformly until the target is covered, then keep the center.
    CenterCrop,
}

/// Parameters for creating a new buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InitializationOptions {
    pub size: Size,
    /// The format of the new buffer.
    pub pixel_format: PixelFormat,
    /// The format of colors passed to constructors that copy from caller data.
    pub src_pixel_format: PixelFormat,
    pub alpha_type: AlphaType,
    pub color_space: ColorSpace,
    pub allocator: AllocatorKind,
    pub editable: bool,
    /// Used when copying from a source whose size differs from `size`.
    pub scale_mode: ScaleMode,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Size { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Position { x, y }
    }
}

impl Rect {
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Rect {
            left,
            top,
            width,
            height,
        }
    }

    /// The rectangle covering a whole image.
    pub fn of_size(size: Size) -> Self {
        Rect {
            left: 0,
            top: 0,
            width: i32::try_from(size.width).unwrap_or(i32::MAX),
            height: i32::try_from(size.height).unwrap_or(i32::MAX),
        }
    }

    /// If the rectangle is non-empty and lies within an image of `size`.
    pub fn is_within(&self, size: Size) -> bool {
        let fits = |start: i32, len: i32, limit: u32| {
            start >= 0 && len > 0 && i64::from(start) + i64::from(len) <= i64::from(limit)
        };

        fits(self.left, self.width, size.width) && fits(self.top, self.height, size.height)
    }
}

impl ImageInfo {
    pub fn new(size: Size, pixel_format: PixelFormat) -> Self {
        ImageInfo {
            size,
            pixel_format,
            ..ImageInfo::default()
        }
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }
}

impl InitializationOptions {
    pub fn new(size: Size, pixel_format: PixelFormat) -> Self {
        InitializationOptions {
            size,
            pixel_format,
            ..InitializationOptions::default()
        }
    }

    pub(crate) fn info(&self) -> ImageInfo {
        ImageInfo {
            size: self.size,
            pixel_format: self.pixel_format,
            alpha_type: self.alpha_type,
            color_space: self.color_space,
            base_density: 0,
        }
    }
}

impl Default for InitializationOptions {
    fn default() -> Self {
        InitializationOptions {
            size: Size::default(),
            pixel_format: PixelFormat::Rgba8888,
            src_pixel_format: PixelFormat::Bgra8888,
            alpha_type: AlphaType::Premul,
            color_space: ColorSpace::Srgb,
            allocator: AllocatorKind::Heap,
            editable: true,
            scale_mode: ScaleMode::FitTargetSize,
        }
    }
}

#[test]
fn rect_containment() {
    let size = Size::new(4, 3);
    assert!(Rect::new(0, 0, 4, 3).is_within(size));
    assert!(Rect::new(1, 1, 3, 2).is_within(size));
    assert!(!Rect::new(1, 1, 4, 2).is_within(size));
    assert!(!Rect::new(-1, 0, 2, 2).is_within(size));
    assert!(!Rect::new(0, 0, 0, 2).is_within(size));
    assert_eq!(Rect::of_size(size), Rect::new(0, 0, 4, 3));
}
