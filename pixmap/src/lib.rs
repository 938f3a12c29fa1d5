//! Image buffers over heap, shared, hardware and custom memory.
//!
//! An image owns exactly one piece of backing memory, described by an [`ImageInfo`]. Packed
//! formats live in an [`ImageBuffer`], the YUV 4:2:0 formats in a [`YuvImageBuffer`] which
//! additionally tracks where each plane starts. Both can be transformed through
//! [`PixelTransformable`] and serialized as a [`Parcel`] or as a TLV record.
//!
//! # Usage
//!
//! ```
//! use pixmap::{ImageBuffer, InitializationOptions, PixelFormat, PixelTransformable, Position, Size};
//!
//! let options = InitializationOptions::new(Size::new(64, 48), PixelFormat::Bgra8888);
//! let mut image = ImageBuffer::new(&options)?;
//! image.write_pixel(Position::new(0, 0), 0xff00_00ff)?;
//!
//! image.rotate(90.0)?;
//! assert_eq!((image.width(), image.height()), (48, 64));
//! assert_eq!(image.read_pixel(Position::new(47, 0))?, 0xff00_00ff);
//! # Ok::<(), pixmap::Error>(())
//! ```
//!
//! Parcels carry shared memory and hardware buffers by reference:
//!
//! ```
//! use pixmap::{AllocatorKind, AnyImageBuffer, ImageBuffer, InitializationOptions, Parcel, Size};
//!
//! let options = InitializationOptions {
//!     size: Size::new(16, 16),
//!     allocator: AllocatorKind::HardwareBuffer,
//!     ..InitializationOptions::default()
//! };
//! let image = ImageBuffer::new(&options)?;
//!
//! let mut parcel = Parcel::new();
//! image.marshal(&mut parcel)?;
//! let copy = AnyImageBuffer::unmarshal(&mut parcel)?;
//! assert_eq!(image.handle().and_then(|h| h.hardware_buffer()).map(|b| b.ref_count()), Some(2));
//! # drop(copy);
//! # Ok::<(), pixmap::Error>(())
//! ```
// Unsafe code is confined to the memory back-ends.
#![deny(unsafe_code)]

mod error;
mod image;
mod info;
#[allow(unsafe_code)]
pub mod memory;
mod state;
mod transform;
mod wire;
mod yuv;

#[cfg(test)]
mod tests;

pub use pixmap_texel::{AlphaType, ColorProfile, ColorSpace, PixelFormat, YuvPlaneLayout};

pub use self::error::{Error, Result};
pub use self::image::{AnyImageBuffer, ImageBuffer};
pub use self::info::{ImageInfo, InitializationOptions, Position, Rect, ScaleMode, Size};
pub use self::memory::{
    AllocatorKind, BufferHandle, CustomMemory, HardwareBuffer, MemoryManager, SharedMemory,
    MAX_RAM_SIZE,
};
pub use self::state::MAX_DIMENSION;
pub use self::transform::{
    AntiAliasing, Filter, PixelTransformable, ANTI_ALIASING_SIZE, UV_DEFAULT, Y_DEFAULT,
};
pub use self::wire::{Parcel, Tag, MAX_IMAGEDATA_SIZE, MIN_IMAGEDATA_SIZE};
pub use self::yuv::{YuvColor, YuvImageBuffer};
