// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
//! # Pixmap texel
//!
//! The memory model and pure pixel algorithms behind `pixmap` image buffers.
//!
//! This library is strictly `no_std`. It knows nothing about where memory comes from, it only
//! answers how a given pixel format maps onto bytes and how to move those bytes around:
//!
//! - [`PixelFormat`] computes row strides and buffer sizes, for packed, block compressed and
//!   YUV 4:2:0 formats alike.
//! - [`YuvPlaneLayout`] locates the luma and chroma planes within a YUV buffer, padded or not.
//! - [`PlaneRef`] and [`PlaneMut`] are validated, strided views of a single plane on which all
//!   of the [`plane`] algorithms operate.
//! - [`resample`], [`affine`] and [`convert`] scale, rotate and re-encode pixels.
//! - [`color`] converts between the named color spaces of a buffer.
//!
//! ## Usage
//!
//! ```
//! use pixmap_texel::{PixelFormat, YuvPlaneLayout};
//!
//! // Odd dimensions round the chroma planes up.
//! let layout = YuvPlaneLayout::tight(PixelFormat::Nv12, 7, 5).unwrap();
//! assert_eq!((layout.uv_width, layout.uv_height), (4, 3));
//! assert_eq!(layout.total_size(), PixelFormat::Nv12.size_for(7, 5).unwrap());
//! ```
// Be std for doctests, avoids a weird warning about missing allocator.
#![cfg_attr(not(doctest), no_std)]
#![deny(unsafe_code)]
extern crate alloc;

pub mod affine;
pub mod color;
mod color_matrix;
pub mod convert;
mod format;
pub mod plane;
pub mod resample;
mod stride;
mod yuv;

pub use self::color::{ColorConversion, ColorProfile, ColorSpace};
pub use self::format::{
    half, round_up, AlphaType, ChannelDecode, ChromaOrder, FormatFamily, LayoutError, PixelFormat,
    UnsupportedFormat,
};
pub use self::plane::PlaneMismatch;
pub use self::resample::Filter;
pub use self::stride::{BadStrideError, PlaneMut, PlaneRef, PlaneSpec};
pub use self::yuv::{Chroma, YuvPlaneLayout};

#[cfg(test)]
mod tests;
