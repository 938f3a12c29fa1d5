// Distributed under The MIT License (MIT)
//
// Copyright (c) 2019, 2020 The `image-rs` developers
//! The closed set of pixel formats and the rules mapping them to memory.
//!
//! All computations are checked. A geometry whose row or total size does not fit the integer
//! types used on the wire is reported as a [`LayoutError`] instead of wrapping around.
use core::fmt;

/// A pixel format, with the numbering used on the wire.
///
/// The `Unknown` value exists so that raw values from untrusted sources have somewhere to go.
/// It is never a valid format for a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum PixelFormat {
    #[default]
    Unknown = 0,
    Argb8888 = 1,
    Rgb565 = 2,
    Rgba8888 = 3,
    Bgra8888 = 4,
    Rgb888 = 5,
    Alpha8 = 6,
    RgbaF16 = 7,
    Nv21 = 8,
    Nv12 = 9,
    Cmyk = 10,
    YcbcrP010 = 11,
    YcrcbP010 = 12,
    Astc4x4 = 102,
    Astc6x6 = 103,
    Astc8x8 = 104,
    Yu12 = 105,
    Yv12 = 106,
}

/// How the alpha channel relates to the color channels, with the numbering used on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum AlphaType {
    #[default]
    Unknown = 0,
    /// No alpha, or alpha is always fully opaque.
    Opaque = 1,
    /// Color channels are premultiplied with alpha.
    Premul = 2,
    Unpremul = 3,
}

impl AlphaType {
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => AlphaType::Unknown,
            1 => AlphaType::Opaque,
            2 => AlphaType::Premul,
            3 => AlphaType::Unpremul,
            _ => return None,
        })
    }

    pub const fn to_raw(self) -> i32 {
        self as i32
    }
}

/// The two families of pixel formats, which need different buffer types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatFamily {
    /// Packed formats where every pixel occupies `bytes_per_pixel` consecutive bytes.
    Packed,
    /// Block compressed formats, rows are rounded to the block granularity.
    Astc,
    /// Planar and semi-planar YUV with 4:2:0 chroma subsampling.
    Yuv420,
}

/// How chroma is stored in a YUV 4:2:0 format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChromaOrder {
    /// One interleaved plane, U before V (NV12, P010 CbCr).
    Uv,
    /// One interleaved plane, V before U (NV21, P010 CrCb).
    Vu,
    /// Two planes, U plane first (I420 / YU12).
    PlanarUv,
    /// Two planes, V plane first (YV12).
    PlanarVu,
}

/// The per-pixel decode table of a packed format.
///
/// Offsets index the bytes of one pixel. `None` means the channel is absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelDecode {
    /// Four 8-bit channels at the given byte offsets.
    Bytes {
        red: Option<u8>,
        green: Option<u8>,
        blue: Option<u8>,
        alpha: Option<u8>,
    },
    /// 5-6-5 bit packed, native endian `u16` with red in the high bits.
    Rgb565,
    /// Four half floats in the order red, green, blue, alpha.
    HalfFloat,
}

/// The format has no per-pixel color decode table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnsupportedFormat {
    format: PixelFormat,
}

/// An error computing the memory layout of a geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutError {
    kind: LayoutErrorKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LayoutErrorKind {
    UnknownFormat,
    EmptyGeometry,
    Overflow,
}

impl PixelFormat {
    /// All formats that a buffer can be created with.
    pub const ALL: [PixelFormat; 17] = [
        PixelFormat::Argb8888,
        PixelFormat::Rgb565,
        PixelFormat::Rgba8888,
        PixelFormat::Bgra8888,
        PixelFormat::Rgb888,
        PixelFormat::Alpha8,
        PixelFormat::RgbaF16,
        PixelFormat::Nv21,
        PixelFormat::Nv12,
        PixelFormat::Cmyk,
        PixelFormat::YcbcrP010,
        PixelFormat::YcrcbP010,
        PixelFormat::Astc4x4,
        PixelFormat::Astc6x6,
        PixelFormat::Astc8x8,
        PixelFormat::Yu12,
        PixelFormat::Yv12,
    ];

    /// Interpret a raw wire value.
    ///
    /// Values outside the closed set yield `None`, the raw value `0` yields `Unknown`.
    pub fn from_raw(raw: i32) -> Option<Self> {
        if raw == 0 {
            return Some(PixelFormat::Unknown);
        }

        PixelFormat::ALL.into_iter().find(|format| format.to_raw() == raw)
    }

    pub const fn to_raw(self) -> i32 {
        self as i32
    }

    pub fn family(self) -> Option<FormatFamily> {
        use PixelFormat::*;
        Some(match self {
            Unknown => return None,
            Argb8888 | Rgb565 | Rgba8888 | Bgra8888 | Rgb888 | Alpha8 | RgbaF16 | Cmyk => {
                FormatFamily::Packed
            }
            Astc4x4 | Astc6x6 | Astc8x8 => FormatFamily::Astc,
            Nv21 | Nv12 | YcbcrP010 | YcrcbP010 | Yu12 | Yv12 => FormatFamily::Yuv420,
        })
    }

    pub fn is_yuv(self) -> bool {
        self.family() == Some(FormatFamily::Yuv420)
    }

    pub fn is_astc(self) -> bool {
        self.family() == Some(FormatFamily::Astc)
    }

    /// If this is a 10-bit format stored in 16-bit samples.
    pub fn is_high_bit_depth(self) -> bool {
        matches!(self, PixelFormat::YcbcrP010 | PixelFormat::YcrcbP010)
    }

    /// The chroma arrangement of a YUV format.
    pub fn chroma_order(self) -> Option<ChromaOrder> {
        use PixelFormat::*;
        Some(match self {
            Nv12 | YcbcrP010 => ChromaOrder::Uv,
            Nv21 | YcrcbP010 => ChromaOrder::Vu,
            Yu12 => ChromaOrder::PlanarUv,
            Yv12 => ChromaOrder::PlanarVu,
            _ => return None,
        })
    }

    /// The horizontal and vertical granularity of a block compressed format.
    pub fn block_size(self) -> Option<u32> {
        match self {
            PixelFormat::Astc4x4 => Some(4),
            PixelFormat::Astc6x6 => Some(6),
            PixelFormat::Astc8x8 => Some(8),
            _ => None,
        }
    }

    /// The number of bytes of one pixel.
    ///
    /// For YUV formats this is the size of one luma sample. For ASTC formats this is a nominal
    /// value, the block cost is accounted for by rounding rows to the block granularity.
    pub fn bytes_per_pixel(self) -> Option<u8> {
        use PixelFormat::*;
        Some(match self {
            Unknown => return None,
            Argb8888 | Rgba8888 | Bgra8888 | Cmyk => 4,
            Rgb565 => 2,
            Rgb888 => 3,
            Alpha8 => 1,
            RgbaF16 => 8,
            Astc4x4 | Astc6x6 | Astc8x8 => 1,
            Nv21 | Nv12 | Yu12 | Yv12 => 1,
            YcbcrP010 | YcrcbP010 => 2,
        })
    }

    /// The per-pixel decode table, used by color accessors and conversion.
    pub fn channel_decode(self) -> Result<ChannelDecode, UnsupportedFormat> {
        let bytes = |red, green, blue, alpha| ChannelDecode::Bytes {
            red,
            green,
            blue,
            alpha,
        };

        Ok(match self {
            PixelFormat::Argb8888 => bytes(Some(1), Some(2), Some(3), Some(0)),
            PixelFormat::Rgba8888 => bytes(Some(0), Some(1), Some(2), Some(3)),
            PixelFormat::Bgra8888 => bytes(Some(2), Some(1), Some(0), Some(3)),
            PixelFormat::Rgb888 => bytes(Some(0), Some(1), Some(2), None),
            PixelFormat::Alpha8 => bytes(None, None, None, Some(0)),
            PixelFormat::Rgb565 => ChannelDecode::Rgb565,
            PixelFormat::RgbaF16 => ChannelDecode::HalfFloat,
            format => return Err(UnsupportedFormat { format }),
        })
    }

    /// The byte index of the alpha channel within one pixel, for alpha manipulation.
    pub fn alpha_index(self) -> Option<usize> {
        match self {
            PixelFormat::Argb8888 | PixelFormat::Alpha8 => Some(0),
            PixelFormat::Rgba8888 | PixelFormat::Bgra8888 => Some(3),
            PixelFormat::RgbaF16 => Some(6),
            _ => None,
        }
    }

    /// The bytes of meaningful data in one row, without any hardware padding.
    pub fn stride_for(self, width: u32) -> Result<u32, LayoutError> {
        let bpp = u64::from(self.bytes_per_pixel().ok_or(LayoutError::UNKNOWN_FORMAT)?);
        let width = u64::from(width);

        let row = match self {
            PixelFormat::Alpha8 => bpp * round_up(width, 4),
            _ => match self.block_size() {
                Some(block) => bpp * round_up(width, u64::from(block)),
                None => bpp * width,
            },
        };

        u32::try_from(row).map_err(|_| LayoutError::OVERFLOW)
    }

    /// The total number of bytes of a tightly packed buffer.
    pub fn size_for(self, width: u32, height: u32) -> Result<u64, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::EMPTY);
        }

        let stride = u64::from(self.stride_for(width)?);
        let height = u64::from(height);

        let size = match self.family() {
            None => return Err(LayoutError::UNKNOWN_FORMAT),
            Some(FormatFamily::Packed) => stride.checked_mul(height),
            Some(FormatFamily::Astc) => {
                let block = u64::from(self.block_size().unwrap_or(1));
                stride.checked_mul(round_up(height, block))
            }
            Some(FormatFamily::Yuv420) => {
                let sample = u64::from(self.bytes_per_pixel().unwrap_or(1));
                let width = u64::from(width);
                let luma = width.checked_mul(height);
                let chroma = half(width).checked_mul(half(height)).and_then(|c| c.checked_mul(2));
                luma.zip(chroma)
                    .and_then(|(l, c)| l.checked_add(c))
                    .and_then(|n| n.checked_mul(sample))
            }
        };

        size.ok_or(LayoutError::OVERFLOW)
    }
}

impl TryFrom<i32> for PixelFormat {
    type Error = LayoutError;

    fn try_from(raw: i32) -> Result<Self, LayoutError> {
        PixelFormat::from_raw(raw).ok_or(LayoutError::UNKNOWN_FORMAT)
    }
}

/// Half of a dimension, rounding up, as used for every chroma plane.
pub const fn half(n: u64) -> u64 {
    (n + 1) / 2
}

/// Round `n` up to a multiple of `to`.
pub const fn round_up(n: u64, to: u64) -> u64 {
    n.div_ceil(to) * to
}

impl UnsupportedFormat {
    pub fn format(&self) -> PixelFormat {
        self.format
    }
}

impl LayoutError {
    pub(crate) const UNKNOWN_FORMAT: Self = LayoutError {
        kind: LayoutErrorKind::UnknownFormat,
    };

    pub(crate) const EMPTY: Self = LayoutError {
        kind: LayoutErrorKind::EmptyGeometry,
    };

    pub(crate) const OVERFLOW: Self = LayoutError {
        kind: LayoutErrorKind::Overflow,
    };

    /// The format was not part of the closed set.
    pub fn is_unknown_format(&self) -> bool {
        self.kind == LayoutErrorKind::UnknownFormat
    }

    /// A dimension was zero.
    pub fn is_empty_geometry(&self) -> bool {
        self.kind == LayoutErrorKind::EmptyGeometry
    }

    /// The size does not fit the integer types of the buffer model.
    pub fn is_overflow(&self) -> bool {
        self.kind == LayoutErrorKind::Overflow
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LayoutErrorKind::UnknownFormat => f.write_str("unknown pixel format"),
            LayoutErrorKind::EmptyGeometry => f.write_str("width and height must be non-zero"),
            LayoutErrorKind::Overflow => f.write_str("layout size overflows"),
        }
    }
}

impl fmt::Display for UnsupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} has no per-pixel decode table", self.format)
    }
}

#[test]
fn raw_values_round_trip() {
    for format in PixelFormat::ALL {
        assert_eq!(PixelFormat::from_raw(format.to_raw()), Some(format));
    }

    assert_eq!(PixelFormat::from_raw(0), Some(PixelFormat::Unknown));
    assert_eq!(PixelFormat::from_raw(13), None);
    assert_eq!(PixelFormat::from_raw(-1), None);
}

#[test]
fn packed_strides() {
    assert_eq!(PixelFormat::Rgba8888.stride_for(7), Ok(28));
    assert_eq!(PixelFormat::Rgb888.stride_for(7), Ok(21));
    assert_eq!(PixelFormat::Rgb565.stride_for(7), Ok(14));
    assert_eq!(PixelFormat::RgbaF16.stride_for(7), Ok(56));
    // Alpha rows are padded to four bytes.
    assert_eq!(PixelFormat::Alpha8.stride_for(5), Ok(8));
    assert_eq!(PixelFormat::Alpha8.stride_for(8), Ok(8));
    assert_eq!(PixelFormat::Astc6x6.stride_for(7), Ok(12));
    assert!(PixelFormat::Unknown.stride_for(7).is_err());
}
