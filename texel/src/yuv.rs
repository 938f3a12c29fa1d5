//! Plane bookkeeping of YUV 4:2:0 buffers.
use crate::format::{half, ChromaOrder, LayoutError, PixelFormat};
use crate::stride::PlaneSpec;

/// Where the planes of a YUV 4:2:0 buffer live.
///
/// Strides and offsets are in bytes. For semi-planar formats `uv_width` counts chroma *pairs*
/// per row, for planar formats it counts the samples of each of the two chroma planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct YuvPlaneLayout {
    pub format: PixelFormat,
    pub y_width: u32,
    pub y_height: u32,
    pub y_stride: u32,
    pub uv_width: u32,
    pub uv_height: u32,
    pub uv_stride: u32,
    pub y_offset: u32,
    pub uv_offset: u32,
}

/// One of the two chroma channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Chroma {
    U,
    V,
}

impl YuvPlaneLayout {
    /// The tightly packed layout of a format.
    pub fn tight(format: PixelFormat, width: u32, height: u32) -> Result<Self, LayoutError> {
        let sample = Self::sample_of(format)?;
        let y_stride = width.checked_mul(sample).ok_or(LayoutError::OVERFLOW)?;
        Self::with_luma_stride(format, width, height, y_stride)
    }

    /// A layout where the luma rows are padded to `y_stride` bytes.
    ///
    /// Semi-planar chroma shares the luma stride, planar chroma planes use half of it. This is
    /// how padded hardware buffers lay out their planes.
    pub fn with_luma_stride(
        format: PixelFormat,
        width: u32,
        height: u32,
        y_stride: u32,
    ) -> Result<Self, LayoutError> {
        if width == 0 || height == 0 {
            return Err(LayoutError::EMPTY);
        }

        let sample = Self::sample_of(format)?;
        let order = format.chroma_order().ok_or(LayoutError::UNKNOWN_FORMAT)?;
        let uv_width = half(width.into()) as u32;
        let uv_height = half(height.into()) as u32;

        let min_luma = u64::from(width) * u64::from(sample);
        if u64::from(y_stride) < min_luma {
            return Err(LayoutError::OVERFLOW);
        }

        let tight = y_stride as u64 == min_luma;
        let uv_stride = match order {
            ChromaOrder::Uv | ChromaOrder::Vu if tight => 2 * uv_width * sample,
            ChromaOrder::Uv | ChromaOrder::Vu => y_stride.max(2 * uv_width * sample),
            ChromaOrder::PlanarUv | ChromaOrder::PlanarVu if tight => uv_width * sample,
            ChromaOrder::PlanarUv | ChromaOrder::PlanarVu => {
                y_stride.div_ceil(2).max(uv_width * sample)
            }
        };

        let uv_offset = u64::from(y_stride) * u64::from(height);
        let layout = YuvPlaneLayout {
            format,
            y_width: width,
            y_height: height,
            y_stride,
            uv_width,
            uv_height,
            uv_stride,
            y_offset: 0,
            uv_offset: u32::try_from(uv_offset).map_err(|_| LayoutError::OVERFLOW)?,
        };

        // Validates that the whole buffer is addressable.
        u32::try_from(layout.total_size()).map_err(|_| LayoutError::OVERFLOW)?;
        Ok(layout)
    }

    fn sample_of(format: PixelFormat) -> Result<u32, LayoutError> {
        if !format.is_yuv() {
            return Err(LayoutError::UNKNOWN_FORMAT);
        }

        format
            .bytes_per_pixel()
            .map(u32::from)
            .ok_or(LayoutError::UNKNOWN_FORMAT)
    }

    /// Bytes of one sample, 2 for the 10-bit formats.
    pub fn sample_bytes(&self) -> usize {
        if self.format.is_high_bit_depth() {
            2
        } else {
            1
        }
    }

    pub fn is_semi_planar(&self) -> bool {
        matches!(
            self.format.chroma_order(),
            Some(ChromaOrder::Uv | ChromaOrder::Vu)
        )
    }

    fn chroma_plane_size(&self) -> u64 {
        u64::from(self.uv_stride) * u64::from(self.uv_height)
    }

    /// The number of bytes spanned by all planes.
    pub fn total_size(&self) -> u64 {
        let planes = if self.is_semi_planar() { 1 } else { 2 };
        u64::from(self.uv_offset) + planes * self.chroma_plane_size()
    }

    /// If rows carry no padding, so the layout equals the tight formula.
    pub fn is_tight(&self) -> bool {
        matches!(YuvPlaneLayout::tight(self.format, self.y_width, self.y_height), Ok(tight) if tight == *self)
    }

    pub fn luma(&self) -> PlaneSpec {
        PlaneSpec {
            width: self.y_width as usize,
            height: self.y_height as usize,
            element: self.sample_bytes(),
            stride: self.y_stride as usize,
            offset: self.y_offset as usize,
        }
    }

    /// The interleaved chroma plane of a semi-planar format, one element per pair.
    pub fn chroma_pairs(&self) -> Option<PlaneSpec> {
        if !self.is_semi_planar() {
            return None;
        }

        Some(PlaneSpec {
            width: self.uv_width as usize,
            height: self.uv_height as usize,
            element: 2 * self.sample_bytes(),
            stride: self.uv_stride as usize,
            offset: self.uv_offset as usize,
        })
    }

    /// One chroma plane of a planar format.
    pub fn chroma_plane(&self, which: Chroma) -> Option<PlaneSpec> {
        let first = match (self.format.chroma_order()?, which) {
            (ChromaOrder::PlanarUv, Chroma::U) | (ChromaOrder::PlanarVu, Chroma::V) => true,
            (ChromaOrder::PlanarUv, Chroma::V) | (ChromaOrder::PlanarVu, Chroma::U) => false,
            _ => return None,
        };

        let offset = if first {
            u64::from(self.uv_offset)
        } else {
            u64::from(self.uv_offset) + self.chroma_plane_size()
        };

        Some(PlaneSpec {
            width: self.uv_width as usize,
            height: self.uv_height as usize,
            element: self.sample_bytes(),
            stride: self.uv_stride as usize,
            offset: offset as usize,
        })
    }

    /// Byte offsets of the U and V sample belonging to the pixel at `(x, y)`.
    pub fn chroma_offsets(&self, x: u32, y: u32) -> (usize, usize) {
        let cx = (x / 2) as usize;
        let cy = (y / 2) as usize;
        let sample = self.sample_bytes();

        match self.format.chroma_order() {
            Some(ChromaOrder::Uv) | Some(ChromaOrder::Vu) => {
                let pair = self.uv_offset as usize + cy * self.uv_stride as usize + cx * 2 * sample;
                if self.format.chroma_order() == Some(ChromaOrder::Uv) {
                    (pair, pair + sample)
                } else {
                    (pair + sample, pair)
                }
            }
            _ => {
                let at = |spec: Option<PlaneSpec>| {
                    spec.map_or(0, |spec| spec.offset + cy * spec.stride + cx * sample)
                };
                (
                    at(self.chroma_plane(Chroma::U)),
                    at(self.chroma_plane(Chroma::V)),
                )
            }
        }
    }

    /// Byte offset of the luma sample at `(x, y)`.
    pub fn luma_offset(&self, x: u32, y: u32) -> usize {
        self.y_offset as usize + y as usize * self.y_stride as usize + x as usize * self.sample_bytes()
    }
}

#[test]
fn odd_planes() {
    let layout = YuvPlaneLayout::tight(PixelFormat::Nv12, 7, 5).unwrap();
    assert_eq!(layout.uv_width, 4);
    assert_eq!(layout.uv_height, 3);
    assert_eq!(layout.uv_stride, 8);
    assert_eq!(layout.uv_offset, 35);
    assert_eq!(layout.total_size(), 35 + 24);
    assert_eq!(
        layout.total_size(),
        PixelFormat::Nv12.size_for(7, 5).unwrap()
    );

    let layout = YuvPlaneLayout::tight(PixelFormat::Yv12, 7, 5).unwrap();
    assert_eq!(layout.uv_stride, 4);
    let v = layout.chroma_plane(Chroma::V).unwrap();
    let u = layout.chroma_plane(Chroma::U).unwrap();
    assert_eq!(v.offset, 35);
    assert_eq!(u.offset, 35 + 12);
    assert_eq!(layout.total_size(), PixelFormat::Yv12.size_for(7, 5).unwrap());
}

#[test]
fn p010_samples() {
    let layout = YuvPlaneLayout::tight(PixelFormat::YcbcrP010, 3, 3).unwrap();
    assert_eq!(layout.y_stride, 6);
    assert_eq!(layout.uv_stride, 8);
    assert_eq!(
        layout.total_size(),
        PixelFormat::YcbcrP010.size_for(3, 3).unwrap()
    );
}
