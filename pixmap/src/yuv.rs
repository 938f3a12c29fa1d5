//! Buffers of YUV 4:2:0 formats.
use pixmap_texel::convert::{self, bgra_to_yuv, load_yuv, store_luma, store_yuv, yuv_to_bgra};
use pixmap_texel::plane::copy_plane;
use pixmap_texel::{
    AlphaType, Chroma, ChromaOrder, ColorProfile, ColorSpace, PixelFormat, PlaneMut, PlaneRef,
    PlaneSpec, YuvPlaneLayout,
};
use tracing::{debug, warn};

use crate::image::{check_region, hardware_request};
use crate::info::{ImageInfo, InitializationOptions, Position, Rect};
use crate::memory::{AllocatorKind, BufferHandle, MemoryManager};
use crate::state::{Core, Family};
use crate::{Error, Result};

/// An image of one of the YUV 4:2:0 formats.
///
/// The planes are described by a [`YuvPlaneLayout`] which follows the hardware stride when the
/// memory comes with one.
pub struct YuvImageBuffer {
    pub(crate) core: Core,
    pub(crate) layout: YuvPlaneLayout,
}

/// A color in YUV, eight bits per channel.
///
/// Packed as `Y << 16 | U << 8 | V`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct YuvColor {
    pub y: u8,
    pub u: u8,
    pub v: u8,
}

impl YuvColor {
    pub const fn new(y: u8, u: u8, v: u8) -> Self {
        YuvColor { y, u, v }
    }

    pub const fn from_packed(packed: u32) -> Self {
        YuvColor {
            y: (packed >> 16) as u8,
            u: (packed >> 8) as u8,
            v: packed as u8,
        }
    }

    pub const fn to_packed(self) -> u32 {
        (self.y as u32) << 16 | (self.u as u32) << 8 | self.v as u32
    }
}

/// The planes of a layout in memory order.
pub(crate) fn planes(layout: &YuvPlaneLayout) -> Vec<PlaneSpec> {
    let mut planes = vec![layout.luma()];
    match layout.format.chroma_order() {
        Some(ChromaOrder::Uv | ChromaOrder::Vu) => planes.extend(layout.chroma_pairs()),
        Some(ChromaOrder::PlanarUv) => {
            planes.extend(layout.chroma_plane(Chroma::U));
            planes.extend(layout.chroma_plane(Chroma::V));
        }
        Some(ChromaOrder::PlanarVu) => {
            planes.extend(layout.chroma_plane(Chroma::V));
            planes.extend(layout.chroma_plane(Chroma::U));
        }
        None => {}
    }
    planes
}

/// Copy every plane between two layouts of the same format and size.
pub(crate) fn repack(
    src_layout: &YuvPlaneLayout,
    src: &[u8],
    dst_layout: &YuvPlaneLayout,
    dst: &mut [u8],
) -> Result<()> {
    if src_layout.format != dst_layout.format
        || src_layout.y_width != dst_layout.y_width
        || src_layout.y_height != dst_layout.y_height
    {
        return Err(Error::InvalidParameter("layouts describe different images"));
    }

    for (from, to) in planes(src_layout).into_iter().zip(planes(dst_layout)) {
        let from = PlaneRef::new(src, from)?;
        let mut to = PlaneMut::new(dst, to)?;
        copy_plane(from, &mut to)?;
    }

    Ok(())
}

impl YuvImageBuffer {
    pub(crate) fn empty(allocator: AllocatorKind, editable: bool) -> Self {
        YuvImageBuffer {
            core: Core::new(allocator, editable),
            layout: YuvPlaneLayout {
                format: PixelFormat::Unknown,
                y_width: 0,
                y_height: 0,
                y_stride: 0,
                uv_width: 0,
                uv_height: 0,
                uv_stride: 0,
                y_offset: 0,
                uv_offset: 0,
            },
        }
    }

    /// Create a zero-filled image.
    pub fn new(options: &InitializationOptions) -> Result<Self> {
        let mut image = YuvImageBuffer::empty(options.allocator, options.editable);
        let info = options.info();
        image.core.set_image_info(info, false, Family::Yuv)?;

        let handle = MemoryManager::create_like(
            options.allocator,
            image.core.byte_count() as usize,
            "pixmap-yuv",
            Some(hardware_request(&info)),
        )?;
        image.set_pixels(Some(handle))?;

        debug!(
            id = image.unique_id(),
            width = info.size.width,
            height = info.size.height,
            format = ?info.pixel_format,
            "created yuv image"
        );
        Ok(image)
    }

    /// Create an image from tightly packed planes.
    pub fn from_bytes(bytes: &[u8], options: &InitializationOptions) -> Result<Self> {
        let tight = YuvPlaneLayout::tight(options.pixel_format, options.size.width, options.size.height)?;
        if (bytes.len() as u64) < tight.total_size() {
            warn!(len = bytes.len(), needed = tight.total_size(), "yuv source too small");
            return Err(Error::InvalidParameter("source does not cover the image"));
        }

        let mut image = YuvImageBuffer::new(options)?;
        let layout = image.layout;
        repack(&tight, bytes, &layout, image.core.raw_data_mut()?)?;
        Ok(image)
    }

    /// Adopt memory that already holds planes described by `info`.
    pub fn from_parts(info: ImageInfo, handle: BufferHandle, editable: bool) -> Result<Self> {
        let mut image = YuvImageBuffer::empty(handle.allocator(), editable);
        image.core.set_image_info(info, false, Family::Yuv)?;
        image.set_pixels(Some(handle))?;
        image.data()?;
        Ok(image)
    }

    /// A deep copy, in memory of the same allocator kind.
    pub fn try_clone(&self) -> Result<Self> {
        let info = *self.info();
        let mut copy = YuvImageBuffer::empty(self.allocator(), self.core.editable);
        copy.core.set_image_info(info, false, Family::Yuv)?;
        let handle = MemoryManager::create_like(
            self.allocator(),
            self.core.byte_count() as usize,
            "pixmap-yuv-clone",
            Some(hardware_request(&info)),
        )?;
        copy.set_pixels(Some(handle))?;

        let layout = copy.layout;
        repack(&self.layout, self.data()?, &layout, copy.core.raw_data_mut()?)?;
        copy.core.color_profile = self.core.color_profile;
        Ok(copy)
    }

    fn refresh_layout(&mut self) -> Result<()> {
        let info = self.core.info;
        self.layout = if self.core.row_stride == self.core.row_data_size {
            YuvPlaneLayout::tight(info.pixel_format, info.size.width, info.size.height)?
        } else {
            YuvPlaneLayout::with_luma_stride(
                info.pixel_format,
                info.size.width,
                info.size.height,
                self.core.row_stride,
            )?
        };
        Ok(())
    }

    /// Validate and adopt a new description.
    pub fn set_image_info(&mut self, info: ImageInfo, reuse: bool) -> Result<()> {
        self.core.set_image_info(info, reuse, Family::Yuv)?;
        self.refresh_layout()
    }

    /// Replace the memory of the image, releasing the previous memory first.
    pub fn set_pixels(&mut self, handle: Option<BufferHandle>) -> Result<()> {
        self.core.set_pixels(handle);
        self.refresh_layout()
    }

    /// Release the memory now, leaving an image without pixels.
    pub fn release(&mut self) {
        self.core.set_pixels(None);
    }

    /// The memory, checked to span every plane.
    pub(crate) fn data(&self) -> Result<&[u8]> {
        let data = self.core.data()?;
        if (data.len() as u64) < self.layout.total_size() {
            return Err(Error::DataAbnormal("memory does not span the planes"));
        }
        Ok(data)
    }

    fn data_mut(&mut self) -> Result<&mut [u8]> {
        let needed = self.layout.total_size();
        let data = self.core.data_mut()?;
        if (data.len() as u64) < needed {
            return Err(Error::DataAbnormal("memory does not span the planes"));
        }
        Ok(data)
    }

    pub fn plane_layout(&self) -> &YuvPlaneLayout {
        &self.layout
    }

    pub fn info(&self) -> &ImageInfo {
        &self.core.info
    }

    pub fn width(&self) -> u32 {
        self.core.info.size.width
    }

    pub fn height(&self) -> u32 {
        self.core.info.size.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.core.info.pixel_format
    }

    pub fn alpha_type(&self) -> AlphaType {
        self.core.info.alpha_type
    }

    pub fn color_space(&self) -> ColorSpace {
        self.core.info.color_space
    }

    pub fn base_density(&self) -> i32 {
        self.core.info.base_density
    }

    pub fn set_base_density(&mut self, density: i32) {
        self.core.info.base_density = density;
    }

    /// Bytes from one luma row to the next.
    pub fn row_stride(&self) -> u32 {
        self.core.row_stride
    }

    pub fn row_data_size(&self) -> u32 {
        self.core.row_data_size
    }

    /// The bytes of all planes without padding.
    pub fn byte_count(&self) -> u64 {
        self.core.byte_count()
    }

    pub fn allocation_byte_count(&self) -> usize {
        self.core.handle().map_or(0, BufferHandle::size)
    }

    pub fn allocator(&self) -> AllocatorKind {
        self.core.allocator
    }

    pub fn handle(&self) -> Option<&BufferHandle> {
        self.core.handle()
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        self.core.data().ok()
    }

    pub fn is_editable(&self) -> bool {
        self.core.editable
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.core.editable = editable;
    }

    pub fn unique_id(&self) -> u32 {
        self.core.unique_id()
    }

    pub fn is_transformed(&self) -> bool {
        self.core.is_transformed()
    }

    pub fn set_transformed(&self, transformed: bool) {
        self.core.set_transformed(transformed)
    }

    pub fn color_profile(&self) -> Option<&ColorProfile> {
        self.core.color_profile.as_ref()
    }

    /// Tag the pixels with another color space, without converting them.
    pub fn set_color_profile(&mut self, space: ColorSpace) {
        self.core.info.color_space = space;
        self.core.color_profile = space.profile();
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    /// The color at `(x, y)`, 10-bit samples reduced to their top eight bits.
    pub fn get_yuv_pixel(&self, x: i32, y: i32) -> Option<YuvColor> {
        if !self.contains(x, y) {
            return None;
        }

        let (y_, u, v) = load_yuv(&self.layout, self.data().ok()?, x as u32, y as u32);
        Some(YuvColor::new(y_, u, v))
    }

    /// Write one color, which also sets the chroma of the surrounding 2x2 block.
    pub fn write_yuv_pixel(&mut self, pos: Position, color: YuvColor) -> Result<()> {
        if !self.contains(pos.x, pos.y) {
            return Err(Error::InvalidParameter("position outside the image"));
        }

        let layout = self.layout;
        let data = self.data_mut()?;
        store_yuv(&layout, data, pos.x as u32, pos.y as u32, (color.y, color.u, color.v));
        Ok(())
    }

    /// Set every pixel to one color.
    pub fn fill_yuv(&mut self, color: YuvColor) -> Result<()> {
        let layout = self.layout;
        let data = self.data_mut()?;
        fill_planes(&layout, data, color);
        Ok(())
    }

    /// The color at `(x, y)` as `0xAARRGGBB`.
    pub fn get_argb32_color(&self, x: i32, y: i32) -> Option<u32> {
        let YuvColor { y, u, v } = self.get_yuv_pixel(x, y)?;
        let [b, g, r, a] = yuv_to_bgra(y, u, v);
        Some(u32::from_be_bytes([a, r, g, b]))
    }

    /// The color at `pos`, as the `u32` whose little endian bytes are B, G, R, A.
    pub fn read_pixel(&self, pos: Position) -> Result<u32> {
        let color = self
            .get_yuv_pixel(pos.x, pos.y)
            .ok_or(Error::InvalidParameter("position outside the image"))?;
        Ok(u32::from_le_bytes(yuv_to_bgra(color.y, color.u, color.v)))
    }

    /// Write one color given like the result of [`YuvImageBuffer::read_pixel`].
    pub fn write_pixel(&mut self, pos: Position, color: u32) -> Result<()> {
        let (y, u, v) = bgra_to_yuv(color.to_le_bytes());
        self.write_yuv_pixel(pos, YuvColor::new(y, u, v))
    }

    /// Copy all planes, without padding, into `dst`.
    pub fn read_pixels(&self, dst: &mut [u8]) -> Result<()> {
        let tight = YuvPlaneLayout::tight(self.pixel_format(), self.width(), self.height())?;
        if (dst.len() as u64) < tight.total_size() {
            return Err(Error::InvalidParameter("destination too small"));
        }
        repack(&self.layout, self.data()?, &tight, dst)
    }

    /// Overwrite all planes from tightly packed `src`.
    pub fn write_pixels(&mut self, src: &[u8]) -> Result<()> {
        let tight = YuvPlaneLayout::tight(self.pixel_format(), self.width(), self.height())?;
        if (src.len() as u64) < tight.total_size() {
            return Err(Error::InvalidParameter("source too small"));
        }
        let layout = self.layout;
        repack(&tight, src, &layout, self.data_mut()?)
    }

    /// Read a rectangle as BGRA 8888 into `dst`, rows `stride` bytes apart from `offset`.
    pub fn read_pixels_region(&self, dst: &mut [u8], offset: usize, stride: u32, region: Rect) -> Result<()> {
        check_region(self.info().size, dst.len(), offset, stride, region)?;
        let data = self.data()?;
        for row in 0..region.height as usize {
            let out = &mut dst[offset + row * stride as usize..][..region.width as usize * 4];
            let y = (region.top as usize + row) as u32;
            for (col, target) in out.chunks_exact_mut(4).enumerate() {
                let x = (region.left as usize + col) as u32;
                let (y_, u, v) = load_yuv(&self.layout, data, x, y);
                target.copy_from_slice(&yuv_to_bgra(y_, u, v));
            }
        }
        Ok(())
    }

    /// Write a rectangle from BGRA 8888 data in `src`, rows `stride` bytes apart from `offset`.
    pub fn write_pixels_region(&mut self, src: &[u8], offset: usize, stride: u32, region: Rect) -> Result<()> {
        check_region(self.info().size, src.len(), offset, stride, region)?;
        let layout = self.layout;
        let data = self.data_mut()?;
        for row in 0..region.height as usize {
            let input = &src[offset + row * stride as usize..][..region.width as usize * 4];
            let y = (region.top as usize + row) as u32;
            for (col, bgra) in input.chunks_exact(4).enumerate() {
                let x = (region.left as usize + col) as u32;
                let yuv = bgra_to_yuv([bgra[0], bgra[1], bgra[2], bgra[3]]);
                store_yuv(&layout, data, x, y, yuv);
            }
        }
        Ok(())
    }

    /// Compare geometry, format and the bytes of every plane.
    pub fn is_same_image(&self, other: &YuvImageBuffer) -> bool {
        if self.info().size != other.info().size || self.pixel_format() != other.pixel_format() {
            return false;
        }

        let (Ok(ours), Ok(theirs)) = (self.data(), other.data()) else {
            return false;
        };

        planes(&self.layout)
            .into_iter()
            .zip(planes(&other.layout))
            .all(|(a, b)| match (PlaneRef::new(ours, a), PlaneRef::new(theirs, b)) {
                (Ok(a), Ok(b)) => a.rows().eq(b.rows()),
                _ => false,
            })
    }
}

/// Set every pixel of the planes to one color.
pub(crate) fn fill_planes(layout: &YuvPlaneLayout, data: &mut [u8], color: YuvColor) {
    for y in 0..layout.y_height {
        for x in 0..layout.y_width {
            if x % 2 == 0 && y % 2 == 0 {
                store_yuv(layout, data, x, y, (color.y, color.u, color.v));
            } else {
                store_luma(layout, data, x, y, color.y);
            }
        }
    }
}

/// Decode every pixel of the planes into BGRA rows of `width * 4` bytes.
pub(crate) fn planes_to_bgra(layout: &YuvPlaneLayout, data: &[u8]) -> Vec<u8> {
    let mut bgra = Vec::with_capacity(layout.y_width as usize * layout.y_height as usize * 4);
    for y in 0..layout.y_height {
        for x in 0..layout.y_width {
            let (y_, u, v) = load_yuv(layout, data, x, y);
            bgra.extend_from_slice(&convert::yuv_to_bgra(y_, u, v));
        }
    }
    bgra
}

/// Encode BGRA rows into the planes, chroma taken from the top left pixel of each block.
pub(crate) fn bgra_to_planes(layout: &YuvPlaneLayout, bgra: &[u8], data: &mut [u8]) {
    let width = layout.y_width as usize;
    for y in 0..layout.y_height {
        for x in 0..layout.y_width {
            let at = (y as usize * width + x as usize) * 4;
            let pixel = [bgra[at], bgra[at + 1], bgra[at + 2], bgra[at + 3]];
            let yuv = convert::bgra_to_yuv(pixel);
            if x % 2 == 0 && y % 2 == 0 {
                store_yuv(layout, data, x, y, yuv);
            } else {
                store_luma(layout, data, x, y, yuv.0);
            }
        }
    }
}

impl core::fmt::Debug for YuvImageBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("YuvImageBuffer")
            .field("info", self.info())
            .field("layout", &self.layout)
            .field("allocator", &self.allocator())
            .field("editable", &self.is_editable())
            .finish()
    }
}
