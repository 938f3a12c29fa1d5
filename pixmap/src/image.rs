//! Buffers of packed pixel formats.
use pixmap_texel::convert::{self, decode_bgra, encode_bgra};
use pixmap_texel::{
    AlphaType, ColorProfile, ColorSpace, FormatFamily, PixelFormat, PlaneMut, PlaneRef,
};
use tracing::{debug, warn};

use crate::info::{ImageInfo, InitializationOptions, Position, Rect, Size};
use crate::memory::{AllocatorKind, BufferHandle, HardwareRequest, MemoryManager};
use crate::state::{Core, Family, MAX_DIMENSION};
use crate::yuv::YuvImageBuffer;
use crate::{Error, Result};

/// An image of a packed or block compressed pixel format.
///
/// The image owns its memory. Rows are `row_stride` bytes apart, of which the first
/// `row_data_size` bytes are pixel data.
pub struct ImageBuffer {
    pub(crate) core: Core,
}

/// An image of either family.
pub enum AnyImageBuffer {
    Rgb(ImageBuffer),
    Yuv(YuvImageBuffer),
}

/// The request passed to the hardware allocator for an image.
pub(crate) fn hardware_request(info: &ImageInfo) -> HardwareRequest {
    HardwareRequest {
        width: info.size.width,
        height: info.size.height,
        format: info.pixel_format,
    }
}

/// Check a caller buffer for windowed BGRA pixel I/O.
pub(crate) fn check_region(
    size: Size,
    buffer_size: usize,
    offset: usize,
    stride: u32,
    region: Rect,
) -> Result<()> {
    if region.left < 0 || region.top < 0 {
        return Err(Error::InvalidParameter("region starts outside the image"));
    }

    if region.width <= 0 || region.height <= 0 {
        return Err(Error::InvalidParameter("region is empty"));
    }

    if region.width as u32 > MAX_DIMENSION || region.height as u32 > MAX_DIMENSION {
        return Err(Error::InvalidParameter("region is too large"));
    }

    let row = u64::from(region.width as u32) * 4;
    if u64::from(stride) < row {
        return Err(Error::InvalidParameter("stride is smaller than a region row"));
    }

    let needed = u64::from(region.height as u32 - 1)
        .checked_mul(u64::from(stride))
        .and_then(|rows| rows.checked_add(row))
        .and_then(|rows| rows.checked_add(u64::try_from(offset).ok()?))
        .ok_or(Error::InvalidParameter("region offset overflows"))?;
    if needed > buffer_size as u64 {
        warn!(needed, buffer_size, "caller buffer too small for region");
        return Err(Error::InvalidParameter("buffer too small for region"));
    }

    if !region.is_within(size) {
        return Err(Error::InvalidParameter("region exceeds the image"));
    }

    Ok(())
}

impl ImageBuffer {
    pub(crate) fn empty(allocator: AllocatorKind, editable: bool) -> Self {
        ImageBuffer {
            core: Core::new(allocator, editable),
        }
    }

    /// Create a zero-filled image.
    pub fn new(options: &InitializationOptions) -> Result<Self> {
        let mut image = ImageBuffer::empty(options.allocator, options.editable);
        let info = options.info();
        image.core.set_image_info(info, false, Family::Rgb)?;

        let size = image.core.byte_count() as usize;
        let handle = MemoryManager::create_like(
            options.allocator,
            size,
            "pixmap",
            Some(hardware_request(&info)),
        )?;
        image.core.set_pixels(Some(handle));

        if info.alpha_type == AlphaType::Opaque {
            image.force_opaque()?;
        }

        debug!(
            id = image.unique_id(),
            width = info.size.width,
            height = info.size.height,
            format = ?info.pixel_format,
            allocator = ?image.allocator(),
            "created image"
        );
        Ok(image)
    }

    /// Create an image from packed 32-bit colors of `options.src_pixel_format`.
    ///
    /// Row `y` starts at `colors[offset + y * stride]`.
    pub fn from_colors(
        colors: &[u32],
        offset: usize,
        stride: usize,
        options: &InitializationOptions,
    ) -> Result<Self> {
        let Size { width, height } = options.size;
        let (w, h) = (width as usize, height as usize);
        if w == 0 || h == 0 || stride < w {
            return Err(Error::InvalidParameter("bad color geometry"));
        }

        let last = (h - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(offset))
            .and_then(|n| n.checked_add(w));
        if offset.checked_add(w).is_none_or(|end| end > colors.len())
            || last.is_none_or(|end| end > colors.len())
        {
            warn!(len = colors.len(), offset, stride, "colors do not cover the image");
            return Err(Error::InvalidParameter("colors do not cover the image"));
        }

        let src_format = options.src_pixel_format;
        if src_format.bytes_per_pixel() != Some(4) {
            return Err(Error::DataUnsupported("source colors must be 32-bit"));
        }
        src_format.channel_decode()?;
        options.pixel_format.channel_decode()?;

        let mut image = ImageBuffer::new(options)?;
        let spec = image.core.packed_plane();
        let format = image.pixel_format();
        let bpp = usize::from(image.core.pixel_bytes);
        let data = image.core.raw_data_mut()?;
        let mut plane = PlaneMut::new(data, spec)?;

        for y in 0..h {
            let source = &colors[offset + y * stride..][..w];
            let row = plane.row_mut(y);
            for (pixel, color) in row.chunks_exact_mut(bpp).zip(source) {
                let bgra = decode_bgra(src_format, &color.to_le_bytes())?;
                encode_bgra(format, bgra, pixel)?;
            }
        }

        if options.alpha_type == AlphaType::Opaque {
            image.force_opaque()?;
        }

        Ok(image)
    }

    /// Create an image from a rectangle of another one, converting to `options.pixel_format`.
    ///
    /// An unknown target format keeps the format of the source. When `options.size` is not
    /// empty and differs from the rectangle, the copy is fitted to it per `options.scale_mode`.
    pub fn from_source(source: &ImageBuffer, rect: Rect, options: &InitializationOptions) -> Result<Self> {
        if !rect.is_within(source.info().size) {
            return Err(Error::InvalidParameter("rectangle exceeds the source"));
        }

        let cropped = Size::new(rect.width as u32, rect.height as u32);
        let target = if options.size.is_empty() { cropped } else { options.size };

        let editable = options.editable;
        let mut options = *options;
        options.size = cropped;
        options.editable = true;
        if options.pixel_format == PixelFormat::Unknown {
            options.pixel_format = source.pixel_format();
        }

        let src_format = source.pixel_format();
        if src_format != options.pixel_format {
            src_format.channel_decode()?;
            options.pixel_format.channel_decode()?;
        } else if src_format.is_astc() {
            return Err(Error::DataUnsupported("block compressed images can not be cropped"));
        }

        let src = source
            .plane()?
            .sub(
                rect.left as usize,
                rect.top as usize,
                rect.width as usize,
                rect.height as usize,
            )
            .ok_or(Error::InvalidParameter("rectangle exceeds the source"))?;

        let mut image = ImageBuffer::new(&options)?;
        let spec = image.core.packed_plane();
        let dst_format = image.pixel_format();
        let mut dst = PlaneMut::new(image.core.raw_data_mut()?, spec)?;

        for (y, row) in src.rows().enumerate() {
            convert::convert_row(src_format, row, dst_format, dst.row_mut(y), src.width())?;
        }

        image.core.info.color_space = source.color_space();
        image.core.color_profile = source.core.color_profile;

        image.fit_to(target, options.scale_mode)?;
        image.core.set_transformed(false);
        image.core.editable = editable;
        Ok(image)
    }

    /// Adopt memory that already holds pixels described by `info`.
    pub fn from_parts(info: ImageInfo, handle: BufferHandle, editable: bool) -> Result<Self> {
        let mut image = ImageBuffer::empty(handle.allocator(), editable);
        image.core.set_image_info(info, false, Family::Rgb)?;
        image.core.set_pixels(Some(handle));

        if image.plane().is_err() && !info.pixel_format.is_astc() {
            return Err(Error::InvalidParameter("memory is too small for the image"));
        }

        if info.pixel_format.is_astc() && (image.core.data()?.len() as u64) < image.core.byte_count() {
            return Err(Error::InvalidParameter("memory is too small for the image"));
        }

        Ok(image)
    }

    /// A deep copy, in memory of the same allocator kind.
    pub fn try_clone(&self) -> Result<Self> {
        let info = *self.info();
        let mut copy = ImageBuffer::empty(self.allocator(), self.core.editable);
        if copy.core.allocator == AllocatorKind::Custom {
            copy.core.allocator = AllocatorKind::Heap;
        }

        copy.core.set_image_info(info, false, Family::Rgb)?;
        let handle = MemoryManager::create_like(
            copy.core.allocator,
            self.core.byte_count() as usize,
            "pixmap-clone",
            Some(hardware_request(&info)),
        )?;
        copy.core.set_pixels(Some(handle));
        self.copy_rows_into(&mut copy)?;
        copy.core.color_profile = self.core.color_profile;
        Ok(copy)
    }

    fn copy_rows_into(&self, other: &mut ImageBuffer) -> Result<()> {
        if self.pixel_format().is_astc() {
            let len = self.core.byte_count() as usize;
            let src = self.core.data()?;
            let dst = other.core.raw_data_mut()?;
            dst[..len].copy_from_slice(&src[..len]);
            return Ok(());
        }

        let src = self.plane()?;
        let spec = other.core.packed_plane();
        let mut dst = PlaneMut::new(other.core.raw_data_mut()?, spec)?;
        pixmap_texel::plane::copy_plane(src, &mut dst)?;
        Ok(())
    }

    /// Validate and adopt a new description, see [`ImageBuffer::set_pixels`] for memory.
    pub fn set_image_info(&mut self, info: ImageInfo, reuse: bool) -> Result<()> {
        self.core.set_image_info(info, reuse, Family::Rgb)
    }

    /// Replace the memory of the image, releasing the previous memory first.
    pub fn set_pixels(&mut self, handle: Option<BufferHandle>) {
        self.core.set_pixels(handle)
    }

    /// Release the memory now, leaving an image without pixels.
    pub fn release(&mut self) {
        self.core.set_pixels(None);
    }

    pub(crate) fn plane(&self) -> Result<PlaneRef<'_>> {
        Ok(PlaneRef::new(self.core.data()?, self.core.packed_plane())?)
    }

    pub(crate) fn plane_mut(&mut self) -> Result<PlaneMut<'_>> {
        let spec = self.core.packed_plane();
        Ok(PlaneMut::new(self.core.data_mut()?, spec)?)
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

    pub fn row_stride(&self) -> u32 {
        self.core.row_stride
    }

    pub fn row_data_size(&self) -> u32 {
        self.core.row_data_size
    }

    pub fn pixel_bytes(&self) -> u8 {
        self.core.pixel_bytes
    }

    /// The bytes of pixel data, `row_data_size * height` for packed formats.
    pub fn byte_count(&self) -> u64 {
        self.core.byte_count()
    }

    /// The bytes of the backing memory, including padding.
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

    pub fn pixels_mut(&mut self) -> Result<&mut [u8]> {
        self.core.data_mut()
    }

    pub fn is_editable(&self) -> bool {
        self.core.editable
    }

    pub fn set_editable(&mut self, editable: bool) {
        self.core.editable = editable;
    }

    /// A process-wide unique number of this image.
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

    fn pixel_range(&self, x: i32, y: i32) -> Option<core::ops::Range<usize>> {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return None;
        }

        if self.pixel_format().family() != Some(FormatFamily::Packed) {
            return None;
        }

        let bpp = usize::from(self.core.pixel_bytes);
        let start = y as usize * self.core.row_stride as usize + x as usize * bpp;
        Some(start..start + bpp)
    }

    /// The bytes of the pixel at `(x, y)`.
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<&[u8]> {
        let range = self.pixel_range(x, y)?;
        self.core.data().ok()?.get(range)
    }

    pub fn get_pixel8(&self, x: i32, y: i32) -> Option<u8> {
        match self.get_pixel(x, y)? {
            &[value] => Some(value),
            _ => None,
        }
    }

    /// A 2-byte pixel in native endianness.
    pub fn get_pixel16(&self, x: i32, y: i32) -> Option<u16> {
        match self.get_pixel(x, y)? {
            &[a, b] => Some(u16::from_ne_bytes([a, b])),
            _ => None,
        }
    }

    /// A 4-byte pixel in native endianness.
    pub fn get_pixel32(&self, x: i32, y: i32) -> Option<u32> {
        match self.get_pixel(x, y)? {
            &[a, b, c, d] => Some(u32::from_ne_bytes([a, b, c, d])),
            _ => None,
        }
    }

    /// The color at `(x, y)` as `0xAARRGGBB`.
    pub fn get_argb32_color(&self, x: i32, y: i32) -> Option<u32> {
        let pixel = self.get_pixel(x, y)?;
        let [b, g, r, a] = decode_bgra(self.pixel_format(), pixel).ok()?;
        Some(u32::from_be_bytes([a, r, g, b]))
    }

    /// Copy all pixel data, without row padding, into `dst`.
    pub fn read_pixels(&self, dst: &mut [u8]) -> Result<()> {
        let count = self.byte_count() as usize;
        if dst.len() < count {
            return Err(Error::InvalidParameter("destination too small"));
        }

        let data = self.core.data()?;
        let row = self.core.row_data_size as usize;
        let stride = self.core.row_stride as usize;
        if row == stride || self.pixel_format().is_astc() {
            dst[..count].copy_from_slice(data.get(..count).ok_or(Error::DataAbnormal("short buffer"))?);
            return Ok(());
        }

        for (y, target) in dst[..count].chunks_exact_mut(row).enumerate() {
            let start = y * stride;
            target.copy_from_slice(
                data.get(start..start + row)
                    .ok_or(Error::DataAbnormal("short buffer"))?,
            );
        }

        Ok(())
    }

    /// Overwrite all pixel data from `src`, which has no row padding.
    pub fn write_pixels(&mut self, src: &[u8]) -> Result<()> {
        let count = self.byte_count() as usize;
        if src.len() < count {
            return Err(Error::InvalidParameter("source too small"));
        }

        let row = self.core.row_data_size as usize;
        let stride = self.core.row_stride as usize;
        let astc = self.pixel_format().is_astc();
        let data = self.core.data_mut()?;
        if row == stride || astc {
            data.get_mut(..count)
                .ok_or(Error::DataAbnormal("short buffer"))?
                .copy_from_slice(&src[..count]);
            return Ok(());
        }

        for (y, source) in src[..count].chunks_exact(row).enumerate() {
            let start = y * stride;
            data.get_mut(start..start + row)
                .ok_or(Error::DataAbnormal("short buffer"))?
                .copy_from_slice(source);
        }

        Ok(())
    }

    /// Read a rectangle as BGRA 8888 into `dst`, rows `stride` bytes apart from `offset`.
    pub fn read_pixels_region(&self, dst: &mut [u8], offset: usize, stride: u32, region: Rect) -> Result<()> {
        check_region(self.info().size, dst.len(), offset, stride, region)?;
        let format = self.pixel_format();
        format.channel_decode()?;

        let plane = self.plane()?;
        let bpp = usize::from(self.core.pixel_bytes);
        for y in 0..region.height as usize {
            let row = plane.row(region.top as usize + y);
            let out = &mut dst[offset + y * stride as usize..][..region.width as usize * 4];
            for (x, target) in out.chunks_exact_mut(4).enumerate() {
                let at = (region.left as usize + x) * bpp;
                target.copy_from_slice(&decode_bgra(format, &row[at..at + bpp])?);
            }
        }

        Ok(())
    }

    /// Write a rectangle from BGRA 8888 data in `src`, rows `stride` bytes apart from `offset`.
    pub fn write_pixels_region(&mut self, src: &[u8], offset: usize, stride: u32, region: Rect) -> Result<()> {
        check_region(self.info().size, src.len(), offset, stride, region)?;
        let format = self.pixel_format();
        format.channel_decode()?;

        let bpp = usize::from(self.core.pixel_bytes);
        let mut plane = self.plane_mut()?;
        for y in 0..region.height as usize {
            let input = &src[offset + y * stride as usize..][..region.width as usize * 4];
            let row = plane.row_mut(region.top as usize + y);
            for (x, bgra) in input.chunks_exact(4).enumerate() {
                let at = (region.left as usize + x) * bpp;
                encode_bgra(format, [bgra[0], bgra[1], bgra[2], bgra[3]], &mut row[at..at + bpp])?;
            }
        }

        Ok(())
    }

    fn check_position(&self, pos: Position) -> Result<()> {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width() || pos.y as u32 >= self.height() {
            return Err(Error::InvalidParameter("position outside the image"));
        }

        Ok(())
    }

    /// The color at `pos`, as the `u32` whose little endian bytes are B, G, R, A.
    pub fn read_pixel(&self, pos: Position) -> Result<u32> {
        self.check_position(pos)?;
        let pixel = self
            .get_pixel(pos.x, pos.y)
            .ok_or(Error::DataUnsupported("format has no addressable pixels"))?;
        Ok(u32::from_le_bytes(decode_bgra(self.pixel_format(), pixel)?))
    }

    /// Write one color given like the result of [`ImageBuffer::read_pixel`].
    pub fn write_pixel(&mut self, pos: Position, color: u32) -> Result<()> {
        self.check_position(pos)?;
        let format = self.pixel_format();
        format.channel_decode()?;

        let range = self
            .pixel_range(pos.x, pos.y)
            .ok_or(Error::DataUnsupported("format has no addressable pixels"))?;
        let data = self.core.data_mut()?;
        let pixel = data.get_mut(range).ok_or(Error::DataAbnormal("short buffer"))?;
        encode_bgra(format, color.to_le_bytes(), pixel)?;
        Ok(())
    }

    /// Set every pixel to one color given like the result of [`ImageBuffer::read_pixel`].
    pub fn fill(&mut self, color: u32) -> Result<()> {
        let format = self.pixel_format();
        let bpp = usize::from(self.core.pixel_bytes);
        let mut encoded = [0u8; 8];
        encode_bgra(format, color.to_le_bytes(), &mut encoded[..bpp])?;

        let mut plane = self.plane_mut()?;
        for y in 0..plane.height() {
            for pixel in plane.row_mut(y).chunks_exact_mut(bpp) {
                pixel.copy_from_slice(&encoded[..bpp]);
            }
        }

        Ok(())
    }

    /// Scale the alpha of every pixel to `percent`, rescaling premultiplied colors.
    pub fn set_alpha(&mut self, percent: f32) -> Result<()> {
        let alpha_type = self.alpha_type();
        if matches!(alpha_type, AlphaType::Unknown | AlphaType::Opaque) {
            warn!(?alpha_type, "can not set alpha");
            return Err(Error::DataUnsupported("alpha type has no alpha to set"));
        }

        if !(percent > 0.0 && percent <= 1.0) {
            return Err(Error::InvalidParameter("alpha must be in (0, 1]"));
        }

        let format = self.pixel_format();
        let alpha_index = format
            .alpha_index()
            .ok_or(Error::DataUnsupported("format has no alpha channel"))?;
        let premul = alpha_type == AlphaType::Premul;
        let bpp = usize::from(self.core.pixel_bytes);

        let mut plane = self.plane_mut()?;
        for y in 0..plane.height() {
            for pixel in plane.row_mut(y).chunks_exact_mut(bpp) {
                if format == PixelFormat::RgbaF16 {
                    set_f16_alpha(pixel, percent, premul);
                } else {
                    set_byte_alpha(pixel, percent, alpha_index, premul);
                }
            }
        }

        Ok(())
    }

    /// Change the alpha type, formats without alpha are always opaque.
    pub fn set_alpha_type(&mut self, alpha_type: AlphaType) -> Result<()> {
        let format = self.pixel_format();
        let alpha_type = match (format, alpha_type) {
            (_, AlphaType::Unknown) => {
                return Err(Error::InvalidParameter("unknown alpha type"));
            }
            (PixelFormat::Alpha8, AlphaType::Opaque) => {
                return Err(Error::InvalidParameter("an alpha mask can not be opaque"));
            }
            (PixelFormat::Rgb565 | PixelFormat::Rgb888 | PixelFormat::Cmyk, _) => AlphaType::Opaque,
            (_, alpha_type) => alpha_type,
        };

        self.core.info.alpha_type = alpha_type;
        Ok(())
    }

    fn force_opaque(&mut self) -> Result<()> {
        let Some(alpha_index) = self.pixel_format().alpha_index() else {
            return Ok(());
        };

        if self.core.pixel_bytes != 4 {
            return Ok(());
        }

        let spec = self.core.packed_plane();
        let mut plane = PlaneMut::new(self.core.raw_data_mut()?, spec)?;
        for y in 0..plane.height() {
            for pixel in plane.row_mut(y).chunks_exact_mut(4) {
                pixel[alpha_index] = 0xff;
            }
        }

        Ok(())
    }

    /// Compare geometry, format, alpha type and pixel data.
    pub fn is_same_image(&self, other: &ImageBuffer) -> bool {
        let (ours, theirs) = (self.info(), other.info());
        if ours.size != theirs.size
            || ours.pixel_format != theirs.pixel_format
            || ours.alpha_type != theirs.alpha_type
            || self.core.row_data_size != other.core.row_data_size
        {
            return false;
        }

        if self.pixel_format().is_astc() {
            let count = self.byte_count() as usize;
            return match (self.core.data(), other.core.data()) {
                (Ok(a), Ok(b)) => a.get(..count).is_some() && a.get(..count) == b.get(..count),
                _ => false,
            };
        }

        match (self.plane(), other.plane()) {
            (Ok(a), Ok(b)) => a.rows().eq(b.rows()),
            _ => false,
        }
    }
}

fn premul_channel(value: u8, alpha: u8, percent: f32) -> u8 {
    if alpha == 0 {
        return 0;
    }

    let value = f32::from(value) * percent * 255.0 / f32::from(alpha) + 0.5;
    value.min(255.0) as u8
}

fn set_byte_alpha(pixel: &mut [u8], percent: f32, alpha_index: usize, premul: bool) {
    let alpha = pixel[alpha_index];
    if premul {
        for (idx, value) in pixel.iter_mut().enumerate() {
            if idx != alpha_index {
                *value = premul_channel(*value, alpha, percent);
            }
        }
    }

    pixel[alpha_index] = (255.0 * percent + 0.5) as u8;
}

fn set_f16_alpha(pixel: &mut [u8], percent: f32, premul: bool) {
    let load = |pixel: &[u8], i: usize| convert::f16_to_f32(u16::from_ne_bytes([pixel[2 * i], pixel[2 * i + 1]]));
    let store = |pixel: &mut [u8], i: usize, value: f32| {
        pixel[2 * i..2 * i + 2].copy_from_slice(&convert::f32_to_f16(value).to_ne_bytes());
    };

    let alpha = load(pixel, 3);
    if premul {
        for i in 0..3 {
            let value = if alpha > 0.0 {
                load(pixel, i) * percent / alpha
            } else {
                0.0
            };
            store(pixel, i, value);
        }
    }

    store(pixel, 3, percent);
}

impl AnyImageBuffer {
    pub fn info(&self) -> &ImageInfo {
        match self {
            AnyImageBuffer::Rgb(image) => image.info(),
            AnyImageBuffer::Yuv(image) => image.info(),
        }
    }

    pub fn into_rgb(self) -> Option<ImageBuffer> {
        match self {
            AnyImageBuffer::Rgb(image) => Some(image),
            AnyImageBuffer::Yuv(_) => None,
        }
    }

    pub fn into_yuv(self) -> Option<YuvImageBuffer> {
        match self {
            AnyImageBuffer::Yuv(image) => Some(image),
            AnyImageBuffer::Rgb(_) => None,
        }
    }
}

impl From<ImageBuffer> for AnyImageBuffer {
    fn from(image: ImageBuffer) -> Self {
        AnyImageBuffer::Rgb(image)
    }
}

impl From<YuvImageBuffer> for AnyImageBuffer {
    fn from(image: YuvImageBuffer) -> Self {
        AnyImageBuffer::Yuv(image)
    }
}

impl core::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("info", self.info())
            .field("allocator", &self.allocator())
            .field("row_stride", &self.row_stride())
            .field("editable", &self.is_editable())
            .finish()
    }
}
