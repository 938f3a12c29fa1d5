//! Geometric and color transforms of whole images.
//!
//! Every transform renders into freshly allocated memory of the same allocator kind as the
//! image, and only then swaps it in. A failing transform leaves the image as it was.
mod yuv;

use pixmap_texel::affine::Rotation;
use pixmap_texel::convert::{decode_bgra, encode_bgra};
use pixmap_texel::plane::{
    copy_plane, copy_plane_flipped, mirror_plane, rotate_plane_180, rotate_plane_270,
    rotate_plane_90, translate_plane,
};
use pixmap_texel::resample::resample_plane;
use pixmap_texel::{
    AlphaType, ColorConversion, ColorProfile, ColorSpace, FormatFamily, PixelFormat, PlaneMut,
    PlaneRef, PlaneSpec,
};
use tracing::{debug, warn};

pub use self::yuv::{UV_DEFAULT, Y_DEFAULT};
pub use pixmap_texel::Filter;

use crate::image::{hardware_request, AnyImageBuffer, ImageBuffer};
use crate::info::{ImageInfo, Rect, ScaleMode, Size};
use crate::memory::{AllocatorKind, BufferHandle, MemoryManager, MAX_RAM_SIZE};
use crate::state::Family;
use crate::{Error, Result};

/// Images no larger than this in both dimensions get anti-aliasing by default.
pub const ANTI_ALIASING_SIZE: u32 = 350;

/// The quality of filtering when resampling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AntiAliasing {
    None,
    Low,
    Medium,
    High,
}

impl AntiAliasing {
    /// The resampling kernel of this quality.
    pub fn filter(self) -> Filter {
        match self {
            AntiAliasing::None => Filter::Nearest,
            AntiAliasing::Low => Filter::Linear,
            AntiAliasing::Medium => Filter::Bilinear,
            AntiAliasing::High => Filter::Box,
        }
    }
}

/// The transforms supported by both buffer families.
pub trait PixelTransformable {
    /// Resize by the factors `x` and `y`, a negative factor also mirrors that axis.
    ///
    /// Without an explicit quality, small results are filtered with
    /// [`AntiAliasing::Medium`] and larger ones with [`AntiAliasing::None`].
    fn scale(&mut self, x: f32, y: f32, anti_aliasing: Option<AntiAliasing>) -> Result<()>;

    /// Rotate clockwise about the center.
    fn rotate(&mut self, degrees: f32) -> Result<()>;

    /// Mirror horizontally if `x_axis`, vertically if `y_axis`.
    fn flip(&mut self, x_axis: bool, y_axis: bool) -> Result<()>;

    /// Shift the content, keeping the size.
    fn translate(&mut self, x: f32, y: f32) -> Result<()>;

    /// Keep only a rectangle of the image.
    fn crop(&mut self, rect: Rect) -> Result<()>;

    /// Convert the pixels into another color space.
    fn apply_color_space(&mut self, space: ColorSpace) -> Result<()>;
}

/// A rotation by a multiple of a quarter turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Quarter {
    Zero,
    Ninety,
    Half,
    TwoSeventy,
}

impl Quarter {
    pub(crate) fn from_degrees(degrees: f32) -> Option<Self> {
        if !degrees.is_finite() {
            return None;
        }

        let degrees = degrees.rem_euclid(360.0);
        if degrees == 0.0 || degrees == 360.0 {
            Some(Quarter::Zero)
        } else if degrees == 90.0 {
            Some(Quarter::Ninety)
        } else if degrees == 180.0 {
            Some(Quarter::Half)
        } else if degrees == 270.0 {
            Some(Quarter::TwoSeventy)
        } else {
            None
        }
    }
}

/// The size of an image of `src` scaled by `x` and `y`, rounded half away from zero.
pub(crate) fn destination_size(src: Size, x: f32, y: f32) -> Result<Size> {
    if !x.is_finite() || !y.is_finite() || x == 0.0 || y == 0.0 {
        return Err(Error::InvalidParameter("scale factors must be finite and non-zero"));
    }

    let scaled = |len: u32, factor: f32| (f64::from(len) * f64::from(factor.abs())).round();
    let (width, height) = (scaled(src.width, x), scaled(src.height, y));
    if width < 1.0 || height < 1.0 {
        warn!(?src, x, y, "scaled image would be empty");
        return Err(Error::InvalidParameter("scaled image would be empty"));
    }

    if width > f64::from(i32::MAX) || height > f64::from(i32::MAX) {
        return Err(Error::TooLarge("scaled image dimensions overflow"));
    }

    Ok(Size::new(width as u32, height as u32))
}

/// The quality for scaling an image of size `src`, filtering small sources by default.
pub(crate) fn resolve_anti_aliasing(requested: Option<AntiAliasing>, src: Size) -> AntiAliasing {
    match requested {
        Some(quality) => quality,
        None if src.width <= ANTI_ALIASING_SIZE && src.height <= ANTI_ALIASING_SIZE => {
            AntiAliasing::Medium
        }
        None => AntiAliasing::None,
    }
}

pub(crate) fn translation(x: f32, y: f32) -> Result<(i64, i64)> {
    if !x.is_finite() || !y.is_finite() {
        return Err(Error::InvalidParameter("translation must be finite"));
    }
    Ok((x.round() as i64, y.round() as i64))
}

pub(crate) fn check_ceiling(allocator: AllocatorKind, size: u64) -> Result<()> {
    if allocator.has_ram_ceiling() && size > MAX_RAM_SIZE as u64 {
        warn!(size, ?allocator, "transform result exceeds the memory ceiling");
        return Err(Error::TooLarge("transform result exceeds the memory ceiling"));
    }
    Ok(())
}

/// The conversion between two color spaces, `None` if the pixels need not change.
pub(crate) fn conversion(
    current: Option<&ColorProfile>,
    current_space: ColorSpace,
    target: ColorSpace,
) -> Result<Option<ColorConversion>> {
    let target_profile = target.profile().ok_or_else(|| {
        warn!(?target, "color space has no profile");
        Error::DataUnsupported("target color space has no profile")
    })?;

    let current = current.ok_or_else(|| {
        warn!(?current_space, "image has no color profile");
        Error::DataUnsupported("image has no color profile")
    })?;

    if *current == target_profile {
        return Ok(None);
    }

    Ok(Some(current.conversion_to(&target_profile)))
}

/// How the samples of a packed format are filtered.
enum Sampling {
    /// Independent byte channels.
    Bytes(usize),
    /// Decoded into BGRA 8888 first.
    ViaBgra,
}

fn sampling(format: PixelFormat) -> Result<Sampling> {
    match format {
        PixelFormat::Rgb565 | PixelFormat::RgbaF16 => Ok(Sampling::ViaBgra),
        _ if format.family() == Some(FormatFamily::Packed) => Ok(Sampling::Bytes(
            usize::from(format.bytes_per_pixel().unwrap_or(0)),
        )),
        _ => {
            warn!(?format, "format can not be transformed");
            Err(Error::DataUnsupported("format can not be transformed"))
        }
    }
}

/// Run a plane primitive with the element type matching the pixel size.
macro_rules! per_pixel {
    ($bytes:expr, $f:ident($($arg:expr),*)) => {
        match $bytes {
            1 => $f::<u8>($($arg),*)?,
            2 => $f::<[u8; 2]>($($arg),*)?,
            3 => $f::<[u8; 3]>($($arg),*)?,
            4 => $f::<[u8; 4]>($($arg),*)?,
            8 => $f::<[u8; 8]>($($arg),*)?,
            _ => return Err(Error::DataUnsupported("pixel size")),
        }
    };
}

fn to_bgra(format: PixelFormat, src: PlaneRef<'_>) -> Result<Vec<u8>> {
    let bpp = src.spec().element;
    let mut bgra = Vec::with_capacity(src.width() * src.height() * 4);
    for row in src.rows() {
        for pixel in row.chunks_exact(bpp) {
            bgra.extend_from_slice(&decode_bgra(format, pixel)?);
        }
    }
    Ok(bgra)
}

fn from_bgra(format: PixelFormat, bgra: &[u8], dst: &mut PlaneMut<'_>) -> Result<()> {
    let bpp = dst.spec().element;
    let width = dst.width();
    for y in 0..dst.height() {
        let input = &bgra[y * width * 4..][..width * 4];
        for (pixel, color) in dst.row_mut(y).chunks_exact_mut(bpp).zip(input.chunks_exact(4)) {
            encode_bgra(format, [color[0], color[1], color[2], color[3]], pixel)?;
        }
    }
    Ok(())
}

/// Run a filtering operation with the channel layout of `format`.
fn render(
    format: PixelFormat,
    src: PlaneRef<'_>,
    dst: &mut PlaneMut<'_>,
    op: impl FnOnce(PlaneRef<'_>, &mut PlaneMut<'_>, usize) -> Result<()>,
) -> Result<()> {
    match sampling(format)? {
        Sampling::Bytes(channels) => op(src, dst, channels),
        Sampling::ViaBgra => {
            let bgra = to_bgra(format, src)?;
            let mut out = vec![0u8; dst.width() * dst.height() * 4];
            let src_spec = PlaneSpec::packed(src.width(), src.height(), 4);
            let dst_spec = PlaneSpec::packed(dst.width(), dst.height(), 4);
            op(
                PlaneRef::new(&bgra, src_spec)?,
                &mut PlaneMut::new(&mut out, dst_spec)?,
                4,
            )?;
            from_bgra(format, &out, dst)
        }
    }
}

/// Copy `src` into `dst`, mirrored along the requested axes.
fn orient(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>, mirror_x: bool, mirror_y: bool) -> Result<()> {
    let bpp = src.spec().element;
    match (mirror_x, mirror_y) {
        (false, false) => copy_plane(src, dst)?,
        (false, true) => copy_plane_flipped(src, dst)?,
        (true, false) => per_pixel!(bpp, mirror_plane(src, dst)),
        (true, true) => per_pixel!(bpp, rotate_plane_180(src, dst)),
    }
    Ok(())
}

fn unpremultiply(bgra: [u8; 4]) -> [u8; 4] {
    let [b, g, r, a] = bgra;
    if a == 0 || a == 0xff {
        return bgra;
    }

    let scale = |c: u8| ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
    [scale(b), scale(g), scale(r), a]
}

fn premultiply(bgra: [u8; 4]) -> [u8; 4] {
    let [b, g, r, a] = bgra;
    let scale = |c: u8| ((u32::from(c) * u32::from(a) + 127) / 255) as u8;
    [scale(b), scale(g), scale(r), a]
}

impl ImageBuffer {
    /// Allocate memory for `info` with the allocator of this image, and the plane within it.
    fn allocate_target(&self, info: &ImageInfo) -> Result<(BufferHandle, PlaneSpec)> {
        let Size { width, height } = info.size;
        let format = info.pixel_format;
        let row = format.stride_for(width)?;
        let size = format.size_for(width, height)?;
        check_ceiling(self.allocator(), size)?;

        let handle = MemoryManager::create_like(
            self.allocator(),
            size as usize,
            "pixmap-transform",
            Some(hardware_request(info)),
        )?;

        let bpp = usize::from(format.bytes_per_pixel().unwrap_or(1));
        let stride = handle.native_stride().unwrap_or(row);
        let spec = PlaneSpec::packed(width as usize, height as usize, bpp).with_stride(stride as usize);
        if spec.end().is_none_or(|end| end > handle.size()) {
            return Err(Error::AllocationFailed {
                allocator: handle.allocator(),
                size: size as usize,
            });
        }

        Ok((handle, spec))
    }

    /// Render into new memory of the geometry `info`, then swap it in.
    fn transform_into(
        &mut self,
        info: ImageInfo,
        render: impl FnOnce(PlaneRef<'_>, &mut PlaneMut<'_>) -> Result<()>,
    ) -> Result<()> {
        let (mut handle, spec) = self.allocate_target(&info)?;
        {
            let src = self.plane()?;
            let data = handle
                .bytes_mut()
                .ok_or(Error::ConvertFailed("destination is read-only"))?;
            let mut dst = PlaneMut::new(data, spec)?;
            render(src, &mut dst)?;
        }

        self.core.replace(info, handle, Family::Rgb)
    }

    fn resized(&self, size: Size) -> ImageInfo {
        ImageInfo {
            size,
            ..*self.info()
        }
    }

    /// Resample to exactly `target`, either stretched or uniformly scaled and center cropped.
    pub(crate) fn fit_to(&mut self, target: Size, mode: ScaleMode) -> Result<()> {
        let size = self.info().size;
        if size == target {
            return Ok(());
        }

        let (Ok(width), Ok(height)) = (i32::try_from(target.width), i32::try_from(target.height)) else {
            return Err(Error::TooLarge("target size does not fit the image geometry"));
        };
        if target.is_empty() {
            return Err(Error::InvalidParameter("target size is empty"));
        }

        let format = self.pixel_format();
        sampling(format)?;
        let filter = resolve_anti_aliasing(None, size).filter();

        let covered = match mode {
            ScaleMode::FitTargetSize => target,
            ScaleMode::CenterCrop => {
                let factor = f64::max(
                    f64::from(target.width) / f64::from(size.width),
                    f64::from(target.height) / f64::from(size.height),
                );
                let cover = |len: u32, want: u32| {
                    let len = (f64::from(len) * factor).round();
                    if len > f64::from(i32::MAX) {
                        Err(Error::TooLarge("scaled image dimensions overflow"))
                    } else {
                        Ok((len as u32).max(want))
                    }
                };
                Size::new(cover(size.width, target.width)?, cover(size.height, target.height)?)
            }
        };

        if covered != size {
            self.transform_into(self.resized(covered), |src, dst| {
                render(format, src, dst, |src, dst, channels| {
                    Ok(resample_plane::<u8>(src, dst, channels, filter)?)
                })
            })?;
        }

        if covered != target {
            let left = (covered.width - target.width) / 2;
            let top = (covered.height - target.height) / 2;
            self.crop(Rect::new(left as i32, top as i32, width, height))?;
        }

        debug!(id = self.unique_id(), ?size, ?covered, ?target, ?mode, "fitted image");
        Ok(())
    }
}

impl PixelTransformable for ImageBuffer {
    fn scale(&mut self, x: f32, y: f32, anti_aliasing: Option<AntiAliasing>) -> Result<()> {
        self.core.check_editable()?;
        let format = self.pixel_format();
        sampling(format)?;

        let src_size = self.info().size;
        let dst_size = destination_size(src_size, x, y)?;
        let filter = resolve_anti_aliasing(anti_aliasing, src_size).filter();
        let (mirror_x, mirror_y) = (x < 0.0, y < 0.0);

        self.transform_into(self.resized(dst_size), |src, dst| {
            if src.width() == dst.width() && src.height() == dst.height() {
                return orient(src, dst, mirror_x, mirror_y);
            }

            if !mirror_x && !mirror_y {
                return render(format, src, dst, |src, dst, channels| {
                    Ok(resample_plane::<u8>(src, dst, channels, filter)?)
                });
            }

            let spec = PlaneSpec::packed(dst.width(), dst.height(), dst.spec().element);
            let mut scratch = vec![0u8; dst.width() * dst.height() * spec.element];
            let mut resampled = PlaneMut::new(&mut scratch, spec)?;
            render(format, src, &mut resampled, |src, dst, channels| {
                Ok(resample_plane::<u8>(src, dst, channels, filter)?)
            })?;
            orient(resampled.as_ref(), dst, mirror_x, mirror_y)
        })?;

        debug!(id = self.unique_id(), ?src_size, ?dst_size, ?filter, "scaled image");
        Ok(())
    }

    fn rotate(&mut self, degrees: f32) -> Result<()> {
        self.core.check_editable()?;
        if !degrees.is_finite() {
            return Err(Error::InvalidParameter("rotation must be finite"));
        }

        let format = self.pixel_format();
        sampling(format)?;
        let size = self.info().size;
        let bpp = usize::from(self.pixel_bytes());

        let info = match Quarter::from_degrees(degrees) {
            Some(Quarter::Zero) => return Ok(()),
            Some(quarter @ (Quarter::Ninety | Quarter::TwoSeventy)) => {
                let info = self.resized(Size::new(size.height, size.width));
                self.transform_into(info, |src, dst| {
                    if quarter == Quarter::Ninety {
                        per_pixel!(bpp, rotate_plane_90(src, dst));
                    } else {
                        per_pixel!(bpp, rotate_plane_270(src, dst));
                    }
                    Ok(())
                })?;
                info
            }
            Some(Quarter::Half) => {
                let info = *self.info();
                self.transform_into(info, |src, dst| {
                    per_pixel!(bpp, rotate_plane_180(src, dst));
                    Ok(())
                })?;
                info
            }
            None => {
                let rotation = Rotation::from_degrees(degrees.rem_euclid(360.0));
                let (width, height) = rotation.bounding_size(size.width as usize, size.height as usize);
                let info = self.resized(Size::new(width as u32, height as u32));
                self.transform_into(info, |src, dst| {
                    render(format, src, dst, |src, dst, channels| {
                        Ok(rotation.apply::<u8>(src, dst, channels)?)
                    })
                })?;
                info
            }
        };

        debug!(id = self.unique_id(), degrees, from = ?size, to = ?info.size, "rotated image");
        Ok(())
    }

    fn flip(&mut self, x_axis: bool, y_axis: bool) -> Result<()> {
        if !x_axis && !y_axis {
            return self.core.check_editable();
        }

        let x = if x_axis { -1.0 } else { 1.0 };
        let y = if y_axis { -1.0 } else { 1.0 };
        self.scale(x, y, None)
    }

    fn translate(&mut self, x: f32, y: f32) -> Result<()> {
        self.core.check_editable()?;
        sampling(self.pixel_format())?;
        let (dx, dy) = translation(x, y)?;
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        let info = *self.info();
        self.transform_into(info, |src, dst| {
            dst.fill(0);
            Ok(translate_plane(src, dst, dx, dy)?)
        })?;

        debug!(id = self.unique_id(), dx, dy, "translated image");
        Ok(())
    }

    fn crop(&mut self, rect: Rect) -> Result<()> {
        self.core.check_editable()?;
        let size = self.info().size;
        if !rect.is_within(size) {
            warn!(?rect, ?size, "crop rectangle exceeds the image");
            return Err(Error::InvalidParameter("crop rectangle exceeds the image"));
        }

        if rect == Rect::of_size(size) {
            return Ok(());
        }

        sampling(self.pixel_format())?;
        let info = self.resized(Size::new(rect.width as u32, rect.height as u32));
        self.transform_into(info, |src, dst| {
            let window = src
                .sub(
                    rect.left as usize,
                    rect.top as usize,
                    rect.width as usize,
                    rect.height as usize,
                )
                .ok_or(Error::InvalidParameter("crop rectangle exceeds the image"))?;
            Ok(copy_plane(window, dst)?)
        })?;

        debug!(id = self.unique_id(), ?rect, "cropped image");
        Ok(())
    }

    fn apply_color_space(&mut self, space: ColorSpace) -> Result<()> {
        self.core.check_editable()?;
        let Some(conversion) = conversion(self.color_profile(), self.color_space(), space)? else {
            self.set_color_profile(space);
            return Ok(());
        };

        let format = self.pixel_format();
        format.channel_decode()?;
        let premultiplied = self.alpha_type() == AlphaType::Premul;
        let bpp = usize::from(self.pixel_bytes());

        let info = ImageInfo {
            color_space: space,
            ..*self.info()
        };
        self.transform_into(info, |src, dst| {
            for (y, row) in src.rows().enumerate() {
                let out = dst.row_mut(y);
                for (pixel, target) in row.chunks_exact(bpp).zip(out.chunks_exact_mut(bpp)) {
                    let mut bgra = decode_bgra(format, pixel)?;
                    if premultiplied {
                        bgra = unpremultiply(bgra);
                    }
                    bgra = conversion.convert_bgra(bgra);
                    if premultiplied {
                        bgra = premultiply(bgra);
                    }
                    encode_bgra(format, bgra, target)?;
                }
            }
            Ok(())
        })?;

        debug!(id = self.unique_id(), ?space, "converted color space");
        Ok(())
    }
}

impl PixelTransformable for AnyImageBuffer {
    fn scale(&mut self, x: f32, y: f32, anti_aliasing: Option<AntiAliasing>) -> Result<()> {
        match self {
            AnyImageBuffer::Rgb(image) => image.scale(x, y, anti_aliasing),
            AnyImageBuffer::Yuv(image) => image.scale(x, y, anti_aliasing),
        }
    }

    fn rotate(&mut self, degrees: f32) -> Result<()> {
        match self {
            AnyImageBuffer::Rgb(image) => image.rotate(degrees),
            AnyImageBuffer::Yuv(image) => image.rotate(degrees),
        }
    }

    fn flip(&mut self, x_axis: bool, y_axis: bool) -> Result<()> {
        match self {
            AnyImageBuffer::Rgb(image) => image.flip(x_axis, y_axis),
            AnyImageBuffer::Yuv(image) => image.flip(x_axis, y_axis),
        }
    }

    fn translate(&mut self, x: f32, y: f32) -> Result<()> {
        match self {
            AnyImageBuffer::Rgb(image) => image.translate(x, y),
            AnyImageBuffer::Yuv(image) => image.translate(x, y),
        }
    }

    fn crop(&mut self, rect: Rect) -> Result<()> {
        match self {
            AnyImageBuffer::Rgb(image) => image.crop(rect),
            AnyImageBuffer::Yuv(image) => image.crop(rect),
        }
    }

    fn apply_color_space(&mut self, space: ColorSpace) -> Result<()> {
        match self {
            AnyImageBuffer::Rgb(image) => image.apply_color_space(space),
            AnyImageBuffer::Yuv(image) => image.apply_color_space(space),
        }
    }
}
