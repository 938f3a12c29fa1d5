//! Transforms of YUV 4:2:0 images, operating on the planes directly.
//!
//! The source planes are first split into three planar buffers. Every operation then works on
//! each of them separately, chroma at half resolution, and the result is interleaved again for
//! the semi-planar formats when it is written into the destination memory.
use bytemuck::Pod;
use pixmap_texel::plane::{
    self, copy_plane, copy_plane_flipped, fill_plane, i420_to_nv12, i420_to_nv21, mirror_plane,
    nv12_to_i420, nv21_to_i420, rotate_plane_180, rotate_plane_270, rotate_plane_90,
};
use pixmap_texel::resample::resample_plane;
use pixmap_texel::{half, Chroma, ChromaOrder, Filter, PixelFormat, PlaneMut, PlaneRef, PlaneSpec, YuvPlaneLayout};
use tracing::debug;

use super::{destination_size, resolve_anti_aliasing, AntiAliasing, PixelTransformable, Quarter};
use crate::image::hardware_request;
use crate::info::{ImageInfo, Rect, Size};
use crate::memory::{BufferHandle, MemoryManager};
use crate::state::Family;
use crate::yuv::{bgra_to_planes, planes_to_bgra, YuvImageBuffer};
use crate::{Error, Result};

/// Luma of the area uncovered by a translation.
pub const Y_DEFAULT: u8 = 0x10;
/// Chroma of the area uncovered by a translation.
pub const UV_DEFAULT: u8 = 0x80;

/// The three planes of an image, each tightly packed in its own buffer.
struct Planar {
    format: PixelFormat,
    sample: usize,
    width: usize,
    height: usize,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

/// Run a plane primitive with the element type matching the sample size.
macro_rules! per_sample {
    ($sample:expr, $f:ident($($arg:expr),*)) => {
        match $sample {
            2 => $f::<[u8; 2]>($($arg),*),
            _ => $f::<u8>($($arg),*),
        }
    };
}

impl Planar {
    fn blank(format: PixelFormat, sample: usize, width: usize, height: usize) -> Self {
        let chroma = half(width as u64) as usize * half(height as u64) as usize * sample;
        Planar {
            format,
            sample,
            width,
            height,
            y: vec![0; width * height * sample],
            u: vec![0; chroma],
            v: vec![0; chroma],
        }
    }

    fn luma_spec(&self) -> PlaneSpec {
        PlaneSpec::packed(self.width, self.height, self.sample)
    }

    fn chroma_spec(&self) -> PlaneSpec {
        PlaneSpec::packed(
            half(self.width as u64) as usize,
            half(self.height as u64) as usize,
            self.sample,
        )
    }

    fn unpack(layout: &YuvPlaneLayout, data: &[u8]) -> Result<Self> {
        let sample = layout.sample_bytes();
        let mut planar = Planar::blank(
            layout.format,
            sample,
            layout.y_width as usize,
            layout.y_height as usize,
        );
        per_sample!(sample, unpack_as(layout, data, &mut planar))?;
        Ok(planar)
    }

    fn pack(&self, layout: &YuvPlaneLayout, data: &mut [u8]) -> Result<()> {
        if layout.format != self.format
            || layout.y_width as usize != self.width
            || layout.y_height as usize != self.height
        {
            return Err(Error::InvalidParameter("planes do not match the layout"));
        }

        per_sample!(self.sample, pack_as(self, layout, data))
    }

    /// Produce planes of a new size by running `op` on each of the three planes.
    fn map(
        &self,
        width: usize,
        height: usize,
        mut op: impl FnMut(PlaneRef<'_>, &mut PlaneMut<'_>, bool) -> Result<()>,
    ) -> Result<Planar> {
        let mut out = Planar::blank(self.format, self.sample, width, height);
        let (luma, chroma) = (self.luma_spec(), self.chroma_spec());
        let (out_luma, out_chroma) = (out.luma_spec(), out.chroma_spec());

        op(
            PlaneRef::new(&self.y, luma)?,
            &mut PlaneMut::new(&mut out.y, out_luma)?,
            false,
        )?;
        op(
            PlaneRef::new(&self.u, chroma)?,
            &mut PlaneMut::new(&mut out.u, out_chroma)?,
            true,
        )?;
        op(
            PlaneRef::new(&self.v, chroma)?,
            &mut PlaneMut::new(&mut out.v, out_chroma)?,
            true,
        )?;
        Ok(out)
    }
}

fn unpack_as<T: Pod>(layout: &YuvPlaneLayout, data: &[u8], out: &mut Planar) -> Result<()> {
    let (luma, chroma) = (out.luma_spec(), out.chroma_spec());
    let y = PlaneRef::new(data, layout.luma())?;
    let mut dst_y = PlaneMut::new(&mut out.y, luma)?;
    let mut dst_u = PlaneMut::new(&mut out.u, chroma)?;
    let mut dst_v = PlaneMut::new(&mut out.v, chroma)?;

    let pairs = |layout: &YuvPlaneLayout| {
        layout
            .chroma_pairs()
            .ok_or(Error::DataAbnormal("missing chroma pairs"))
    };
    let single = |which| {
        layout
            .chroma_plane(which)
            .ok_or(Error::DataAbnormal("missing chroma plane"))
    };

    match layout.format.chroma_order() {
        Some(ChromaOrder::Uv) => {
            let uv = PlaneRef::new(data, pairs(layout)?)?;
            nv12_to_i420::<T>(y, uv, &mut dst_y, &mut dst_u, &mut dst_v)?;
        }
        Some(ChromaOrder::Vu) => {
            let vu = PlaneRef::new(data, pairs(layout)?)?;
            nv21_to_i420::<T>(y, vu, &mut dst_y, &mut dst_u, &mut dst_v)?;
        }
        Some(ChromaOrder::PlanarUv | ChromaOrder::PlanarVu) => {
            copy_plane(y, &mut dst_y)?;
            copy_plane(PlaneRef::new(data, single(Chroma::U)?)?, &mut dst_u)?;
            copy_plane(PlaneRef::new(data, single(Chroma::V)?)?, &mut dst_v)?;
        }
        None => return Err(Error::DataUnsupported("not a yuv format")),
    }

    Ok(())
}

fn pack_as<T: Pod>(planar: &Planar, layout: &YuvPlaneLayout, data: &mut [u8]) -> Result<()> {
    let uv_offset = layout.uv_offset as usize;
    if data.len() < uv_offset {
        return Err(Error::DataAbnormal("memory does not span the planes"));
    }

    let (luma_bytes, chroma_bytes) = data.split_at_mut(uv_offset);
    let y = PlaneRef::new(&planar.y, planar.luma_spec())?;
    let u = PlaneRef::new(&planar.u, planar.chroma_spec())?;
    let v = PlaneRef::new(&planar.v, planar.chroma_spec())?;
    let mut dst_y = PlaneMut::new(luma_bytes, layout.luma())?;

    // Chroma specs are relative to the start of the chroma bytes.
    let rebase = |spec: Option<PlaneSpec>| {
        spec.map(|spec| spec.at_offset(spec.offset - uv_offset))
            .ok_or(Error::DataAbnormal("missing chroma plane"))
    };

    match layout.format.chroma_order() {
        Some(ChromaOrder::Uv) => {
            let mut dst_uv = PlaneMut::new(chroma_bytes, rebase(layout.chroma_pairs())?)?;
            i420_to_nv12::<T>(y, u, v, &mut dst_y, &mut dst_uv)?;
        }
        Some(ChromaOrder::Vu) => {
            let mut dst_vu = PlaneMut::new(chroma_bytes, rebase(layout.chroma_pairs())?)?;
            i420_to_nv21::<T>(y, u, v, &mut dst_y, &mut dst_vu)?;
        }
        Some(ChromaOrder::PlanarUv | ChromaOrder::PlanarVu) => {
            copy_plane(y, &mut dst_y)?;
            for (which, src) in [(Chroma::U, u), (Chroma::V, v)] {
                let spec = rebase(layout.chroma_plane(which))?;
                copy_plane(src, &mut PlaneMut::new(&mut *chroma_bytes, spec)?)?;
            }
        }
        None => return Err(Error::DataUnsupported("not a yuv format")),
    }

    Ok(())
}

fn resample(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>, sample: usize, filter: Filter) -> Result<()> {
    match sample {
        2 => resample_plane::<u16>(src, dst, 1, filter)?,
        _ => resample_plane::<u8>(src, dst, 1, filter)?,
    }
    Ok(())
}

fn fill_sample(dst: &mut PlaneMut<'_>, sample: usize, value: u8) -> Result<()> {
    match sample {
        2 => fill_plane(dst, (u16::from(value) << 8).to_le_bytes())?,
        _ => fill_plane(dst, value)?,
    }
    Ok(())
}

fn mirror(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>, sample: usize) -> Result<()> {
    per_sample!(sample, mirror_plane(src, dst))?;
    Ok(())
}

fn rotate_quarter(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>, sample: usize, quarter: Quarter) -> Result<()> {
    match quarter {
        Quarter::Zero => copy_plane(src, dst)?,
        Quarter::Ninety => per_sample!(sample, rotate_plane_90(src, dst))?,
        Quarter::Half => per_sample!(sample, rotate_plane_180(src, dst))?,
        Quarter::TwoSeventy => per_sample!(sample, rotate_plane_270(src, dst))?,
    }
    Ok(())
}

/// Flip rows of a plane if requested, otherwise copy.
fn flip_rows(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>, flip: bool) -> Result<()> {
    if flip {
        copy_plane_flipped(src, dst)?;
    } else {
        copy_plane(src, dst)?;
    }
    Ok(())
}

impl YuvImageBuffer {
    /// Allocate memory for `info` with the allocator of this image, and the layout within it.
    fn allocate_target(&self, info: &ImageInfo) -> Result<(BufferHandle, YuvPlaneLayout)> {
        let Size { width, height } = info.size;
        let size = info.pixel_format.size_for(width, height)?;
        super::check_ceiling(self.allocator(), size)?;

        let handle = MemoryManager::create_like(
            self.allocator(),
            size as usize,
            "pixmap-yuv-transform",
            Some(hardware_request(info)),
        )?;

        let layout = match handle.native_stride() {
            Some(stride) => YuvPlaneLayout::with_luma_stride(info.pixel_format, width, height, stride)?,
            None => YuvPlaneLayout::tight(info.pixel_format, width, height)?,
        };

        if (handle.size() as u64) < layout.total_size() {
            return Err(Error::AllocationFailed {
                allocator: handle.allocator(),
                size: layout.total_size() as usize,
            });
        }

        Ok((handle, layout))
    }

    /// Write `planar` into fresh memory and swap it in.
    fn adopt(&mut self, planar: &Planar) -> Result<()> {
        let mut info = *self.info();
        info.size = Size::new(planar.width as u32, planar.height as u32);

        let (mut handle, layout) = self.allocate_target(&info)?;
        let data = handle
            .bytes_mut()
            .ok_or(Error::AllocationFailed {
                allocator: self.allocator(),
                size: layout.total_size() as usize,
            })?;
        planar.pack(&layout, data)?;

        self.core.replace(info, handle, Family::Yuv)?;
        self.layout = layout;
        Ok(())
    }

    fn planar(&self) -> Result<Planar> {
        Planar::unpack(&self.layout, self.data()?)
    }
}

impl PixelTransformable for YuvImageBuffer {
    fn scale(&mut self, x: f32, y: f32, anti_aliasing: Option<AntiAliasing>) -> Result<()> {
        self.core.check_editable()?;
        let src = self.info().size;
        let dst = destination_size(src, x, y)?;
        let filter = resolve_anti_aliasing(anti_aliasing, src).filter();

        let planar = self.planar()?;
        let sample = planar.sample;
        let scaled = planar.map(dst.width as usize, dst.height as usize, |src, dst, _| {
            resample(src, dst, sample, filter)
        })?;

        let scaled = match (x < 0.0, y < 0.0) {
            (false, false) => scaled,
            (mirror_x, mirror_y) => scaled.map(scaled.width, scaled.height, |src, dst, _| {
                if mirror_x && mirror_y {
                    rotate_quarter(src, dst, sample, Quarter::Half)
                } else if mirror_x {
                    mirror(src, dst, sample)
                } else {
                    flip_rows(src, dst, true)
                }
            })?,
        };

        self.adopt(&scaled)?;
        debug!(id = self.unique_id(), ?src, ?dst, ?filter, "scaled yuv image");
        Ok(())
    }

    fn rotate(&mut self, degrees: f32) -> Result<()> {
        self.core.check_editable()?;
        let quarter = Quarter::from_degrees(degrees)
            .ok_or(Error::InvalidParameter("yuv images rotate by multiples of 90 degrees"))?;
        if quarter == Quarter::Zero {
            return Ok(());
        }

        let planar = self.planar()?;
        let sample = planar.sample;
        let (width, height) = match quarter {
            Quarter::Ninety | Quarter::TwoSeventy => (planar.height, planar.width),
            _ => (planar.width, planar.height),
        };

        let rotated = planar.map(width, height, |src, dst, _| rotate_quarter(src, dst, sample, quarter))?;
        self.adopt(&rotated)?;
        debug!(id = self.unique_id(), degrees, width, height, "rotated yuv image");
        Ok(())
    }

    fn flip(&mut self, x_axis: bool, y_axis: bool) -> Result<()> {
        if !x_axis && !y_axis {
            return self.core.check_editable();
        }

        let x = if x_axis { -1.0 } else { 1.0 };
        let y = if y_axis { -1.0 } else { 1.0 };
        self.scale(x, y, Some(AntiAliasing::None))
    }

    fn translate(&mut self, x: f32, y: f32) -> Result<()> {
        self.core.check_editable()?;
        let (dx, dy) = super::translation(x, y)?;
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        let planar = self.planar()?;
        let sample = planar.sample;
        let moved = planar.map(planar.width, planar.height, |src, dst, chroma| {
            if chroma {
                fill_sample(dst, sample, UV_DEFAULT)?;
                plane::translate_plane(src, dst, dx.div_euclid(2), dy.div_euclid(2))?;
            } else {
                fill_sample(dst, sample, Y_DEFAULT)?;
                plane::translate_plane(src, dst, dx, dy)?;
            }
            Ok(())
        })?;

        self.adopt(&moved)?;
        debug!(id = self.unique_id(), dx, dy, "translated yuv image");
        Ok(())
    }

    fn crop(&mut self, rect: Rect) -> Result<()> {
        self.core.check_editable()?;
        let size = self.info().size;
        if !rect.is_within(size) {
            return Err(Error::InvalidParameter("crop rectangle exceeds the image"));
        }

        if rect == Rect::of_size(size) {
            return Ok(());
        }

        let planar = self.planar()?;
        let (left, top) = (rect.left as usize, rect.top as usize);
        let (width, height) = (rect.width as usize, rect.height as usize);
        let cropped = planar.map(width, height, |src, dst, chroma| {
            let window = if chroma {
                src.sub(left / 2, top / 2, dst.width(), dst.height())
            } else {
                src.sub(left, top, width, height)
            };
            let window = window.ok_or(Error::InvalidParameter("crop rectangle exceeds the image"))?;
            copy_plane(window, dst)?;
            Ok(())
        })?;

        self.adopt(&cropped)?;
        debug!(id = self.unique_id(), ?rect, "cropped yuv image");
        Ok(())
    }

    fn apply_color_space(&mut self, space: pixmap_texel::ColorSpace) -> Result<()> {
        self.core.check_editable()?;
        let Some(conversion) = super::conversion(self.color_profile(), self.color_space(), space)? else {
            self.set_color_profile(space);
            return Ok(());
        };

        let mut bgra = planes_to_bgra(&self.layout, self.data()?);
        for pixel in bgra.chunks_exact_mut(4) {
            let converted = conversion.convert_bgra([pixel[0], pixel[1], pixel[2], pixel[3]]);
            pixel.copy_from_slice(&converted);
        }

        let mut info = *self.info();
        info.color_space = space;
        let (mut handle, layout) = self.allocate_target(&info)?;
        let data = handle.bytes_mut().ok_or(Error::ConvertFailed("destination is read-only"))?;
        bgra_to_planes(&layout, &bgra, data);

        self.core.replace(info, handle, Family::Yuv)?;
        self.layout = layout;
        debug!(id = self.unique_id(), ?space, "converted yuv color space");
        Ok(())
    }
}
