//! Primitive algorithms on single planes.
//!
//! All of these take explicit strided views, never bare widths. The element type `T` is the
//! unit that moves as a whole: a `u8` luma sample, a `[u8; 2]` chroma pair or 16-bit sample, a
//! `[u8; 4]` pixel, and so on. Views whose rows are not a whole number of `T` are rejected.
use bytemuck::Pod;
use core::fmt;

use crate::stride::{PlaneMut, PlaneRef};

/// Planes passed to an algorithm do not fit together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneMismatch {
    _private: (),
}

impl PlaneMismatch {
    pub(crate) const NO_INFO: Self = PlaneMismatch { _private: () };
}

impl fmt::Display for PlaneMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("plane geometries do not match")
    }
}

fn texels<T: Pod>(row: &[u8]) -> Result<&[T], PlaneMismatch> {
    bytemuck::try_cast_slice(row).map_err(|_| PlaneMismatch::NO_INFO)
}

fn texels_mut<T: Pod>(row: &mut [u8]) -> Result<&mut [T], PlaneMismatch> {
    bytemuck::try_cast_slice_mut(row).map_err(|_| PlaneMismatch::NO_INFO)
}

fn check_element<T>(element: usize) -> Result<(), PlaneMismatch> {
    if core::mem::size_of::<T>() == element {
        Ok(())
    } else {
        Err(PlaneMismatch::NO_INFO)
    }
}

fn same_size(src: &PlaneRef<'_>, dst: &PlaneMut<'_>) -> Result<(), PlaneMismatch> {
    if src.width() == dst.width() && src.height() == dst.height() {
        Ok(())
    } else {
        Err(PlaneMismatch::NO_INFO)
    }
}

/// Copy all rows of one plane into another of the same size.
pub fn copy_plane(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>) -> Result<(), PlaneMismatch> {
    same_size(&src, dst)?;
    if src.spec().element != dst.spec().element {
        return Err(PlaneMismatch::NO_INFO);
    }

    for (y, row) in src.rows().enumerate() {
        dst.row_mut(y).copy_from_slice(row);
    }

    Ok(())
}

/// Copy all rows, bottom row first.
pub fn copy_plane_flipped(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>) -> Result<(), PlaneMismatch> {
    same_size(&src, dst)?;
    if src.spec().element != dst.spec().element {
        return Err(PlaneMismatch::NO_INFO);
    }

    for (y, row) in src.rows().rev().enumerate() {
        dst.row_mut(y).copy_from_slice(row);
    }

    Ok(())
}

/// Reverse the order of elements of a row.
pub fn mirror_row<T: Copy>(src: &[T], dst: &mut [T]) {
    for (target, source) in dst.iter_mut().zip(src.iter().rev()) {
        *target = *source;
    }
}

/// Mirror every row of a plane horizontally.
pub fn mirror_plane<T: Pod>(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>) -> Result<(), PlaneMismatch> {
    same_size(&src, dst)?;
    check_element::<T>(src.spec().element)?;
    check_element::<T>(dst.spec().element)?;

    for (y, row) in src.rows().enumerate() {
        mirror_row(texels::<T>(row)?, texels_mut::<T>(dst.row_mut(y))?);
    }

    Ok(())
}

/// Interleave two planes into one plane of pairs.
///
/// The first plane lands at the even positions. Both planes must have the size of the pair
/// plane, each element of which is twice the size of `T`.
pub fn merge_uv<T: Pod>(
    first: PlaneRef<'_>,
    second: PlaneRef<'_>,
    pairs: &mut PlaneMut<'_>,
) -> Result<(), PlaneMismatch> {
    same_size(&first, pairs)?;
    same_size(&second, pairs)?;
    check_element::<T>(first.spec().element)?;
    check_element::<T>(second.spec().element)?;
    check_element::<[T; 2]>(pairs.spec().element)?;

    for y in 0..pairs.height() {
        let a = texels::<T>(first.row(y))?;
        let b = texels::<T>(second.row(y))?;
        let out = texels_mut::<T>(pairs.row_mut(y))?;

        // Two pairs per step, an odd last pair is copied directly.
        let mut out_chunks = out.chunks_exact_mut(4);
        let mut a_chunks = a.chunks_exact(2);
        let mut b_chunks = b.chunks_exact(2);
        for ((out, a), b) in (&mut out_chunks).zip(&mut a_chunks).zip(&mut b_chunks) {
            out[0] = a[0];
            out[1] = b[0];
            out[2] = a[1];
            out[3] = b[1];
        }

        let out = out_chunks.into_remainder();
        if let ([a, ..], [b, ..]) = (a_chunks.remainder(), b_chunks.remainder()) {
            out[0] = *a;
            out[1] = *b;
        }
    }

    Ok(())
}

/// De-interleave a plane of pairs into two planes.
pub fn split_uv<T: Pod>(
    pairs: PlaneRef<'_>,
    first: &mut PlaneMut<'_>,
    second: &mut PlaneMut<'_>,
) -> Result<(), PlaneMismatch> {
    same_size(&pairs, first)?;
    same_size(&pairs, second)?;
    check_element::<[T; 2]>(pairs.spec().element)?;
    check_element::<T>(first.spec().element)?;
    check_element::<T>(second.spec().element)?;

    for (y, row) in pairs.rows().enumerate() {
        let row = texels::<[T; 2]>(row)?;
        for (target, pair) in texels_mut::<T>(first.row_mut(y))?.iter_mut().zip(row) {
            *target = pair[0];
        }
        for (target, pair) in texels_mut::<T>(second.row_mut(y))?.iter_mut().zip(row) {
            *target = pair[1];
        }
    }

    Ok(())
}

/// Write the transpose of `src` into `dst`, walking the source in blocks of eight rows.
///
/// With `bottom_up_src` the source rows are visited last to first, which turns the transpose
/// into a clockwise rotation. With `bottom_up_dst` the destination rows are filled last to
/// first, a counter-clockwise rotation.
fn transpose_oriented<T: Pod>(
    src: PlaneRef<'_>,
    dst: &mut PlaneMut<'_>,
    bottom_up_src: bool,
    bottom_up_dst: bool,
) -> Result<(), PlaneMismatch> {
    const BLOCK: usize = 8;

    if src.width() != dst.height() || src.height() != dst.width() {
        return Err(PlaneMismatch::NO_INFO);
    }

    check_element::<T>(src.spec().element)?;
    check_element::<T>(dst.spec().element)?;

    let height = src.height();
    let width = src.width();
    let mut block_start = 0;

    while block_start < height {
        let block_len = BLOCK.min(height - block_start);
        let mut rows: [&[T]; BLOCK] = [&[]; BLOCK];

        for (i, row) in rows.iter_mut().take(block_len).enumerate() {
            let y = block_start + i;
            let source_y = if bottom_up_src { height - 1 - y } else { y };
            *row = texels::<T>(src.row(source_y))?;
        }

        for x in 0..width {
            let target_y = if bottom_up_dst { width - 1 - x } else { x };
            let target = texels_mut::<T>(dst.row_mut(target_y))?;
            for (i, row) in rows.iter().take(block_len).enumerate() {
                target[block_start + i] = row[x];
            }
        }

        block_start += block_len;
    }

    Ok(())
}

/// Swap rows and columns.
pub fn transpose_plane<T: Pod>(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>) -> Result<(), PlaneMismatch> {
    transpose_oriented::<T>(src, dst, false, false)
}

/// Rotate clockwise by a quarter turn, `dst` has the swapped dimensions.
pub fn rotate_plane_90<T: Pod>(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>) -> Result<(), PlaneMismatch> {
    transpose_oriented::<T>(src, dst, true, false)
}

/// Rotate by a half turn, mirroring both axes.
pub fn rotate_plane_180<T: Pod>(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>) -> Result<(), PlaneMismatch> {
    same_size(&src, dst)?;
    check_element::<T>(src.spec().element)?;
    check_element::<T>(dst.spec().element)?;

    let mut scratch = alloc::vec::Vec::with_capacity(src.width());
    for (y, row) in src.rows().rev().enumerate() {
        scratch.clear();
        scratch.extend_from_slice(texels::<T>(row)?);
        mirror_row(&scratch, texels_mut::<T>(dst.row_mut(y))?);
    }

    Ok(())
}

/// Rotate clockwise by three quarter turns, `dst` has the swapped dimensions.
pub fn rotate_plane_270<T: Pod>(src: PlaneRef<'_>, dst: &mut PlaneMut<'_>) -> Result<(), PlaneMismatch> {
    transpose_oriented::<T>(src, dst, false, true)
}

/// Set every element of a plane to one value.
pub fn fill_plane<T: Pod>(dst: &mut PlaneMut<'_>, value: T) -> Result<(), PlaneMismatch> {
    check_element::<T>(dst.spec().element)?;
    for y in 0..dst.height() {
        texels_mut::<T>(dst.row_mut(y))?.fill(value);
    }

    Ok(())
}

/// Copy `src` shifted by `(dx, dy)` elements into `dst`.
///
/// Elements moved outside are dropped. Elements of `dst` not covered are left untouched.
pub fn translate_plane(
    src: PlaneRef<'_>,
    dst: &mut PlaneMut<'_>,
    dx: i64,
    dy: i64,
) -> Result<(), PlaneMismatch> {
    same_size(&src, dst)?;
    let element = src.spec().element;
    if element != dst.spec().element {
        return Err(PlaneMismatch::NO_INFO);
    }

    let width = src.width() as i64;
    let height = src.height() as i64;
    // Column range in the source that stays visible.
    let src_x0 = (-dx).clamp(0, width);
    let src_x1 = (width - dx).clamp(0, width);
    if src_x0 >= src_x1 {
        return Ok(());
    }

    let dst_x0 = (src_x0 + dx) as usize * element;
    let span = (src_x1 - src_x0) as usize * element;
    let src_x0 = src_x0 as usize * element;

    for y in 0..height {
        let target_y = y + dy;
        if !(0..height).contains(&target_y) {
            continue;
        }

        let row = &src.row(y as usize)[src_x0..src_x0 + span];
        dst.row_mut(target_y as usize)[dst_x0..dst_x0 + span].copy_from_slice(row);
    }

    Ok(())
}

/// Convert a semi-planar chroma plane with U first into two planar chroma planes.
pub fn nv12_to_i420<T: Pod>(
    y: PlaneRef<'_>,
    uv: PlaneRef<'_>,
    dst_y: &mut PlaneMut<'_>,
    dst_u: &mut PlaneMut<'_>,
    dst_v: &mut PlaneMut<'_>,
) -> Result<(), PlaneMismatch> {
    copy_plane(y, dst_y)?;
    split_uv::<T>(uv, dst_u, dst_v)
}

/// Convert a semi-planar chroma plane with V first into two planar chroma planes.
pub fn nv21_to_i420<T: Pod>(
    y: PlaneRef<'_>,
    vu: PlaneRef<'_>,
    dst_y: &mut PlaneMut<'_>,
    dst_u: &mut PlaneMut<'_>,
    dst_v: &mut PlaneMut<'_>,
) -> Result<(), PlaneMismatch> {
    copy_plane(y, dst_y)?;
    split_uv::<T>(vu, dst_v, dst_u)
}

/// Interleave planar chroma, U first.
pub fn i420_to_nv12<T: Pod>(
    y: PlaneRef<'_>,
    u: PlaneRef<'_>,
    v: PlaneRef<'_>,
    dst_y: &mut PlaneMut<'_>,
    dst_uv: &mut PlaneMut<'_>,
) -> Result<(), PlaneMismatch> {
    copy_plane(y, dst_y)?;
    merge_uv::<T>(u, v, dst_uv)
}

/// Interleave planar chroma, V first.
pub fn i420_to_nv21<T: Pod>(
    y: PlaneRef<'_>,
    u: PlaneRef<'_>,
    v: PlaneRef<'_>,
    dst_y: &mut PlaneMut<'_>,
    dst_vu: &mut PlaneMut<'_>,
) -> Result<(), PlaneMismatch> {
    copy_plane(y, dst_y)?;
    merge_uv::<T>(v, u, dst_vu)
}
