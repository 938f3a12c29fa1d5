use crate::plane::{self, PlaneMismatch};
use crate::resample::{resample_plane, Filter};
use crate::{BadStrideError, PixelFormat, PlaneMut, PlaneRef, PlaneSpec, YuvPlaneLayout};

#[derive(Debug)]
enum TestError {
    Stride(BadStrideError),
    Plane(PlaneMismatch),
}

impl From<BadStrideError> for TestError {
    fn from(err: BadStrideError) -> Self {
        TestError::Stride(err)
    }
}

impl From<PlaneMismatch> for TestError {
    fn from(err: PlaneMismatch) -> Self {
        TestError::Plane(err)
    }
}

/// A 3 by 2 plane of distinct bytes:
///
/// ```text
/// 1 2 3
/// 4 5 6
/// ```
const SMALL: [u8; 6] = [1, 2, 3, 4, 5, 6];

#[test]
fn quarter_turns() -> Result<(), TestError> {
    let src = PlaneRef::new(&SMALL, PlaneSpec::packed(3, 2, 1))?;

    let mut out = [0u8; 6];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(2, 3, 1))?;
    plane::rotate_plane_90::<u8>(src, &mut dst)?;
    assert_eq!(out, [4, 1, 5, 2, 6, 3]);

    let mut out = [0u8; 6];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(2, 3, 1))?;
    plane::rotate_plane_270::<u8>(src, &mut dst)?;
    assert_eq!(out, [3, 6, 2, 5, 1, 4]);

    let mut out = [0u8; 6];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(3, 2, 1))?;
    plane::rotate_plane_180::<u8>(src, &mut dst)?;
    assert_eq!(out, [6, 5, 4, 3, 2, 1]);

    let mut out = [0u8; 6];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(2, 3, 1))?;
    plane::transpose_plane::<u8>(src, &mut dst)?;
    assert_eq!(out, [1, 4, 2, 5, 3, 6]);

    Ok(())
}

#[test]
fn transpose_beyond_one_block() -> Result<(), TestError> {
    // Taller than the eight-row block, with a stride padded past the row.
    let data: [u8; 44] = core::array::from_fn(|i| i as u8);
    let spec = PlaneSpec::packed(3, 11, 1).with_stride(4);
    let src = PlaneRef::new(&data, spec)?;

    let mut out = [0u8; 33];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(11, 3, 1))?;
    plane::transpose_plane::<u8>(src, &mut dst)?;

    for y in 0..11 {
        for x in 0..3 {
            assert_eq!(out[x * 11 + y], data[y * 4 + x]);
        }
    }

    Ok(())
}

#[test]
fn four_rotations_are_identity() -> Result<(), TestError> {
    let data: [u8; 35] = core::array::from_fn(|i| (i * 7) as u8);
    let mut a = data;
    let mut b = [0u8; 35];

    let mut wide = (7, 5);
    for _ in 0..4 {
        let src = PlaneRef::new(&a, PlaneSpec::packed(wide.0, wide.1, 1))?;
        let mut dst = PlaneMut::new(&mut b, PlaneSpec::packed(wide.1, wide.0, 1))?;
        plane::rotate_plane_90::<u8>(src, &mut dst)?;
        core::mem::swap(&mut a, &mut b);
        wide = (wide.1, wide.0);
    }

    assert_eq!(a, data);
    Ok(())
}

#[test]
fn merge_split_odd_width() -> Result<(), TestError> {
    let u = [1u8, 2, 3];
    let v = [7u8, 8, 9];
    let mut pairs = [0u8; 6];

    {
        let u = PlaneRef::new(&u, PlaneSpec::packed(3, 1, 1))?;
        let v = PlaneRef::new(&v, PlaneSpec::packed(3, 1, 1))?;
        let mut uv = PlaneMut::new(&mut pairs, PlaneSpec::packed(3, 1, 2))?;
        plane::merge_uv::<u8>(u, v, &mut uv)?;
    }
    assert_eq!(pairs, [1, 7, 2, 8, 3, 9]);

    let mut first = [0u8; 3];
    let mut second = [0u8; 3];
    {
        let uv = PlaneRef::new(&pairs, PlaneSpec::packed(3, 1, 2))?;
        let mut u = PlaneMut::new(&mut first, PlaneSpec::packed(3, 1, 1))?;
        let mut v = PlaneMut::new(&mut second, PlaneSpec::packed(3, 1, 1))?;
        plane::split_uv::<u8>(uv, &mut u, &mut v)?;
    }
    assert_eq!(first, u);
    assert_eq!(second, v);

    Ok(())
}

#[test]
fn mirror_moves_whole_pixels() -> Result<(), TestError> {
    let data = [1u8, 2, 3, 4, 5, 6];
    let src = PlaneRef::new(&data, PlaneSpec::packed(3, 1, 2))?;
    let mut out = [0u8; 6];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(3, 1, 2))?;
    plane::mirror_plane::<[u8; 2]>(src, &mut dst)?;
    assert_eq!(out, [5, 6, 3, 4, 1, 2]);

    // The element type must match the plane.
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(3, 1, 2))?;
    assert!(plane::mirror_plane::<u8>(src, &mut dst).is_err());
    Ok(())
}

#[test]
fn translate_drops_and_keeps() -> Result<(), TestError> {
    let src = PlaneRef::new(&SMALL, PlaneSpec::packed(3, 2, 1))?;
    let mut out = [0u8; 6];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(3, 2, 1))?;
    plane::translate_plane(src, &mut dst, 1, 1)?;
    assert_eq!(out, [0, 0, 0, 0, 1, 2]);

    let mut out = [9u8; 6];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(3, 2, 1))?;
    plane::translate_plane(src, &mut dst, -2, 0)?;
    assert_eq!(out, [3, 9, 9, 6, 9, 9]);

    let mut out = [9u8; 6];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(3, 2, 1))?;
    plane::translate_plane(src, &mut dst, 3, 0)?;
    assert_eq!(out, [9; 6]);
    Ok(())
}

#[test]
fn semi_planar_bridges() -> Result<(), TestError> {
    // A 4x2 NV12 buffer, luma followed by two chroma pairs.
    let layout = YuvPlaneLayout::tight(PixelFormat::Nv12, 4, 2).map_err(|_| PlaneMismatch::NO_INFO)?;
    let data = [10u8, 11, 12, 13, 14, 15, 16, 17, 100, 200, 101, 201];
    assert_eq!(layout.total_size(), data.len() as u64);

    let y = PlaneRef::new(&data, layout.luma())?;
    let uv = PlaneRef::new(&data, layout.chroma_pairs().ok_or(PlaneMismatch::NO_INFO)?)?;

    let mut dst_y = [0u8; 8];
    let mut dst_u = [0u8; 2];
    let mut dst_v = [0u8; 2];
    plane::nv12_to_i420::<u8>(
        y,
        uv,
        &mut PlaneMut::new(&mut dst_y, PlaneSpec::packed(4, 2, 1))?,
        &mut PlaneMut::new(&mut dst_u, PlaneSpec::packed(2, 1, 1))?,
        &mut PlaneMut::new(&mut dst_v, PlaneSpec::packed(2, 1, 1))?,
    )?;
    assert_eq!(dst_y, data[..8]);
    assert_eq!(dst_u, [100, 101]);
    assert_eq!(dst_v, [200, 201]);

    let mut vu = [0u8; 4];
    let mut dst_y2 = [0u8; 8];
    plane::i420_to_nv21::<u8>(
        PlaneRef::new(&dst_y, PlaneSpec::packed(4, 2, 1))?,
        PlaneRef::new(&dst_u, PlaneSpec::packed(2, 1, 1))?,
        PlaneRef::new(&dst_v, PlaneSpec::packed(2, 1, 1))?,
        &mut PlaneMut::new(&mut dst_y2, PlaneSpec::packed(4, 2, 1))?,
        &mut PlaneMut::new(&mut vu, PlaneSpec::packed(2, 1, 2))?,
    )?;
    assert_eq!(vu, [200, 100, 201, 101]);

    Ok(())
}

#[test]
fn bilinear_sixteen_bit() -> Result<(), TestError> {
    let samples: [u16; 2] = [0, 1000];
    let data: [u8; 4] = bytemuck::cast(samples.map(u16::to_le));
    let src = PlaneRef::new(&data, PlaneSpec::packed(2, 1, 2))?;

    let mut out = [0u8; 8];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(4, 1, 2))?;
    resample_plane::<u16>(src, &mut dst, 1, Filter::Bilinear)?;

    let out: [u16; 4] = bytemuck::cast(out);
    let out = out.map(u16::from_le);
    assert_eq!(out, [0, 250, 750, 1000]);
    Ok(())
}

#[test]
fn fill_two_byte_elements() -> Result<(), TestError> {
    let mut data = [0u8; 12];
    let spec = PlaneSpec::packed(2, 2, 2).with_stride(6);
    let mut dst = PlaneMut::new(&mut data, spec)?;
    plane::fill_plane::<[u8; 2]>(&mut dst, [0x10, 0x80])?;
    assert_eq!(data, [0x10, 0x80, 0x10, 0x80, 0, 0, 0x10, 0x80, 0x10, 0x80, 0, 0]);
    Ok(())
}
