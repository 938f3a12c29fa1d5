//! Separable resampling of planes with interleaved channels.
use alloc::vec::Vec;

use crate::plane::PlaneMismatch;
use crate::stride::{PlaneMut, PlaneRef};

/// The kernel used to compute a destination sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    /// The nearest source sample.
    Nearest,
    /// Linear interpolation along rows only, nearest between rows.
    Linear,
    /// Linear interpolation along both axes.
    Bilinear,
    /// Area average when shrinking, bilinear when enlarging.
    Box,
}

/// A numeric sample type that can be resampled.
pub trait Sample: Copy {
    const BYTES: usize;
    const MAX: f32;

    fn load(bytes: &[u8]) -> f32;
    fn store(value: f32, bytes: &mut [u8]);
}

impl Sample for u8 {
    const BYTES: usize = 1;
    const MAX: f32 = 255.0;

    fn load(bytes: &[u8]) -> f32 {
        f32::from(bytes[0])
    }

    fn store(value: f32, bytes: &mut [u8]) {
        bytes[0] = libm::roundf(value.clamp(0.0, <Self as Sample>::MAX)) as u8;
    }
}

/// Little-endian 16-bit samples, as in P010 planes.
impl Sample for u16 {
    const BYTES: usize = 2;
    const MAX: f32 = 65535.0;

    fn load(bytes: &[u8]) -> f32 {
        f32::from(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn store(value: f32, bytes: &mut [u8]) {
        let value = libm::roundf(value.clamp(0.0, <Self as Sample>::MAX)) as u16;
        bytes[..2].copy_from_slice(&value.to_le_bytes());
    }
}

/// The source samples contributing to one destination sample along one axis.
struct Taps {
    start: usize,
    weights: Vec<f32>,
}

const MAX_CHANNELS: usize = 8;

fn nearest(dst: usize, scale: f32, len: usize) -> Taps {
    let at = libm::floorf((dst as f32 + 0.5) * scale) as usize;
    Taps {
        start: at.min(len - 1),
        weights: alloc::vec![1.0],
    }
}

fn linear(dst: usize, scale: f32, len: usize) -> Taps {
    let center = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
    let left = (libm::floorf(center) as usize).min(len - 1);
    if left + 1 >= len {
        return Taps {
            start: left,
            weights: alloc::vec![1.0],
        };
    }

    let frac = center - left as f32;
    Taps {
        start: left,
        weights: alloc::vec![1.0 - frac, frac],
    }
}

fn area(dst: usize, scale: f32, len: usize) -> Taps {
    let left = dst as f32 * scale;
    let right = ((dst + 1) as f32 * scale).min(len as f32);
    let first = (libm::floorf(left) as usize).min(len - 1);
    let last = (libm::ceilf(right) as usize).clamp(first + 1, len);

    let mut weights: Vec<f32> = (first..last)
        .map(|i| {
            let lo = left.max(i as f32);
            let hi = right.min((i + 1) as f32);
            (hi - lo).max(0.0)
        })
        .collect();

    let total: f32 = weights.iter().sum();
    if total > 0.0 {
        weights.iter_mut().for_each(|w| *w /= total);
    } else {
        weights.iter_mut().for_each(|w| *w = 0.0);
        weights[0] = 1.0;
    }

    Taps {
        start: first,
        weights,
    }
}

fn axis_taps(filter: Filter, vertical: bool, src_len: usize, dst_len: usize) -> Vec<Taps> {
    let scale = src_len as f32 / dst_len as f32;
    (0..dst_len)
        .map(|dst| match filter {
            Filter::Nearest => nearest(dst, scale, src_len),
            Filter::Linear if vertical => nearest(dst, scale, src_len),
            Filter::Linear | Filter::Bilinear => linear(dst, scale, src_len),
            Filter::Box if scale > 1.0 => area(dst, scale, src_len),
            Filter::Box => linear(dst, scale, src_len),
        })
        .collect()
}

/// Resample `src` into the size of `dst`.
///
/// Each element consists of `channels` samples of type `S` which are filtered independently.
pub fn resample_plane<S: Sample>(
    src: PlaneRef<'_>,
    dst: &mut PlaneMut<'_>,
    channels: usize,
    filter: Filter,
) -> Result<(), PlaneMismatch> {
    let element = channels * S::BYTES;
    if channels == 0
        || channels > MAX_CHANNELS
        || src.spec().element != element
        || dst.spec().element != element
        || src.width() == 0
        || src.height() == 0
    {
        return Err(PlaneMismatch::NO_INFO);
    }

    let x_taps = axis_taps(filter, false, src.width(), dst.width());
    let y_taps = axis_taps(filter, true, src.height(), dst.height());

    for (y, y_tap) in y_taps.iter().enumerate() {
        let target = dst.row_mut(y);
        for (x, x_tap) in x_taps.iter().enumerate() {
            let mut acc = [0.0f32; MAX_CHANNELS];

            for (j, wy) in y_tap.weights.iter().enumerate() {
                let row = src.row(y_tap.start + j);
                for (i, wx) in x_tap.weights.iter().enumerate() {
                    let weight = wy * wx;
                    let at = (x_tap.start + i) * element;
                    for (c, acc) in acc.iter_mut().take(channels).enumerate() {
                        *acc += weight * S::load(&row[at + c * S::BYTES..]);
                    }
                }
            }

            let at = x * element;
            for (c, acc) in acc.iter().take(channels).enumerate() {
                S::store(*acc, &mut target[at + c * S::BYTES..]);
            }
        }
    }

    Ok(())
}

#[test]
fn nearest_halves() {
    use crate::stride::PlaneSpec;

    let data: [u8; 16] = core::array::from_fn(|i| i as u8);
    let src = PlaneRef::new(&data, PlaneSpec::packed(4, 4, 1)).unwrap();
    let mut out = [0u8; 4];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(2, 2, 1)).unwrap();
    resample_plane::<u8>(src, &mut dst, 1, Filter::Nearest).unwrap();
    assert_eq!(out, [5, 7, 13, 15]);
}

#[test]
fn box_averages() {
    use crate::stride::PlaneSpec;

    let data = [0u8, 10, 20, 30, 40, 50, 60, 70];
    let src = PlaneRef::new(&data, PlaneSpec::packed(4, 2, 1)).unwrap();
    let mut out = [0u8; 2];
    let mut dst = PlaneMut::new(&mut out, PlaneSpec::packed(2, 1, 1)).unwrap();
    resample_plane::<u8>(src, &mut dst, 1, Filter::Box).unwrap();
    assert_eq!(out, [25, 45]);
}
