//! Rotation by arbitrary angles.
//!
//! Quarter turns are handled exactly by the plane primitives. Any other angle maps every
//! destination pixel back into the source and interpolates bilinearly, with everything outside
//! of the source reading as zero.
use crate::plane::PlaneMismatch;
use crate::resample::Sample;
use crate::stride::{PlaneMut, PlaneRef};

/// A clockwise rotation about the center of a plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation {
    cos: f32,
    sin: f32,
}

impl Rotation {
    pub fn from_degrees(degrees: f32) -> Self {
        let radians = degrees.to_radians();
        Rotation {
            cos: libm::cosf(radians),
            sin: libm::sinf(radians),
        }
    }

    /// The size of the bounding box of a rotated `width` by `height` rectangle.
    pub fn bounding_size(&self, width: usize, height: usize) -> (usize, usize) {
        let (w, h) = (width as f32, height as f32);
        let (cos, sin) = (self.cos.abs(), self.sin.abs());
        // Absorb rounding noise so that exact sizes are not bumped up by one.
        let round = |v: f32| libm::ceilf(v - 1e-3).max(1.0) as usize;
        (round(w * cos + h * sin), round(w * sin + h * cos))
    }

    /// Render `src` rotated into `dst`, centered.
    pub fn apply<S: Sample>(
        &self,
        src: PlaneRef<'_>,
        dst: &mut PlaneMut<'_>,
        channels: usize,
    ) -> Result<(), PlaneMismatch> {
        let element = channels * S::BYTES;
        if channels == 0 || src.spec().element != element || dst.spec().element != element {
            return Err(PlaneMismatch::NO_INFO);
        }

        let src_w = src.width() as i64;
        let src_h = src.height() as i64;
        let src_cx = src.width() as f32 / 2.0;
        let src_cy = src.height() as f32 / 2.0;
        let dst_cx = dst.width() as f32 / 2.0;
        let dst_cy = dst.height() as f32 / 2.0;

        let fetch = |x: i64, y: i64, c: usize| -> f32 {
            if x < 0 || y < 0 || x >= src_w || y >= src_h {
                return 0.0;
            }

            let row = src.row(y as usize);
            S::load(&row[x as usize * element + c * S::BYTES..])
        };

        for y in 0..dst.height() {
            let target = dst.row_mut(y);
            let dy = y as f32 + 0.5 - dst_cy;

            for x in 0..target.len() / element {
                let dx = x as f32 + 0.5 - dst_cx;
                let sx = self.cos * dx + self.sin * dy + src_cx - 0.5;
                let sy = -self.sin * dx + self.cos * dy + src_cy - 0.5;

                let x0 = libm::floorf(sx);
                let y0 = libm::floorf(sy);
                let fx = sx - x0;
                let fy = sy - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);

                for c in 0..channels {
                    let top = fetch(x0, y0, c) * (1.0 - fx) + fetch(x0 + 1, y0, c) * fx;
                    let bottom = fetch(x0, y0 + 1, c) * (1.0 - fx) + fetch(x0 + 1, y0 + 1, c) * fx;
                    let value = top * (1.0 - fy) + bottom * fy;
                    S::store(value, &mut target[x * element + c * S::BYTES..]);
                }
            }
        }

        Ok(())
    }
}

#[test]
fn bounding_boxes() {
    let quarter = Rotation::from_degrees(90.0);
    assert_eq!(quarter.bounding_size(4, 2), (2, 4));

    let eighth = Rotation::from_degrees(45.0);
    let (w, h) = eighth.bounding_size(10, 10);
    assert_eq!((w, h), (15, 15));
}
