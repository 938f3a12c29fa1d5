//! Per-pixel conversion between formats, with BGRA 8888 as the pivot.
//!
//! Packed formats decode through their [`ChannelDecode`] table. YUV pixels convert with the
//! BT.601 full range matrix, 10-bit samples contribute their top eight bits.
use crate::format::{ChannelDecode, PixelFormat, UnsupportedFormat};
use crate::yuv::YuvPlaneLayout;

/// Decode one pixel into `[b, g, r, a]`.
///
/// Absent color channels read as zero, an absent alpha channel as opaque.
pub fn decode_bgra(format: PixelFormat, pixel: &[u8]) -> Result<[u8; 4], UnsupportedFormat> {
    Ok(match format.channel_decode()? {
        ChannelDecode::Bytes {
            red,
            green,
            blue,
            alpha,
        } => {
            let at = |idx: Option<u8>, default: u8| idx.map_or(default, |i| pixel[usize::from(i)]);
            [at(blue, 0), at(green, 0), at(red, 0), at(alpha, 0xff)]
        }
        ChannelDecode::Rgb565 => {
            let value = u16::from_ne_bytes([pixel[0], pixel[1]]);
            let r = ((value >> 11) & 0x1f) as u8;
            let g = ((value >> 5) & 0x3f) as u8;
            let b = (value & 0x1f) as u8;
            [b << 3 | b >> 2, g << 2 | g >> 4, r << 3 | r >> 2, 0xff]
        }
        ChannelDecode::HalfFloat => {
            let channel = |i: usize| {
                let half = u16::from_ne_bytes([pixel[2 * i], pixel[2 * i + 1]]);
                unorm8(f16_to_f32(half))
            };
            [channel(2), channel(1), channel(0), channel(3)]
        }
    })
}

/// Encode `[b, g, r, a]` into one pixel of `format`.
pub fn encode_bgra(
    format: PixelFormat,
    bgra: [u8; 4],
    pixel: &mut [u8],
) -> Result<(), UnsupportedFormat> {
    let [b, g, r, a] = bgra;
    match format.channel_decode()? {
        ChannelDecode::Bytes {
            red,
            green,
            blue,
            alpha,
        } => {
            for (idx, value) in [(red, r), (green, g), (blue, b), (alpha, a)] {
                if let Some(idx) = idx {
                    pixel[usize::from(idx)] = value;
                }
            }
        }
        ChannelDecode::Rgb565 => {
            let value = u16::from(r >> 3) << 11 | u16::from(g >> 2) << 5 | u16::from(b >> 3);
            pixel[..2].copy_from_slice(&value.to_ne_bytes());
        }
        ChannelDecode::HalfFloat => {
            for (i, value) in [r, g, b, a].into_iter().enumerate() {
                let half = f32_to_f16(f32::from(value) / 255.0);
                pixel[2 * i..2 * i + 2].copy_from_slice(&half.to_ne_bytes());
            }
        }
    }

    Ok(())
}

/// Convert a row of `width` pixels between two packed formats.
pub fn convert_row(
    src_format: PixelFormat,
    src: &[u8],
    dst_format: PixelFormat,
    dst: &mut [u8],
    width: usize,
) -> Result<(), UnsupportedFormat> {
    let src_bpp = usize::from(src_format.bytes_per_pixel().unwrap_or(0));
    let dst_bpp = usize::from(dst_format.bytes_per_pixel().unwrap_or(0));
    if src_format == dst_format {
        let len = width * src_bpp;
        dst[..len].copy_from_slice(&src[..len]);
        return Ok(());
    }

    for x in 0..width {
        let bgra = decode_bgra(src_format, &src[x * src_bpp..])?;
        encode_bgra(dst_format, bgra, &mut dst[x * dst_bpp..])?;
    }

    Ok(())
}

fn unorm8(value: f32) -> u8 {
    libm::roundf(value.clamp(0.0, 1.0) * 255.0) as u8
}

/// Widen an IEEE 754 half float.
pub fn f16_to_f32(half: u16) -> f32 {
    let sign = u32::from(half & 0x8000) << 16;
    let exp = u32::from((half >> 10) & 0x1f);
    let mantissa = u32::from(half & 0x3ff);

    let bits = match (exp, mantissa) {
        (0, 0) => sign,
        (0, _) => {
            // Subnormal, renormalize.
            let shift = mantissa.leading_zeros() - 21;
            let mantissa = (mantissa << shift) & 0x3ff;
            sign | ((113 - shift) << 23) | (mantissa << 13)
        }
        (0x1f, _) => sign | 0x7f80_0000 | (mantissa << 13),
        _ => sign | ((exp + 112) << 23) | (mantissa << 13),
    };

    f32::from_bits(bits)
}

/// Narrow to an IEEE 754 half float, rounding to nearest.
pub fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x7f_ffff;

    if exp == 0xff {
        let nan = if mantissa != 0 { 0x200 } else { 0 };
        return sign | 0x7c00 | nan;
    }

    let exp = exp - 127 + 15;
    if exp >= 0x1f {
        return sign | 0x7c00;
    }

    if exp <= 0 {
        if exp < -10 {
            return sign;
        }

        let mantissa = mantissa | 0x80_0000;
        let shift = (14 - exp) as u32;
        let half = mantissa >> shift;
        let round = (mantissa >> (shift - 1)) & 1;
        return sign | (half + round) as u16;
    }

    let half = ((exp as u32) << 10) | (mantissa >> 13);
    let round = (mantissa >> 12) & 1;
    sign | (half + round) as u16
}

/// Convert one full range YUV triple to `[b, g, r, a]`.
pub fn yuv_to_bgra(y: u8, u: u8, v: u8) -> [u8; 4] {
    let y = f32::from(y);
    let u = f32::from(u) - 128.0;
    let v = f32::from(v) - 128.0;

    let clamp = |value: f32| libm::roundf(value.clamp(0.0, 255.0)) as u8;
    let r = clamp(y + 1.402 * v);
    let g = clamp(y - 0.344 * u - 0.714 * v);
    let b = clamp(y + 1.772 * u);
    [b, g, r, 0xff]
}

/// Convert `[b, g, r, _]` to a full range YUV triple.
pub fn bgra_to_yuv(bgra: [u8; 4]) -> (u8, u8, u8) {
    let [b, g, r, _] = bgra.map(f32::from);

    let clamp = |value: f32| libm::roundf(value.clamp(0.0, 255.0)) as u8;
    let y = clamp(0.299 * r + 0.587 * g + 0.114 * b);
    let u = clamp(-0.168_736 * r - 0.331_264 * g + 0.5 * b + 128.0);
    let v = clamp(0.5 * r - 0.418_688 * g - 0.081_312 * b + 128.0);
    (y, u, v)
}

/// Read the 8-bit value of the sample at `at`.
fn load8(data: &[u8], at: usize, sample: usize) -> u8 {
    if sample == 2 {
        data[at + 1]
    } else {
        data[at]
    }
}

fn store8(data: &mut [u8], at: usize, sample: usize, value: u8) {
    if sample == 2 {
        data[at..at + 2].copy_from_slice(&(u16::from(value) << 8).to_le_bytes());
    } else {
        data[at] = value;
    }
}

/// The YUV triple of the pixel at `(x, y)`, reduced to 8 bits.
pub fn load_yuv(layout: &YuvPlaneLayout, data: &[u8], x: u32, y: u32) -> (u8, u8, u8) {
    let sample = layout.sample_bytes();
    let (u_at, v_at) = layout.chroma_offsets(x, y);
    (
        load8(data, layout.luma_offset(x, y), sample),
        load8(data, u_at, sample),
        load8(data, v_at, sample),
    )
}

/// Store a YUV triple at `(x, y)`, which also sets the chroma of the whole 2x2 block.
pub fn store_yuv(layout: &YuvPlaneLayout, data: &mut [u8], x: u32, y: u32, yuv: (u8, u8, u8)) {
    let sample = layout.sample_bytes();
    let (u_at, v_at) = layout.chroma_offsets(x, y);
    store8(data, layout.luma_offset(x, y), sample, yuv.0);
    store8(data, u_at, sample, yuv.1);
    store8(data, v_at, sample, yuv.2);
}

/// Store only the luma sample at `(x, y)`.
pub fn store_luma(layout: &YuvPlaneLayout, data: &mut [u8], x: u32, y: u32, value: u8) {
    store8(data, layout.luma_offset(x, y), layout.sample_bytes(), value);
}

#[test]
fn rgb565_extremes() {
    let mut pixel = [0u8; 2];
    encode_bgra(PixelFormat::Rgb565, [0, 0, 0xff, 0xff], &mut pixel).unwrap();
    assert_eq!(u16::from_ne_bytes(pixel), 0xf800);
    assert_eq!(
        decode_bgra(PixelFormat::Rgb565, &pixel).unwrap(),
        [0, 0, 0xff, 0xff]
    );
}

#[test]
fn half_floats() {
    assert_eq!(f32_to_f16(1.0), 0x3c00);
    assert_eq!(f32_to_f16(0.5), 0x3800);
    assert_eq!(f32_to_f16(0.0), 0);
    assert_eq!(f16_to_f32(0x3c00), 1.0);
    assert_eq!(f16_to_f32(0xc000), -2.0);
    for value in [0u8, 1, 17, 128, 254, 255] {
        let half = f32_to_f16(f32::from(value) / 255.0);
        assert_eq!(unorm8(f16_to_f32(half)), value);
    }
}

#[test]
fn gray_is_neutral() {
    assert_eq!(yuv_to_bgra(100, 128, 128), [100, 100, 100, 0xff]);
    assert_eq!(bgra_to_yuv([100, 100, 100, 0xff]), (100, 128, 128));
}
