//! Tag, length, value records.
//!
//! A record is a sequence of entries `tag, varint(length), value` ended by [`Tag::End`]. Scalar
//! values are themselves varints. Rows of pixel data are always stored without padding.
use pixmap_texel::{AlphaType, ColorSpace, PixelFormat};
use tracing::{debug, warn};

use super::{build_from_tight, check_format, expected_size, ImageRef};
use crate::image::AnyImageBuffer;
use crate::info::{ImageInfo, Size};
use crate::memory::AllocatorKind;
use crate::{Error, Result};

/// The tags of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    End = 0,
    Width = 1,
    Height = 2,
    PixelFormat = 3,
    ColorSpace = 4,
    AlphaType = 5,
    BaseDensity = 6,
    Allocator = 7,
    Data = 8,
    Editable = 9,
}

/// Varints of 32-bit values need at most this many groups.
const MAX_VARINT_BYTES: usize = 5;

impl Tag {
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Tag::End,
            1 => Tag::Width,
            2 => Tag::Height,
            3 => Tag::PixelFormat,
            4 => Tag::ColorSpace,
            5 => Tag::AlphaType,
            6 => Tag::BaseDensity,
            7 => Tag::Allocator,
            8 => Tag::Data,
            9 => Tag::Editable,
            _ => return None,
        })
    }
}

fn varint_len(mut value: u32) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

fn write_varint(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn write_scalar(out: &mut Vec<u8>, tag: Tag, value: i32) {
    let value = value as u32;
    out.push(tag as u8);
    write_varint(out, varint_len(value) as u32);
    write_varint(out, value);
}

struct Reader<'a> {
    bytes: &'a [u8],
}

fn malformed(what: &'static str) -> Error {
    warn!(what, "malformed tlv record");
    Error::SerializationFailed(what)
}

impl<'a> Reader<'a> {
    fn byte(&mut self) -> Result<u8> {
        let (&first, rest) = self
            .bytes
            .split_first()
            .ok_or_else(|| malformed("record is truncated"))?;
        self.bytes = rest;
        Ok(first)
    }

    fn varint(&mut self) -> Result<u32> {
        let mut value = 0u32;
        for group in 0..MAX_VARINT_BYTES {
            let byte = self.byte()?;
            let bits = u32::from(byte & 0x7f);
            if group == MAX_VARINT_BYTES - 1 && bits > 0x0f {
                return Err(malformed("varint overflows"));
            }
            value |= bits << (7 * group);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(malformed("varint is too long"))
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.bytes.len() {
            return Err(malformed("length exceeds the record"));
        }
        let (value, rest) = self.bytes.split_at(len);
        self.bytes = rest;
        Ok(value)
    }

    fn scalar(&mut self, len: usize) -> Result<i32> {
        let mut value = Reader {
            bytes: self.bytes(len)?,
        };
        let scalar = value.varint()?;
        if !value.bytes.is_empty() {
            return Err(malformed("scalar has trailing bytes"));
        }
        Ok(scalar as i32)
    }
}

pub(crate) fn encode(image: ImageRef<'_>) -> Result<Vec<u8>> {
    let core = image.core();
    let info = core.info;
    let pixels = image.tight_bytes()?;
    let data_len = u32::try_from(pixels.len()).map_err(|_| Error::TooLarge("pixel data too large"))?;

    let mut out = Vec::with_capacity(pixels.len() + 64);
    write_scalar(&mut out, Tag::Width, info.size.width as i32);
    write_scalar(&mut out, Tag::Height, info.size.height as i32);
    write_scalar(&mut out, Tag::PixelFormat, info.pixel_format.to_raw());
    write_scalar(&mut out, Tag::ColorSpace, info.color_space.to_raw());
    write_scalar(&mut out, Tag::AlphaType, info.alpha_type.to_raw());
    write_scalar(&mut out, Tag::BaseDensity, info.base_density);
    write_scalar(&mut out, Tag::Allocator, core.allocator.to_raw());
    write_scalar(&mut out, Tag::Editable, i32::from(core.editable));
    out.push(Tag::Data as u8);
    write_varint(&mut out, data_len);
    out.extend_from_slice(&pixels);
    out.push(Tag::End as u8);

    debug!(id = core.unique_id(), len = out.len(), "encoded tlv record");
    Ok(out)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<AnyImageBuffer> {
    let mut reader = Reader { bytes };
    let mut width = None;
    let mut height = None;
    let mut format = None;
    let mut color_space = ColorSpace::Unknown;
    let mut alpha_type = AlphaType::Unknown;
    let mut base_density = 0;
    let mut allocator = AllocatorKind::Heap;
    let mut editable = true;
    let mut data = None;

    loop {
        let raw = reader.byte()?;
        if raw == Tag::End as u8 {
            break;
        }

        let len = reader.varint()? as usize;
        let Some(tag) = Tag::from_raw(raw) else {
            debug!(tag = raw, len, "skipping unknown tlv entry");
            reader.bytes(len)?;
            continue;
        };

        match tag {
            Tag::End => break,
            Tag::Width => width = Some(reader.scalar(len)?),
            Tag::Height => height = Some(reader.scalar(len)?),
            Tag::PixelFormat => {
                let raw = reader.scalar(len)?;
                format = Some(PixelFormat::from_raw(raw).ok_or_else(|| malformed("pixel format out of range"))?);
            }
            Tag::ColorSpace => {
                let raw = reader.scalar(len)?;
                color_space = ColorSpace::from_raw(raw).ok_or_else(|| malformed("color space out of range"))?;
            }
            Tag::AlphaType => {
                let raw = reader.scalar(len)?;
                alpha_type = AlphaType::from_raw(raw).ok_or_else(|| malformed("alpha type out of range"))?;
            }
            Tag::BaseDensity => base_density = reader.scalar(len)?,
            Tag::Allocator => {
                let raw = reader.scalar(len)?;
                allocator = AllocatorKind::from_raw(raw).ok_or_else(|| malformed("allocator out of range"))?;
            }
            Tag::Editable => editable = reader.scalar(len)? != 0,
            Tag::Data => data = Some(reader.bytes(len)?),
        }
    }

    let (Some(width), Some(height), Some(format), Some(data)) = (width, height, format, data) else {
        return Err(malformed("record misses a required entry"));
    };

    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(malformed("negative image dimension"));
    };

    check_format(format)?;
    let info = ImageInfo {
        size: Size::new(width, height),
        pixel_format: format,
        alpha_type,
        color_space,
        base_density,
    };

    let expected = expected_size(&info)?;
    if data.len() != expected {
        warn!(len = data.len(), expected, "tlv pixel data has the wrong size");
        return Err(Error::SerializationFailed("pixel data has the wrong size"));
    }

    let image = build_from_tight(info, allocator, editable, data)?;
    debug!(width, height, ?format, ?allocator, "decoded tlv record");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varints() {
        for (value, encoded) in [
            (0u32, &[0x00][..]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (300, &[0xac, 0x02]),
            (u32::MAX, &[0xff, 0xff, 0xff, 0xff, 0x0f]),
        ] {
            let mut out = Vec::new();
            write_varint(&mut out, value);
            assert_eq!(out, encoded);
            assert_eq!(varint_len(value), encoded.len());
            assert_eq!(Reader { bytes: &out }.varint().unwrap(), value);
        }
    }

    #[test]
    fn overlong_varints_fail() {
        let mut reader = Reader {
            bytes: &[0xff, 0xff, 0xff, 0xff, 0xff, 0x01],
        };
        assert!(reader.varint().is_err());
        let mut reader = Reader {
            bytes: &[0x80, 0x80],
        };
        assert!(reader.varint().is_err());
    }

    #[test]
    fn scalars_are_length_prefixed() {
        let mut out = Vec::new();
        write_scalar(&mut out, Tag::Width, 300);
        assert_eq!(out, [1, 2, 0xac, 0x02]);
        write_scalar(&mut out, Tag::BaseDensity, -1);
        assert_eq!(&out[4..], &[6, 5, 0xff, 0xff, 0xff, 0xff, 0x0f]);
    }
}
