//! Serialization of images, as parcels for passing between processes and as TLV records.
//!
//! Both forms carry the image description, the editable flag, the allocator kind and the
//! pixels. Decoding fails closed: a malformed record never yields a partial image.
mod parcel;
mod tlv;

use pixmap_texel::PixelFormat;
use tracing::warn;

pub use self::parcel::Parcel;
pub use self::tlv::Tag;

use crate::image::{AnyImageBuffer, ImageBuffer};
use crate::info::{ImageInfo, InitializationOptions, ScaleMode};
use crate::memory::AllocatorKind;
use crate::state::Core;
use crate::yuv::YuvImageBuffer;
use crate::{Error, Result};

/// Payloads up to this size are embedded in a parcel, larger ones travel by descriptor.
pub const MIN_IMAGEDATA_SIZE: usize = 32 * 1024;
/// The largest payload accepted from a parcel.
pub const MAX_IMAGEDATA_SIZE: usize = 128 * 1024 * 1024;

/// Either buffer family, borrowed for encoding.
#[derive(Clone, Copy)]
pub(crate) enum ImageRef<'a> {
    Rgb(&'a ImageBuffer),
    Yuv(&'a YuvImageBuffer),
}

impl ImageRef<'_> {
    fn core(&self) -> &Core {
        match self {
            ImageRef::Rgb(image) => &image.core,
            ImageRef::Yuv(image) => &image.core,
        }
    }

    /// The pixels without any row padding.
    fn tight_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![0; self.core().byte_count() as usize];
        match self {
            ImageRef::Rgb(image) => image.read_pixels(&mut bytes)?,
            ImageRef::Yuv(image) => image.read_pixels(&mut bytes)?,
        }
        Ok(bytes)
    }
}

/// The number of bytes of tightly packed pixels of `info`.
fn expected_size(info: &ImageInfo) -> Result<usize> {
    let size = info
        .pixel_format
        .size_for(info.size.width, info.size.height)
        .map_err(|_| Error::SerializationFailed("image geometry is invalid"))?;
    usize::try_from(size).map_err(|_| Error::SerializationFailed("image is too large"))
}

fn check_format(format: PixelFormat) -> Result<()> {
    if format == PixelFormat::Unknown {
        warn!("wire image has an unknown pixel format");
        return Err(Error::SerializationFailed("unknown pixel format"));
    }
    Ok(())
}

/// Create an image of `info` in new memory and fill it from tightly packed `bytes`.
fn build_from_tight(
    info: ImageInfo,
    allocator: AllocatorKind,
    editable: bool,
    bytes: &[u8],
) -> Result<AnyImageBuffer> {
    let options = InitializationOptions {
        size: info.size,
        pixel_format: info.pixel_format,
        src_pixel_format: PixelFormat::Bgra8888,
        alpha_type: info.alpha_type,
        color_space: info.color_space,
        allocator,
        editable: true,
        scale_mode: ScaleMode::FitTargetSize,
    };

    if info.pixel_format.is_yuv() {
        let mut image = YuvImageBuffer::new(&options)?;
        image.write_pixels(bytes)?;
        image.set_base_density(info.base_density);
        image.set_editable(editable);
        Ok(AnyImageBuffer::Yuv(image))
    } else {
        let mut image = ImageBuffer::new(&options)?;
        image.write_pixels(bytes)?;
        image.set_base_density(info.base_density);
        image.set_editable(editable);
        Ok(AnyImageBuffer::Rgb(image))
    }
}

impl ImageBuffer {
    /// Append this image to a parcel.
    pub fn marshal(&self, parcel: &mut Parcel) -> Result<()> {
        parcel::write_image(ImageRef::Rgb(self), parcel)
    }

    /// Encode this image as a TLV record.
    pub fn encode_tlv(&self) -> Result<Vec<u8>> {
        tlv::encode(ImageRef::Rgb(self))
    }
}

impl YuvImageBuffer {
    /// Append this image to a parcel.
    pub fn marshal(&self, parcel: &mut Parcel) -> Result<()> {
        parcel::write_image(ImageRef::Yuv(self), parcel)
    }

    /// Encode this image as a TLV record.
    pub fn encode_tlv(&self) -> Result<Vec<u8>> {
        tlv::encode(ImageRef::Yuv(self))
    }
}

impl AnyImageBuffer {
    /// Append the image to a parcel.
    pub fn marshal(&self, parcel: &mut Parcel) -> Result<()> {
        match self {
            AnyImageBuffer::Rgb(image) => image.marshal(parcel),
            AnyImageBuffer::Yuv(image) => image.marshal(parcel),
        }
    }

    /// Read the next image from a parcel.
    pub fn unmarshal(parcel: &mut Parcel) -> Result<Self> {
        parcel::read_image(parcel)
    }

    pub fn encode_tlv(&self) -> Result<Vec<u8>> {
        match self {
            AnyImageBuffer::Rgb(image) => image.encode_tlv(),
            AnyImageBuffer::Yuv(image) => image.encode_tlv(),
        }
    }

    /// Decode an image from a TLV record.
    pub fn decode_tlv(bytes: &[u8]) -> Result<Self> {
        tlv::decode(bytes)
    }
}
