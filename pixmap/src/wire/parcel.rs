use std::os::fd::{BorrowedFd, OwnedFd};

use pixmap_texel::{AlphaType, ColorSpace, PixelFormat};
use tracing::{debug, warn};

use super::{build_from_tight, check_format, expected_size, ImageRef, MAX_IMAGEDATA_SIZE, MIN_IMAGEDATA_SIZE};
use crate::image::{AnyImageBuffer, ImageBuffer};
use crate::info::{ImageInfo, Size};
use crate::memory::{AllocatorKind, BufferHandle, HardwareBuffer, SharedMemory};
use crate::yuv::YuvImageBuffer;
use crate::{Error, Result};

/// A flat message for passing data to another process.
///
/// Plain values are appended to a byte stream in 4-byte units. File descriptors and hardware
/// buffers can not travel in the stream itself. They are kept in an object table which the
/// stream indexes, each entry owning a duplicated descriptor or a reference to the buffer, so
/// the object stays alive while the parcel is in flight.
#[derive(Debug, Default)]
pub struct Parcel {
    data: Vec<u8>,
    position: usize,
    objects: Vec<Option<Object>>,
}

enum Object {
    Fd(OwnedFd),
    Hardware(HardwareBuffer),
}

impl core::fmt::Debug for Object {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Object::Fd(fd) => f.debug_tuple("Fd").field(fd).finish(),
            Object::Hardware(buffer) => f.debug_tuple("Hardware").field(&buffer.id()).finish(),
        }
    }
}

fn truncated() -> Error {
    warn!("parcel is truncated");
    Error::SerializationFailed("parcel is truncated")
}

impl Parcel {
    pub fn new() -> Self {
        Parcel::default()
    }

    /// The byte stream written so far.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    /// The read position within the byte stream.
    pub fn data_position(&self) -> usize {
        self.position
    }

    pub fn set_data_position(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::InvalidParameter("position beyond the parcel data"));
        }
        self.position = position;
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_ne_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_ne_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_ne_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_i32(i32::from(value));
    }

    /// Append raw bytes, padded to the next 4-byte unit. The length is not recorded.
    pub fn write_buffer(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
        let padded = bytes.len().next_multiple_of(4);
        self.data.resize(self.data.len() + padded - bytes.len(), 0);
    }

    /// Append a duplicate of `fd`.
    pub fn write_fd(&mut self, fd: BorrowedFd<'_>) -> Result<()> {
        let owned = fd.try_clone_to_owned().map_err(|err| {
            warn!(%err, "duplicating descriptor failed");
            Error::SerializationFailed("duplicating descriptor failed")
        })?;

        self.push_object(Object::Fd(owned))
    }

    /// Append a new owner of a hardware buffer, followed by its geometry.
    pub fn write_hardware_buffer(&mut self, buffer: &HardwareBuffer) -> Result<()> {
        self.push_object(Object::Hardware(buffer.reference()))?;
        self.write_u64(buffer.id());
        self.write_u32(buffer.width());
        self.write_u32(buffer.height());
        self.write_u32(buffer.stride());
        self.write_i32(buffer.format().to_raw());
        Ok(())
    }

    fn push_object(&mut self, object: Object) -> Result<()> {
        let index = i32::try_from(self.objects.len())
            .map_err(|_| Error::SerializationFailed("too many objects"))?;
        self.objects.push(Some(object));
        self.write_i32(index);
        Ok(())
    }

    fn take_object(&mut self) -> Result<Object> {
        let index = self.read_i32()?;
        usize::try_from(index)
            .ok()
            .and_then(|index| self.objects.get_mut(index))
            .and_then(Option::take)
            .ok_or_else(|| {
                warn!(index, "parcel references a missing object");
                Error::SerializationFailed("missing object")
            })
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self.position.checked_add(len).ok_or_else(truncated)?;
        let bytes = self.data.get(self.position..end).ok_or_else(truncated)?;
        self.position = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_ne_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_ne_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_array().map(u64::from_ne_bytes)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_i32()? != 0)
    }

    /// Read `len` raw bytes written by [`Parcel::write_buffer`].
    pub fn read_buffer(&mut self, len: usize) -> Result<&[u8]> {
        let padded = len.checked_next_multiple_of(4).ok_or_else(truncated)?;
        let start = self.position;
        self.take(padded)?;
        Ok(&self.data[start..start + len])
    }

    /// Take ownership of the next descriptor.
    pub fn read_fd(&mut self) -> Result<OwnedFd> {
        match self.take_object()? {
            Object::Fd(fd) => Ok(fd),
            Object::Hardware(buffer) => {
                warn!(id = buffer.id(), "expected a descriptor, found a hardware buffer");
                Err(Error::SerializationFailed("object is not a descriptor"))
            }
        }
    }

    /// Take over the hardware buffer owner carried by the parcel.
    pub fn read_hardware_buffer(&mut self) -> Result<HardwareBuffer> {
        let buffer = match self.take_object()? {
            Object::Hardware(buffer) => buffer,
            Object::Fd(_) => {
                warn!("expected a hardware buffer, found a descriptor");
                return Err(Error::SerializationFailed("object is not a hardware buffer"));
            }
        };

        let id = self.read_u64()?;
        let width = self.read_u32()?;
        let height = self.read_u32()?;
        let stride = self.read_u32()?;
        let format = self.read_i32()?;

        if buffer.id() != id
            || buffer.width() != width
            || buffer.height() != height
            || buffer.stride() != stride
            || buffer.format().to_raw() != format
        {
            warn!(id, "hardware buffer does not match its reference");
            return Err(Error::SerializationFailed("hardware buffer does not match"));
        }

        Ok(buffer)
    }
}

fn to_i32(value: u64) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::TooLarge("value does not fit the parcel"))
}

pub(crate) fn write_image(image: ImageRef<'_>, parcel: &mut Parcel) -> Result<()> {
    let core = image.core();
    let info = core.info;
    let handle = core
        .handle()
        .ok_or(Error::DataAbnormal("image has no pixels"))?;

    parcel.write_i32(to_i32(info.size.width.into())?);
    parcel.write_i32(to_i32(info.size.height.into())?);
    parcel.write_i32(info.pixel_format.to_raw());
    parcel.write_i32(info.color_space.to_raw());
    parcel.write_i32(info.alpha_type.to_raw());
    parcel.write_i32(info.base_density);
    parcel.write_bool(core.editable);
    parcel.write_i32(core.allocator.to_raw());
    parcel.write_i32(to_i32(core.row_data_size.into())?);

    match core.allocator {
        AllocatorKind::SharedMemory => {
            let fd = handle
                .shared_fd()
                .ok_or(Error::DataAbnormal("shared memory without descriptor"))?;
            parcel.write_i32(to_i32(handle.size() as u64)?);
            parcel.write_fd(fd)?;
        }
        AllocatorKind::HardwareBuffer => {
            let buffer = handle
                .hardware_buffer()
                .ok_or(Error::DataAbnormal("hardware memory without buffer"))?;
            parcel.write_i32(to_i32(handle.size() as u64)?);
            parcel.write_hardware_buffer(buffer)?;
        }
        AllocatorKind::Heap | AllocatorKind::Custom => {
            let bytes = image.tight_bytes()?;
            parcel.write_i32(to_i32(bytes.len() as u64)?);
            if bytes.len() <= MIN_IMAGEDATA_SIZE {
                parcel.write_buffer(&bytes);
            } else {
                let mut shared = SharedMemory::create(bytes.len(), "pixmap-parcel").map_err(|err| {
                    warn!(%err, "shared memory for parcel payload failed");
                    Error::SerializationFailed("shared memory for payload failed")
                })?;
                shared
                    .bytes_mut()
                    .ok_or(Error::SerializationFailed("payload mapping is read-only"))?
                    .copy_from_slice(&bytes);
                parcel.write_fd(shared.as_fd())?;
            }
        }
    }

    debug!(
        id = core.unique_id(),
        allocator = ?core.allocator,
        size = parcel.data_size(),
        "marshalled image"
    );
    Ok(())
}

fn read_info(parcel: &mut Parcel) -> Result<ImageInfo> {
    let width = parcel.read_i32()?;
    let height = parcel.read_i32()?;
    let format = parcel.read_i32()?;
    let color_space = parcel.read_i32()?;
    let alpha_type = parcel.read_i32()?;
    let base_density = parcel.read_i32()?;

    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(Error::SerializationFailed("negative image dimension"));
    };

    let info = ImageInfo {
        size: Size::new(width, height),
        pixel_format: PixelFormat::from_raw(format)
            .ok_or(Error::SerializationFailed("pixel format out of range"))?,
        alpha_type: AlphaType::from_raw(alpha_type)
            .ok_or(Error::SerializationFailed("alpha type out of range"))?,
        color_space: ColorSpace::from_raw(color_space)
            .ok_or(Error::SerializationFailed("color space out of range"))?,
        base_density,
    };

    check_format(info.pixel_format)?;
    Ok(info)
}

fn adopt(info: ImageInfo, handle: BufferHandle, editable: bool) -> Result<AnyImageBuffer> {
    if info.pixel_format.is_yuv() {
        YuvImageBuffer::from_parts(info, handle, editable).map(AnyImageBuffer::Yuv)
    } else {
        ImageBuffer::from_parts(info, handle, editable).map(AnyImageBuffer::Rgb)
    }
}

pub(crate) fn read_image(parcel: &mut Parcel) -> Result<AnyImageBuffer> {
    let info = read_info(parcel)?;
    let editable = parcel.read_bool()?;
    let allocator = AllocatorKind::from_raw(parcel.read_i32()?)
        .ok_or(Error::SerializationFailed("allocator out of range"))?;
    let row_data_size = parcel.read_i32()?;
    let buffer_size = usize::try_from(parcel.read_i32()?)
        .map_err(|_| Error::SerializationFailed("negative buffer size"))?;

    let expected = expected_size(&info)?;
    if u32::try_from(row_data_size).ok() != info.pixel_format.stride_for(info.size.width).ok() {
        warn!(row_data_size, "parcel row size does not match the format");
        return Err(Error::SerializationFailed("row size does not match the format"));
    }

    if buffer_size < expected || buffer_size > MAX_IMAGEDATA_SIZE {
        warn!(buffer_size, expected, "parcel buffer size is out of range");
        return Err(Error::SerializationFailed("buffer size is out of range"));
    }

    let image = match allocator {
        AllocatorKind::SharedMemory => {
            let fd = parcel.read_fd()?;
            let shared = SharedMemory::from_fd(fd, buffer_size).map_err(|err| {
                warn!(%err, "mapping parcel descriptor failed");
                Error::SerializationFailed("mapping descriptor failed")
            })?;
            adopt(info, BufferHandle::from_shared(shared), editable)?
        }
        AllocatorKind::HardwareBuffer => {
            let buffer = parcel.read_hardware_buffer()?;
            if buffer.width() != info.size.width
                || buffer.height() != info.size.height
                || buffer.format() != info.pixel_format
                || buffer.size() != buffer_size
            {
                return Err(Error::SerializationFailed("hardware buffer does not match the image"));
            }
            adopt(info, BufferHandle::from_hardware(buffer), editable)?
        }
        AllocatorKind::Heap | AllocatorKind::Custom if buffer_size <= MIN_IMAGEDATA_SIZE => {
            let bytes = parcel.read_buffer(buffer_size)?.to_vec();
            build_from_tight(info, AllocatorKind::Heap, editable, &bytes)?
        }
        AllocatorKind::Heap | AllocatorKind::Custom => {
            let fd = parcel.read_fd()?;
            let shared = SharedMemory::from_fd(fd, buffer_size).map_err(|err| {
                warn!(%err, "mapping parcel payload failed");
                Error::SerializationFailed("mapping payload failed")
            })?;
            build_from_tight(info, AllocatorKind::Heap, editable, shared.bytes())?
        }
    };

    debug!(?allocator, width = info.size.width, height = info.size.height, "unmarshalled image");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_and_padding() {
        let mut parcel = Parcel::new();
        parcel.write_i32(-5);
        parcel.write_buffer(&[1, 2, 3]);
        parcel.write_bool(true);
        parcel.write_u64(u64::MAX - 1);
        assert_eq!(parcel.data_size(), 4 + 4 + 4 + 8);

        assert_eq!(parcel.read_i32().unwrap(), -5);
        assert_eq!(parcel.read_buffer(3).unwrap(), &[1, 2, 3]);
        assert!(parcel.read_bool().unwrap());
        assert_eq!(parcel.read_u64().unwrap(), u64::MAX - 1);
        assert!(parcel.read_i32().is_err());
    }

    #[test]
    fn objects_are_typed() {
        let shared = SharedMemory::create(64, "parcel-test").unwrap();
        let mut parcel = Parcel::new();
        parcel.write_fd(shared.as_fd()).unwrap();
        assert!(parcel.read_hardware_buffer().is_err());
    }

    #[test]
    fn descriptors_are_taken_once() {
        let shared = SharedMemory::create(64, "parcel-test").unwrap();
        let mut parcel = Parcel::new();
        parcel.write_fd(shared.as_fd()).unwrap();
        parcel.write_i32(0);

        assert!(parcel.read_fd().is_ok());
        // The second index names the same, already taken, object.
        assert!(parcel.read_fd().is_err());
    }
}
