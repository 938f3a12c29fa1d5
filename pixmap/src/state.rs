//! State shared by both buffer families.
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use pixmap_texel::{ColorProfile, FormatFamily, PlaneSpec};
use tracing::{debug, warn};

use crate::info::ImageInfo;
use crate::memory::{AllocatorKind, BufferHandle, MAX_RAM_SIZE};
use crate::{Error, Result};

/// The largest width or height accepted by pixel I/O.
pub const MAX_DIMENSION: u32 = (i32::MAX >> 2) as u32;

static NEXT_UNIQUE_ID: AtomicU32 = AtomicU32::new(1);

/// Geometry, ownership and flags of one buffer.
pub(crate) struct Core {
    pub(crate) info: ImageInfo,
    handle: Option<BufferHandle>,
    pub(crate) allocator: AllocatorKind,
    /// Bytes from one row to the next, including padding.
    pub(crate) row_stride: u32,
    /// Bytes of meaningful data in one row.
    pub(crate) row_data_size: u32,
    pub(crate) pixel_bytes: u8,
    pub(crate) editable: bool,
    unique_id: u32,
    transform_state: Mutex<bool>,
    pub(crate) color_profile: Option<ColorProfile>,
}

/// Which formats a buffer type accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Family {
    Rgb,
    Yuv,
}

impl Family {
    fn accepts(self, family: Option<FormatFamily>) -> bool {
        match self {
            Family::Rgb => matches!(family, Some(FormatFamily::Packed | FormatFamily::Astc)),
            Family::Yuv => matches!(family, Some(FormatFamily::Yuv420)),
        }
    }
}

impl Core {
    pub(crate) fn new(allocator: AllocatorKind, editable: bool) -> Self {
        Core {
            info: ImageInfo::default(),
            handle: None,
            allocator,
            row_stride: 0,
            row_data_size: 0,
            pixel_bytes: 0,
            editable,
            unique_id: NEXT_UNIQUE_ID.fetch_add(1, Ordering::Relaxed),
            transform_state: Mutex::new(false),
            color_profile: None,
        }
    }

    /// Validate and adopt a new description.
    ///
    /// Unless `reuse` is set the current memory is released, since it was sized for the old
    /// description.
    pub(crate) fn set_image_info(&mut self, info: ImageInfo, reuse: bool, family: Family) -> Result<()> {
        if info.size.is_empty() {
            warn!(?info.size, "rejecting empty image geometry");
            return Err(Error::DataAbnormal("width and height must be positive"));
        }

        if i32::try_from(info.size.width).is_err() || i32::try_from(info.size.height).is_err() {
            return Err(Error::TooLarge("dimension does not fit the wire format"));
        }

        if !family.accepts(info.pixel_format.family()) {
            warn!(format = ?info.pixel_format, ?family, "rejecting pixel format");
            return Err(Error::DataUnsupported("pixel format not supported by this buffer type"));
        }

        let pixel_bytes = info
            .pixel_format
            .bytes_per_pixel()
            .ok_or(Error::DataUnsupported("unknown pixel format"))?;
        let row_data_size = info.pixel_format.stride_for(info.size.width)?;
        let byte_count = info.pixel_format.size_for(info.size.width, info.size.height)?;

        if self.allocator.has_ram_ceiling() && byte_count > MAX_RAM_SIZE as u64 {
            warn!(byte_count, max = MAX_RAM_SIZE, allocator = ?self.allocator, "image too large");
            return Err(Error::TooLarge("image exceeds the memory ceiling"));
        }

        if !reuse {
            self.release();
        }

        self.info = info;
        self.pixel_bytes = pixel_bytes;
        self.row_data_size = row_data_size;
        self.row_stride = match self.handle.as_ref().and_then(BufferHandle::native_stride) {
            Some(stride) if reuse => stride,
            _ => row_data_size,
        };
        self.color_profile = info.color_space.profile();
        Ok(())
    }

    /// Replace the memory, releasing the previous one first.
    ///
    /// Without memory the image has no rows either.
    pub(crate) fn set_pixels(&mut self, handle: Option<BufferHandle>) {
        self.release();

        match &handle {
            Some(handle) => {
                self.allocator = handle.allocator();
                self.row_data_size = if self.info.size.is_empty() {
                    0
                } else {
                    self.info.pixel_format.stride_for(self.info.size.width).unwrap_or(0)
                };
                self.row_stride = handle.native_stride().unwrap_or(self.row_data_size);
            }
            None => {
                self.row_data_size = 0;
                self.row_stride = 0;
            }
        }

        self.handle = handle;
    }

    /// Swap in the result of a transform.
    ///
    /// The description is validated before the old memory is released, so a failure leaves
    /// the image as it was.
    pub(crate) fn replace(&mut self, info: ImageInfo, handle: BufferHandle, family: Family) -> Result<()> {
        self.set_image_info(info, false, family)?;
        self.set_pixels(Some(handle));
        self.set_transformed(true);
        Ok(())
    }

    pub(crate) fn release(&mut self) {
        if let Some(old) = self.handle.take() {
            debug!(id = self.unique_id, "releasing pixels");
            old.release();
        }
    }

    pub(crate) fn handle(&self) -> Option<&BufferHandle> {
        self.handle.as_ref()
    }

    pub(crate) fn data(&self) -> Result<&[u8]> {
        self.handle
            .as_ref()
            .map(BufferHandle::bytes)
            .ok_or(Error::DataAbnormal("image has no pixels"))
    }

    /// Mutable pixels, for entry points that modify the image.
    pub(crate) fn data_mut(&mut self) -> Result<&mut [u8]> {
        self.check_editable()?;
        let handle = self
            .handle
            .as_mut()
            .ok_or(Error::DataAbnormal("image has no pixels"))?;

        handle.bytes_mut().ok_or_else(|| {
            warn!("pixels are mapped read-only");
            Error::NotAllowModify
        })
    }

    /// Mutable pixels for filling a buffer during construction, ignoring the editable flag.
    pub(crate) fn raw_data_mut(&mut self) -> Result<&mut [u8]> {
        self.handle
            .as_mut()
            .ok_or(Error::DataAbnormal("image has no pixels"))?
            .bytes_mut()
            .ok_or(Error::NotAllowModify)
    }

    pub(crate) fn check_editable(&self) -> Result<()> {
        if self.editable {
            Ok(())
        } else {
            warn!(id = self.unique_id, "image is not editable");
            Err(Error::NotAllowModify)
        }
    }

    /// The bytes of the image as the format defines them, without padding.
    pub(crate) fn byte_count(&self) -> u64 {
        if self.info.size.is_empty() {
            return 0;
        }

        match self.info.pixel_format.family() {
            Some(FormatFamily::Packed) => {
                u64::from(self.row_data_size) * u64::from(self.info.size.height)
            }
            _ => self
                .info
                .pixel_format
                .size_for(self.info.size.width, self.info.size.height)
                .unwrap_or(0),
        }
    }

    /// The plane of a packed image, one element per pixel.
    pub(crate) fn packed_plane(&self) -> PlaneSpec {
        PlaneSpec::packed(
            self.info.size.width as usize,
            self.info.size.height as usize,
            usize::from(self.pixel_bytes),
        )
        .with_stride(self.row_stride as usize)
    }

    pub(crate) fn unique_id(&self) -> u32 {
        self.unique_id
    }

    pub(crate) fn is_transformed(&self) -> bool {
        *self.transform_state.lock()
    }

    pub(crate) fn set_transformed(&self, transformed: bool) {
        *self.transform_state.lock() = transformed;
    }
}
