use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pixmap_texel::{round_up, FormatFamily, PixelFormat, YuvPlaneLayout};
use tracing::debug;

use super::HardwareRequest;
use crate::{Error, Result};

/// Rows of hardware buffers start at multiples of this many bytes.
pub const HARDWARE_STRIDE_ALIGNMENT: u32 = 64;

/// A reference counted graphics buffer with padded rows.
///
/// Cloning through [`HardwareBuffer::reference`] adds an owner, dropping one removes it. The
/// memory is released with the last owner. There is no way to reach a buffer other than
/// through one of its owners, a [`Parcel`](crate::Parcel) carries an owner of its own.
pub struct HardwareBuffer {
    native: Arc<NativeBuffer>,
}

struct NativeBuffer {
    id: u64,
    ptr: NonNull<u8>,
    layout: Layout,
    width: u32,
    height: u32,
    stride: u32,
    format: PixelFormat,
}

// The allocation is owned by the `NativeBuffer` and freed only in its `Drop`. Mutable access
// is only granted through `Arc::get_mut`, that is to a sole owner without weak references.
unsafe impl Send for NativeBuffer {}
unsafe impl Sync for NativeBuffer {}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl HardwareBuffer {
    /// Allocate a zeroed buffer laid out for the requested geometry.
    pub fn allocate(request: HardwareRequest) -> Result<Self> {
        let HardwareRequest {
            width,
            height,
            format,
        } = request;

        if width == 0 || height == 0 {
            return Err(Error::InvalidParameter("hardware buffer must not be empty"));
        }

        let row = format.stride_for(width)?;
        let stride = u32::try_from(round_up(row.into(), HARDWARE_STRIDE_ALIGNMENT.into()))
            .map_err(|_| Error::TooLarge("hardware stride overflows"))?;

        let size = match format.family() {
            Some(FormatFamily::Yuv420) => {
                YuvPlaneLayout::with_luma_stride(format, width, height, stride)?.total_size()
            }
            Some(FormatFamily::Astc) => {
                let block = format.block_size().unwrap_or(1);
                u64::from(stride) * round_up(height.into(), block.into())
            }
            Some(FormatFamily::Packed) => u64::from(stride) * u64::from(height),
            None => return Err(Error::DataUnsupported("unknown pixel format")),
        };

        let size = usize::try_from(size).map_err(|_| Error::TooLarge("hardware buffer size"))?;
        let layout = Layout::from_size_align(size, HARDWARE_STRIDE_ALIGNMENT as usize)
            .map_err(|_| Error::TooLarge("hardware buffer size"))?;

        // SAFETY: the layout has a non-zero size, width and height are non-zero.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(Error::AllocationFailed {
            allocator: super::AllocatorKind::HardwareBuffer,
            size,
        })?;

        let native = Arc::new(NativeBuffer {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            ptr,
            layout,
            width,
            height,
            stride,
            format,
        });

        debug!(id = native.id, width, height, stride, ?format, "allocated hardware buffer");
        Ok(HardwareBuffer { native })
    }

    /// Add an owner.
    pub fn reference(&self) -> Self {
        let native = Arc::clone(&self.native);
        debug!(id = native.id, count = Arc::strong_count(&native), "referenced hardware buffer");
        HardwareBuffer { native }
    }

    /// The number of owners.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.native)
    }

    pub fn id(&self) -> u64 {
        self.native.id
    }

    pub fn width(&self) -> u32 {
        self.native.width
    }

    pub fn height(&self) -> u32 {
        self.native.height
    }

    /// Bytes from one row to the next.
    pub fn stride(&self) -> u32 {
        self.native.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.native.format
    }

    pub fn size(&self) -> usize {
        self.native.layout.size()
    }

    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the allocation lives as long as any owner, and is only written through a
        // unique owner.
        unsafe { core::slice::from_raw_parts(self.native.ptr.as_ptr(), self.size()) }
    }

    /// Mutable access, only while this is the sole owner.
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        let native = Arc::get_mut(&mut self.native)?;
        let size = native.layout.size();
        // SAFETY: `native` is borrowed uniquely for the lifetime of the slice, no other owner
        // exists and none can be created from `self` until the borrow ends.
        Some(unsafe { core::slice::from_raw_parts_mut(native.ptr.as_ptr(), size) })
    }
}

impl Drop for HardwareBuffer {
    fn drop(&mut self) {
        debug!(
            id = self.native.id,
            remaining = Arc::strong_count(&self.native) - 1,
            "unreferenced hardware buffer"
        );
    }
}

impl Drop for NativeBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `allocate` with exactly this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
        debug!(id = self.id, "released hardware buffer");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(width: u32, height: u32, format: PixelFormat) -> HardwareRequest {
        HardwareRequest {
            width,
            height,
            format,
        }
    }

    #[test]
    fn padded_rows() {
        let buffer = HardwareBuffer::allocate(request(10, 3, PixelFormat::Rgba8888)).unwrap();
        assert_eq!(buffer.stride(), 64);
        assert_eq!(buffer.size(), 192);

        let yuv = HardwareBuffer::allocate(request(10, 4, PixelFormat::Nv12)).unwrap();
        assert_eq!(yuv.stride(), 64);
        assert_eq!(yuv.size(), 64 * 4 + 64 * 2);
    }

    #[test]
    fn reference_counting() {
        let mut first = HardwareBuffer::allocate(request(4, 4, PixelFormat::Bgra8888)).unwrap();
        assert_eq!(first.ref_count(), 1);
        assert!(first.bytes_mut().is_some());

        let mut second = first.reference();
        assert_eq!(first.ref_count(), 2);
        assert!(first.bytes_mut().is_none());
        assert!(second.bytes_mut().is_none());

        let third = second.reference();
        assert_eq!(third.ref_count(), 3);
        drop(third);
        drop(second);
        assert_eq!(first.ref_count(), 1);
        assert!(first.bytes_mut().is_some());
    }

    #[test]
    fn written_bytes_are_seen_by_later_owners() {
        let mut buffer = HardwareBuffer::allocate(request(4, 1, PixelFormat::Alpha8)).unwrap();
        buffer.bytes_mut().unwrap()[0] = 7;

        let other = buffer.reference();
        assert_eq!(other.id(), buffer.id());
        assert_eq!(other.bytes()[0], 7);
        assert!(buffer.bytes_mut().is_none());
    }
}
