//! Backing memory of image buffers.
//!
//! Every buffer owns exactly one [`BufferHandle`]. The handle knows which of the four allocator
//! back-ends produced it, and dropping it runs the one release procedure of that back-end:
//! the heap allocation is freed, a shared mapping is unmapped and its descriptor closed, a
//! hardware buffer is unreferenced, custom memory is handed back to its release callback.
mod custom;
mod hardware;
mod shared;

use std::os::fd::BorrowedFd;

use pixmap_texel::PixelFormat;
use tracing::{debug, warn};

pub use self::custom::CustomMemory;
pub use self::hardware::{HardwareBuffer, HARDWARE_STRIDE_ALIGNMENT};
pub use self::shared::SharedMemory;

/// The largest buffer that heap-like allocators hand out.
pub const MAX_RAM_SIZE: usize = 600 * 1024 * 1024;

/// The category of memory backing a buffer, with the numbering used on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AllocatorKind {
    #[default]
    Heap = 1,
    SharedMemory = 2,
    Custom = 3,
    HardwareBuffer = 4,
}

/// Owned backing memory of one buffer.
///
/// Move-only. The release path is chosen by the variant of the storage, so it can neither be
/// confused nor run twice.
pub struct BufferHandle {
    size: usize,
    storage: Storage,
}

enum Storage {
    Heap(Box<[u8]>),
    Shared(SharedMemory),
    Hardware(HardwareBuffer),
    Custom(CustomMemory),
}

/// The geometry a hardware buffer should be allocated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HardwareRequest {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Creates backing memory for each allocator kind.
pub struct MemoryManager;

impl AllocatorKind {
    /// Interpret a raw wire value, `0` is the default heap.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 | 1 => AllocatorKind::Heap,
            2 => AllocatorKind::SharedMemory,
            3 => AllocatorKind::Custom,
            4 => AllocatorKind::HardwareBuffer,
            _ => return None,
        })
    }

    pub const fn to_raw(self) -> i32 {
        self as i32
    }

    /// If buffers of this kind are bound by [`MAX_RAM_SIZE`].
    pub fn has_ram_ceiling(self) -> bool {
        !matches!(self, AllocatorKind::HardwareBuffer)
    }
}

impl MemoryManager {
    /// Allocate `size` zeroed bytes.
    ///
    /// The `tag` names shared memory regions. Hardware buffers are laid out for `desired` if
    /// given, otherwise as a single row of `size` bytes. Custom memory can only come from the
    /// caller, asking for it here always yields `None`.
    pub fn create(
        allocator: AllocatorKind,
        size: usize,
        tag: &str,
        desired: Option<HardwareRequest>,
    ) -> Option<BufferHandle> {
        if size == 0 {
            warn!(?allocator, "refusing to allocate an empty buffer");
            return None;
        }

        if allocator.has_ram_ceiling() && size > MAX_RAM_SIZE {
            warn!(?allocator, size, max = MAX_RAM_SIZE, "buffer exceeds the memory ceiling");
            return None;
        }

        let handle = match allocator {
            AllocatorKind::Heap => {
                let mut data = Vec::new();
                if data.try_reserve_exact(size).is_err() {
                    warn!(size, "heap allocation failed");
                    return None;
                }
                data.resize(size, 0u8);
                BufferHandle::from_heap(data)
            }
            AllocatorKind::SharedMemory => match SharedMemory::create(size, tag) {
                Ok(shared) => BufferHandle::from_shared(shared),
                Err(err) => {
                    warn!(size, tag, %err, "shared memory allocation failed");
                    return None;
                }
            },
            AllocatorKind::HardwareBuffer => {
                let request = desired.unwrap_or(HardwareRequest {
                    width: u32::try_from(size).ok()?,
                    height: 1,
                    format: PixelFormat::Alpha8,
                });
                match HardwareBuffer::allocate(request) {
                    Ok(buffer) if buffer.size() >= size => BufferHandle::from_hardware(buffer),
                    Ok(buffer) => {
                        warn!(size, got = buffer.size(), "hardware buffer smaller than requested");
                        return None;
                    }
                    Err(err) => {
                        warn!(size, %err, "hardware buffer allocation failed");
                        return None;
                    }
                }
            }
            AllocatorKind::Custom => {
                debug!(size, "custom memory must be supplied by the caller");
                return None;
            }
        };

        debug!(?allocator, size, tag, "allocated buffer");
        Some(handle)
    }

    /// Allocate like [`MemoryManager::create`], replacing custom memory with heap memory.
    ///
    /// This is how derived buffers pick their allocator: the semantics of a custom allocator
    /// are unknown, so they can not be replicated.
    pub fn create_like(
        allocator: AllocatorKind,
        size: usize,
        tag: &str,
        desired: Option<HardwareRequest>,
    ) -> crate::Result<BufferHandle> {
        let allocator = match allocator {
            AllocatorKind::Custom => AllocatorKind::Heap,
            other => other,
        };

        MemoryManager::create(allocator, size, tag, desired)
            .ok_or(crate::Error::AllocationFailed { allocator, size })
    }
}

impl BufferHandle {
    pub fn from_heap(data: Vec<u8>) -> Self {
        BufferHandle {
            size: data.len(),
            storage: Storage::Heap(data.into_boxed_slice()),
        }
    }

    pub fn from_shared(shared: SharedMemory) -> Self {
        BufferHandle {
            size: shared.len(),
            storage: Storage::Shared(shared),
        }
    }

    pub fn from_hardware(buffer: HardwareBuffer) -> Self {
        BufferHandle {
            size: buffer.size(),
            storage: Storage::Hardware(buffer),
        }
    }

    pub fn from_custom(memory: CustomMemory) -> Self {
        BufferHandle {
            size: memory.len(),
            storage: Storage::Custom(memory),
        }
    }

    pub fn allocator(&self) -> AllocatorKind {
        match self.storage {
            Storage::Heap(_) => AllocatorKind::Heap,
            Storage::Shared(_) => AllocatorKind::SharedMemory,
            Storage::Hardware(_) => AllocatorKind::HardwareBuffer,
            Storage::Custom(_) => AllocatorKind::Custom,
        }
    }

    /// The number of bytes of the allocation.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Heap(data) => &data[..],
            Storage::Shared(shared) => shared.bytes(),
            Storage::Hardware(buffer) => buffer.bytes(),
            Storage::Custom(memory) => memory.bytes(),
        }
    }

    /// Mutable access, `None` for read-only mappings and hardware buffers with other owners.
    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.storage {
            Storage::Heap(data) => Some(&mut data[..]),
            Storage::Shared(shared) => shared.bytes_mut(),
            Storage::Hardware(buffer) => buffer.bytes_mut(),
            Storage::Custom(memory) => Some(memory.bytes_mut()),
        }
    }

    /// The row stride reported by a hardware buffer.
    pub fn native_stride(&self) -> Option<u32> {
        match &self.storage {
            Storage::Hardware(buffer) => Some(buffer.stride()),
            _ => None,
        }
    }

    pub fn shared_fd(&self) -> Option<BorrowedFd<'_>> {
        match &self.storage {
            Storage::Shared(shared) => Some(shared.as_fd()),
            _ => None,
        }
    }

    pub fn hardware_buffer(&self) -> Option<&HardwareBuffer> {
        match &self.storage {
            Storage::Hardware(buffer) => Some(buffer),
            _ => None,
        }
    }

    /// The address of the first byte, identifies the allocation.
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes().as_ptr()
    }

    /// Release the memory now.
    pub fn release(self) {
        drop(self)
    }
}

impl Drop for BufferHandle {
    fn drop(&mut self) {
        debug!(allocator = ?self.allocator(), size = self.size, "releasing buffer");
    }
}

impl core::fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BufferHandle")
            .field("allocator", &self.allocator())
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_is_zeroed() {
        let handle = MemoryManager::create(AllocatorKind::Heap, 64, "test", None).unwrap();
        assert_eq!(handle.allocator(), AllocatorKind::Heap);
        assert_eq!(handle.size(), 64);
        assert!(handle.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn ceilings() {
        assert!(MemoryManager::create(AllocatorKind::Heap, 0, "test", None).is_none());
        assert!(MemoryManager::create(AllocatorKind::Heap, MAX_RAM_SIZE + 1, "test", None).is_none());
        assert!(MemoryManager::create(AllocatorKind::Custom, 16, "test", None).is_none());
    }

    #[test]
    fn custom_falls_back_to_heap() {
        let handle = MemoryManager::create_like(AllocatorKind::Custom, 16, "test", None).unwrap();
        assert_eq!(handle.allocator(), AllocatorKind::Heap);
    }

    #[test]
    fn shared_is_writable() {
        let mut handle = MemoryManager::create(AllocatorKind::SharedMemory, 4096, "test", None).unwrap();
        assert!(handle.shared_fd().is_some());
        handle.bytes_mut().unwrap()[10] = 7;
        assert_eq!(handle.bytes()[10], 7);
    }

    #[test]
    fn hardware_single_row() {
        let handle = MemoryManager::create(AllocatorKind::HardwareBuffer, 100, "test", None).unwrap();
        assert_eq!(handle.native_stride(), Some(128));
        assert!(handle.size() >= 100);
    }

    #[test]
    fn raw_allocator_kinds() {
        assert_eq!(AllocatorKind::from_raw(0), Some(AllocatorKind::Heap));
        for kind in [
            AllocatorKind::Heap,
            AllocatorKind::SharedMemory,
            AllocatorKind::Custom,
            AllocatorKind::HardwareBuffer,
        ] {
            assert_eq!(AllocatorKind::from_raw(kind.to_raw()), Some(kind));
        }
        assert_eq!(AllocatorKind::from_raw(5), None);
    }
}
