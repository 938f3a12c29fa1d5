use pixmap_texel::{BadStrideError, LayoutError, PlaneMismatch, UnsupportedFormat};

use crate::memory::AllocatorKind;

/// Everything that can go wrong with an image buffer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A geometry, offset, rectangle or factor was out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    /// The image description itself is malformed.
    #[error("abnormal image data: {0}")]
    DataAbnormal(&'static str),
    /// The pixel format is unknown or can not be handled by this operation.
    #[error("unsupported pixel data: {0}")]
    DataUnsupported(&'static str),
    /// The buffer would exceed the memory ceiling of its allocator.
    #[error("image too large: {0}")]
    TooLarge(&'static str),
    #[error("allocating {size} bytes of {allocator:?} memory failed")]
    AllocationFailed { allocator: AllocatorKind, size: usize },
    #[error("the image is not editable")]
    NotAllowModify,
    #[error("pixel conversion failed: {0}")]
    ConvertFailed(&'static str),
    #[error("malformed wire data: {0}")]
    SerializationFailed(&'static str),
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

impl From<LayoutError> for Error {
    fn from(err: LayoutError) -> Self {
        if err.is_unknown_format() {
            Error::DataUnsupported("unknown pixel format")
        } else if err.is_overflow() {
            Error::TooLarge("layout size overflows")
        } else {
            Error::InvalidParameter("width and height must be non-zero")
        }
    }
}

impl From<BadStrideError> for Error {
    fn from(_: BadStrideError) -> Self {
        Error::InvalidParameter("plane does not fit its buffer")
    }
}

impl From<PlaneMismatch> for Error {
    fn from(_: PlaneMismatch) -> Self {
        Error::InvalidParameter("plane geometries do not match")
    }
}

impl From<UnsupportedFormat> for Error {
    fn from(_: UnsupportedFormat) -> Self {
        Error::DataUnsupported("format has no per-pixel decode table")
    }
}
