//! Byte-based, strided views on a single image plane.
//!
//! Every plane algorithm takes its source and destination through these views. Each of them
//! carries an explicit row stride, since padded hardware buffers diverge from the tightly
//! packed formula. A view is validated once on construction, after which all row accesses are
//! in bounds.
use core::fmt;
use core::ops::Range;

/// A simple layout describing one plane as a byte matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlaneSpec {
    /// The number of elements in width direction.
    pub width: usize,
    /// The number of rows.
    pub height: usize,
    /// The number of bytes of a single element.
    pub element: usize,
    /// The number of bytes to go from one row to the next.
    pub stride: usize,
    /// Offset of the first row from the start of the data.
    pub offset: usize,
}

/// Error that occurs when a [`PlaneSpec`] does not describe valid memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadStrideError {
    kind: BadStrideKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BadStrideKind {
    OverlappingRows,
    OutOfBounds,
    OutOfMemory,
}

/// A validated reference to the bytes of one plane.
#[derive(Clone, Copy)]
pub struct PlaneRef<'data> {
    spec: PlaneSpec,
    data: &'data [u8],
}

/// A validated mutable reference to the bytes of one plane.
pub struct PlaneMut<'data> {
    spec: PlaneSpec,
    data: &'data mut [u8],
}

impl PlaneSpec {
    /// A tightly packed plane at the start of its data.
    pub fn packed(width: usize, height: usize, element: usize) -> Self {
        PlaneSpec {
            width,
            height,
            element,
            stride: width * element,
            offset: 0,
        }
    }

    /// The same plane with a different row stride.
    pub fn with_stride(self, stride: usize) -> Self {
        PlaneSpec { stride, ..self }
    }

    /// The same plane, starting at another offset.
    pub fn at_offset(self, offset: usize) -> Self {
        PlaneSpec { offset, ..self }
    }

    /// The bytes of meaningful data in each row.
    pub fn row_len(&self) -> usize {
        self.width * self.element
    }

    fn row(&self, y: usize) -> Range<usize> {
        let start = self.offset + y * self.stride;
        start..start + self.row_len()
    }

    /// One past the last byte of the plane, or `None` on overflow.
    pub fn end(&self) -> Option<usize> {
        if self.height == 0 || self.width == 0 {
            return Some(self.offset);
        }

        let row_len = self.width.checked_mul(self.element)?;
        let last_row = (self.height - 1).checked_mul(self.stride)?;
        row_len.checked_add(last_row)?.checked_add(self.offset)
    }

    fn validate(&self, len: usize) -> Result<(), BadStrideError> {
        let row_len = self
            .width
            .checked_mul(self.element)
            .ok_or(BadStrideKind::OutOfMemory)?;

        if self.height > 1 && self.stride < row_len {
            return Err(BadStrideKind::OverlappingRows.into());
        }

        let end = self.end().ok_or(BadStrideKind::OutOfMemory)?;
        if end > len {
            return Err(BadStrideKind::OutOfBounds.into());
        }

        Ok(())
    }

    fn sub(&self, x: usize, y: usize, width: usize, height: usize) -> Option<Self> {
        if x.checked_add(width)? > self.width || y.checked_add(height)? > self.height {
            return None;
        }

        Some(PlaneSpec {
            width,
            height,
            element: self.element,
            stride: self.stride,
            offset: self.offset + y * self.stride + x * self.element,
        })
    }
}

impl<'data> PlaneRef<'data> {
    /// View some bytes as a plane.
    ///
    /// This fails if rows would overlap or the last row does not fit into `data`.
    pub fn new(data: &'data [u8], spec: PlaneSpec) -> Result<Self, BadStrideError> {
        spec.validate(data.len())?;
        Ok(PlaneRef { spec, data })
    }

    pub fn spec(&self) -> PlaneSpec {
        self.spec
    }

    pub fn width(&self) -> usize {
        self.spec.width
    }

    pub fn height(&self) -> usize {
        self.spec.height
    }

    /// The meaningful bytes of one row.
    ///
    /// # Panics
    ///
    /// When `y` is not smaller than the height.
    pub fn row(&self, y: usize) -> &'data [u8] {
        assert!(y < self.spec.height);
        &self.data[self.spec.row(y)]
    }

    pub fn rows(&self) -> impl DoubleEndedIterator<Item = &'data [u8]> + '_ {
        (0..self.spec.height).map(move |y| self.row(y))
    }

    /// A view of a rectangle within this plane.
    pub fn sub(&self, x: usize, y: usize, width: usize, height: usize) -> Option<Self> {
        let spec = self.spec.sub(x, y, width, height)?;
        Some(PlaneRef {
            spec,
            data: self.data,
        })
    }
}

impl<'data> PlaneMut<'data> {
    /// View some mutable bytes as a plane.
    pub fn new(data: &'data mut [u8], spec: PlaneSpec) -> Result<Self, BadStrideError> {
        spec.validate(data.len())?;
        Ok(PlaneMut { spec, data })
    }

    pub fn spec(&self) -> PlaneSpec {
        self.spec
    }

    pub fn width(&self) -> usize {
        self.spec.width
    }

    pub fn height(&self) -> usize {
        self.spec.height
    }

    pub fn as_ref(&self) -> PlaneRef<'_> {
        PlaneRef {
            spec: self.spec,
            data: &*self.data,
        }
    }

    /// Reborrow, for passing the plane to more than one algorithm.
    pub fn reborrow(&mut self) -> PlaneMut<'_> {
        PlaneMut {
            spec: self.spec,
            data: &mut *self.data,
        }
    }

    pub fn row(&self, y: usize) -> &[u8] {
        assert!(y < self.spec.height);
        &self.data[self.spec.row(y)]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        assert!(y < self.spec.height);
        let range = self.spec.row(y);
        &mut self.data[range]
    }

    /// Restrict this view to a rectangle within the plane.
    pub fn into_sub(self, x: usize, y: usize, width: usize, height: usize) -> Option<Self> {
        let spec = self.spec.sub(x, y, width, height)?;
        Some(PlaneMut {
            spec,
            data: self.data,
        })
    }

    /// Set every element byte of the plane to `value`.
    pub fn fill(&mut self, value: u8) {
        for y in 0..self.spec.height {
            self.row_mut(y).fill(value);
        }
    }
}

impl From<BadStrideKind> for BadStrideError {
    fn from(kind: BadStrideKind) -> Self {
        BadStrideError { kind }
    }
}

impl fmt::Display for BadStrideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BadStrideKind::OverlappingRows => f.write_str("row stride is smaller than a row"),
            BadStrideKind::OutOfBounds => f.write_str("plane extends past the end of its data"),
            BadStrideKind::OutOfMemory => f.write_str("plane size overflows"),
        }
    }
}

#[test]
fn padded_rows() {
    let data = [0u8; 24];
    let spec = PlaneSpec::packed(3, 3, 2).with_stride(8);
    let plane = PlaneRef::new(&data, spec).unwrap();
    assert_eq!(spec.end(), Some(22));
    assert_eq!(plane.row(2).len(), 6);

    let too_short = PlaneSpec::packed(3, 3, 2).with_stride(8).at_offset(3);
    assert!(PlaneRef::new(&data, too_short).is_err());

    let overlapping = PlaneSpec::packed(3, 3, 2).with_stride(4);
    assert!(PlaneRef::new(&data, overlapping).is_err());
}
