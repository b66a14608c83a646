//! Read-only column projections borrowed from a table
//!
//! `ColumnView` is a materialized copy that additionally pins the owning
//! table's native handle, so the foreign resource outlives the view.
//! `NumericView` is the true zero-copy case: it aliases the Arrow value
//! buffer through a raw pointer and keeps both the array and the handle
//! reachable for as long as the view lives.

use std::marker::PhantomData;
use std::sync::Arc;

use arrow::array::ArrayRef;

use crate::data::ColumnData;
use crate::native::NativeHandle;

/// Managed copy of one column, pinning the backing native handle
#[derive(Debug, Clone)]
pub struct ColumnView {
    name: String,
    data: ColumnData,
    // Held solely to keep the foreign resource alive while the view is.
    _native: Option<Arc<NativeHandle>>,
}

impl ColumnView {
    pub(crate) fn new(
        name: String,
        data: ColumnData,
        native: Option<Arc<NativeHandle>>,
    ) -> Self {
        Self {
            name,
            data,
            _native: native,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn into_data(self) -> ColumnData {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Zero-copy borrow of a contiguous numeric Arrow buffer.
///
/// Invariant: `ptr..ptr+len` aliases the value buffer of `_array`, which
/// is kept alive by the view together with the owning `NativeHandle`.
/// Slots of missing cells hold unspecified values; consult `null_count`
/// before elementwise scans that assume completeness.
#[derive(Debug)]
pub struct NumericView<T> {
    ptr: *const T,
    len: usize,
    null_count: usize,
    _array: ArrayRef,
    _handle: Arc<NativeHandle>,
    _marker: PhantomData<T>,
}

impl<T> NumericView<T> {
    pub(crate) fn new(
        ptr: *const T,
        len: usize,
        null_count: usize,
        array: ArrayRef,
        handle: Arc<NativeHandle>,
    ) -> Self {
        Self {
            ptr,
            len,
            null_count,
            _array: array,
            _handle: handle,
            _marker: PhantomData,
        }
    }

    /// The borrowed value buffer, no bytes copied.
    pub fn as_slice(&self) -> &[T] {
        // Safety: ptr/len were taken from the value buffer of `_array`,
        // whose backing allocation the view holds an Arc to.
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Missing cells in the viewed column
    pub fn null_count(&self) -> usize {
        self.null_count
    }
}
