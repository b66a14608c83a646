//! One-shot release guard for the native table resource
//!
//! Exactly one `NativeHandle` exists per `RecordBatch`. The batch lives
//! behind a raw pointer so its release is an explicit, observable event:
//! `release()` flips the monotonic `freed` flag and drops the allocation,
//! and every later access reports `HandleFreed` instead of touching freed
//! memory. Accessors hand out shallow clones rather than borrows, so no
//! reference into the allocation can outlive a release. Dropping the
//! handle releases implicitly.

use std::sync::atomic::{AtomicBool, Ordering};

use arrow::record_batch::RecordBatch;

use crate::{FrameError, Result};

/// Owning cell for one native table object.
///
/// Invariant: `ptr` was produced by `Box::into_raw` and is dereferenced
/// only while `freed` is false; the false→true transition happens at most
/// once, guarded by an atomic swap.
#[derive(Debug)]
pub struct NativeHandle {
    ptr: *mut RecordBatch,
    freed: AtomicBool,
}

// The batch behind `ptr` is Send + Sync and the freed flag is atomic.
unsafe impl Send for NativeHandle {}
unsafe impl Sync for NativeHandle {}

impl NativeHandle {
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            ptr: Box::into_raw(Box::new(batch)),
            freed: AtomicBool::new(false),
        }
    }

    pub fn is_freed(&self) -> bool {
        self.freed.load(Ordering::Acquire)
    }

    /// Snapshot the underlying batch; errors if the handle was released.
    ///
    /// The clone is shallow (columns are reference-counted), so the
    /// returned batch stays readable even if the handle is released
    /// afterwards.
    pub fn batch(&self) -> Result<RecordBatch> {
        if self.is_freed() {
            return Err(FrameError::HandleFreed);
        }
        // Safety: ptr came from Box::into_raw and freed is still false,
        // so the allocation is live for the duration of this call.
        unsafe { Ok((*self.ptr).clone()) }
    }

    /// Release the native resource. Idempotent: only the first call frees.
    pub fn release(&self) {
        if !self.freed.swap(true, Ordering::AcqRel) {
            // Safety: the swap guarantees this branch runs exactly once.
            unsafe {
                drop(Box::from_raw(self.ptr));
            }
        }
    }
}

impl Drop for NativeHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, ArrayRef, Int64Array};
    use std::sync::Arc;

    fn sample_batch() -> RecordBatch {
        let col: ArrayRef = Arc::new(Int64Array::from(vec![1, 2, 3]));
        RecordBatch::try_from_iter(vec![("x", col)]).unwrap()
    }

    #[test]
    fn test_access_then_release() {
        let handle = NativeHandle::new(sample_batch());
        assert_eq!(handle.batch().unwrap().num_rows(), 3);
        handle.release();
        assert!(handle.is_freed());
        assert!(matches!(handle.batch(), Err(FrameError::HandleFreed)));
    }

    #[test]
    fn test_snapshot_outlives_release() {
        let handle = NativeHandle::new(sample_batch());
        let batch = handle.batch().unwrap();
        handle.release();
        // Churn the allocator so a dangling pointer would be observable.
        let _churn: Vec<RecordBatch> = (0..64).map(|_| sample_batch()).collect();
        assert_eq!(batch.num_rows(), 3);
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(col.value(2), 3);
    }

    #[test]
    fn test_release_is_idempotent() {
        let handle = NativeHandle::new(sample_batch());
        handle.release();
        handle.release();
        handle.release();
        assert!(handle.is_freed());
    }
}
