//! Fixed-size arrays shared between the caller and the worker pool
//!
//! A `SharedArray` is allocated once and never resized. Access goes through
//! `ndarray` views created from the raw storage; exclusivity is guaranteed by
//! the epoch protocol in `dispatcher` rather than by the borrow checker:
//! - inputs are written only by the caller, while every worker is idle,
//! - each worker writes only its own fixed range of the output,
//! - the caller reads the output only after every worker finished the epoch.

use ndarray::{ArrayView, ArrayViewMut, Axis, Dimension, Slice};
use std::cell::UnsafeCell;
use std::ops::Range;

/// Fixed-shape array with interior mutability across threads
pub struct SharedArray<T, D: Dimension> {
    cells: Box<[UnsafeCell<T>]>,
    dim: D,
}

// SAFETY: concurrent access is partitioned by the dispatcher's epoch protocol
// (see module docs); elements are plain `Send` data.
unsafe impl<T: Send, D: Dimension> Sync for SharedArray<T, D> {}

impl<T: Copy + Default, D: Dimension> SharedArray<T, D> {
    /// Allocate a zero-initialised (`T::default()`) array
    pub fn new(dim: D) -> Self {
        let cells = (0..dim.size())
            .map(|_| UnsafeCell::new(T::default()))
            .collect();
        Self { cells, dim }
    }

    /// Shape of the array
    pub fn dim(&self) -> D {
        self.dim.clone()
    }

    fn ptr(&self) -> *mut T {
        UnsafeCell::raw_get(self.cells.as_ptr())
    }

    /// Read-only view of the whole array
    ///
    /// # Safety
    /// No thread may write any element while the view is alive.
    pub unsafe fn view(&self) -> ArrayView<'_, T, D> {
        ArrayView::from_shape_ptr(self.dim.clone(), self.ptr())
    }

    /// Mutable view of the whole array
    ///
    /// # Safety
    /// The caller must be the only thread reading or writing the array while
    /// the view is alive.
    pub unsafe fn view_mut(&self) -> ArrayViewMut<'_, T, D> {
        ArrayViewMut::from_shape_ptr(self.dim.clone(), self.ptr())
    }

    /// Mutable view of `range` along `axis`
    ///
    /// # Safety
    /// The caller must be the only thread reading or writing that range while
    /// the view is alive. Other ranges may be in use concurrently.
    pub unsafe fn slice_mut(&self, axis: Axis, range: Range<usize>) -> ArrayViewMut<'_, T, D> {
        let mut view = self.view_mut();
        view.slice_axis_inplace(axis, Slice::from(range));
        view
    }
}
