//! Device-resident half-precision buffers
//!
//! A [`DeviceBuffer`] is a shared handle to a linear, row-major f16 array
//! resident on the (emulated) device. Launches capture cheap clones of the
//! handle, so a deferred launch stays valid after the submitting scope ends.
//!
//! Buffer contents are exclusively owned by the caller between launches: the
//! kernel takes no locks beyond the duration of a single launch, and a buffer
//! must not be passed as both an input and the output of the same launch.
//! That aliasing discipline is caller-enforced, matching the shared-resource
//! policy of the submission model.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use half::f16;

/// Shared handle to a device-resident, row-major f16 array.
///
/// Cloning clones the handle, not the storage; all clones refer to the same
/// elements.
#[derive(Debug, Clone)]
pub struct DeviceBuffer {
    data: Arc<RwLock<Vec<f16>>>,
}

impl DeviceBuffer {
    /// Allocate a zero-filled buffer of `len` elements.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(vec![f16::ZERO; len])),
        }
    }

    /// Upload a slice of f16 values.
    #[must_use]
    pub fn from_slice(values: &[f16]) -> Self {
        Self {
            data: Arc::new(RwLock::new(values.to_vec())),
        }
    }

    /// Upload f32 values, rounding each to f16.
    #[must_use]
    pub fn from_f32(values: &[f32]) -> Self {
        Self {
            data: Arc::new(RwLock::new(
                values.iter().copied().map(f16::from_f32).collect(),
            )),
        }
    }

    /// Number of elements in the buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Download the contents as f16.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f16> {
        self.read().clone()
    }

    /// Download the contents widened to f32.
    #[must_use]
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.read().iter().map(|v| v.to_f32()).collect()
    }

    /// Whether two handles refer to the same storage.
    #[must_use]
    pub fn same_storage(&self, other: &DeviceBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Read access for the duration of one launch.
    ///
    /// A poisoned lock only means some other launch panicked mid-write; the
    /// storage itself is still readable, so recover the guard.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Vec<f16>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access for the duration of one launch.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Vec<f16>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}
