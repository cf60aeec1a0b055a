//! Device-then-stream lock ordering.
//!
//! Whenever the device lock and a stream lock are held together, the device
//! lock must be taken first. The types here make that the only way to get a
//! stream lock: [`StreamLock::lock`] demands a live [`DeviceGuard`] as proof.
//!
//! Once the stream guard is obtained the device guard may be released, so an
//! I/O thread blocks in the driver holding only its own stream lock while a
//! control thread can still take the device lock. Code that holds a stream
//! guard must drop it before locking the device again.

use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};

/// The device-level lock.
pub(crate) struct DeviceLock<D> {
    inner: Mutex<D>,
}

impl<D> DeviceLock<D> {
    pub(crate) fn new(state: D) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    pub(crate) fn lock(&self) -> DeviceGuard<'_, D> {
        DeviceGuard {
            guard: self.inner.lock(),
        }
    }
}

/// Proof that the device lock is held.
pub(crate) struct DeviceGuard<'a, D> {
    guard: MutexGuard<'a, D>,
}

impl<D> Deref for DeviceGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.guard
    }
}

impl<D> DerefMut for DeviceGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.guard
    }
}

/// A per-stream lock that can only be taken under the device lock.
pub(crate) struct StreamLock<T> {
    inner: Mutex<T>,
}

impl<T> StreamLock<T> {
    pub(crate) fn new(state: T) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Locks the stream.
    ///
    /// The returned guard borrows only the stream, so `_device` may be
    /// dropped while the stream stays locked.
    pub(crate) fn lock<'a, D>(&'a self, _device: &DeviceGuard<'_, D>) -> MutexGuard<'a, T> {
        self.inner.lock()
    }
}
