use crate::error::{Error, Result};
use crate::sys::platform::{
    RawMutex, sys_mutex_create, sys_mutex_destroy, sys_mutex_lock, sys_mutex_try_lock,
    sys_mutex_unlock,
};

use std::fmt;
use std::mem::ManuallyDrop;

use tracing::{debug, trace};

/// A native recursive mutex.
///
/// Unlike `std::sync::Mutex`, this mutex protects no data of its own: it
/// guards caller-defined critical sections delimited by explicit
/// [`lock`](Self::lock) and [`unlock`](Self::unlock) calls, or by a
/// [`MutexGuard`].
///
/// Share it between threads with `Arc` or a scoped borrow. Ownership makes
/// it impossible to [`destroy`](Self::destroy) the mutex while another
/// thread can still reach it.
pub struct Mutex {
    /// The underlying platform primitive, released in `destroy` or `drop`.
    raw: ManuallyDrop<RawMutex>,
}

// Safety: native mutexes are designed to be used from any thread and the
// primitive never moves once created.
unsafe impl Send for Mutex {}
// Safety: every operation on a shared reference is synchronized by the OS.
unsafe impl Sync for Mutex {}

impl Mutex {
    /// Creates a new mutex in the unlocked state.
    ///
    /// # Errors
    ///
    /// Returns the OS error under resource exhaustion.
    pub fn new() -> Result<Self> {
        let raw =
            sys_mutex_create().inspect_err(|e| debug!(error = %e, "mutex creation failed"))?;

        trace!("mutex created");
        Ok(Self {
            raw: ManuallyDrop::new(raw),
        })
    }

    /// Acquires the mutex, blocking the calling thread until it is
    /// available.
    ///
    /// Succeeds immediately if the calling thread already holds it.
    pub fn lock(&self) -> Result<()> {
        sys_mutex_lock(&self.raw).inspect_err(|e| debug!(error = %e, "mutex lock failed"))?;

        Ok(())
    }

    /// Attempts to acquire the mutex without blocking.
    ///
    /// Returns `Ok(false)` if another thread holds it.
    pub fn try_lock(&self) -> Result<bool> {
        sys_mutex_try_lock(&self.raw)
            .inspect_err(|e| debug!(error = %e, "mutex try_lock failed"))
            .map_err(Error::from)
    }

    /// Releases one level of ownership held by the calling thread.
    ///
    /// # Errors
    ///
    /// Fails with the OS error if the calling thread does not hold the
    /// mutex.
    pub fn unlock(&self) -> Result<()> {
        sys_mutex_unlock(&self.raw).inspect_err(|e| debug!(error = %e, "mutex unlock failed"))?;

        Ok(())
    }

    /// Acquires the mutex and returns a guard that unlocks it when dropped.
    pub fn guard(&self) -> Result<MutexGuard<'_>> {
        self.lock()?;

        Ok(MutexGuard { mutex: self })
    }

    /// Destroys the mutex and releases the OS resource.
    ///
    /// The calling thread must not hold the mutex.
    pub fn destroy(self) -> Result<()> {
        let mut this = ManuallyDrop::new(self);

        // Safety: `this` is never used again and its destructor never runs,
        // so the primitive is released exactly once.
        let raw = unsafe { ManuallyDrop::take(&mut this.raw) };

        sys_mutex_destroy(raw).inspect_err(|e| debug!(error = %e, "mutex destroy failed"))?;

        trace!("mutex destroyed");
        Ok(())
    }
}

impl Drop for Mutex {
    /// Destroys the mutex if [`destroy`](Mutex::destroy) was not called.
    fn drop(&mut self) {
        // Safety: `drop` runs once and `self.raw` is not used afterwards.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };

        if let Err(e) = sys_mutex_destroy(raw) {
            debug!(error = %e, "mutex destroy failed");
        }
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").finish_non_exhaustive()
    }
}

/// Guard returned by [`Mutex::guard`].
///
/// Releases one lock level when dropped.
#[must_use = "if unused the mutex will immediately unlock"]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
}

impl<'a> MutexGuard<'a> {
    /// Returns the mutex this guard holds.
    pub fn mutex(&self) -> &'a Mutex {
        self.mutex
    }
}

impl Drop for MutexGuard<'_> {
    /// Unlocks the mutex.
    fn drop(&mut self) {
        let _ = self.mutex.unlock();
    }
}

impl fmt::Debug for MutexGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexGuard").finish_non_exhaustive()
    }
}
