use super::builder::ThreadBuilder;
use crate::error::{Error, Result};
use crate::sys::ThreadMain;
use crate::sys::platform::{RawThread, sys_thread_detach, sys_thread_join, sys_thread_spawn};

use std::any::Any;
use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace};

thread_local! {
    /// Whether the current thread was started by this module.
    ///
    /// [`exit`] relies on the catch frame installed by the spawn trampoline
    /// and refuses to run anywhere else.
    static SPAWNED_HERE: Cell<bool> = const { Cell::new(false) };
}

/// Unwind payload carrying the value passed to [`exit`].
struct ExitRequest(Box<dyn Any + Send>);

/// Slot the spawned thread writes its outcome into before terminating.
struct Packet<T> {
    outcome: UnsafeCell<Option<Result<T>>>,
}

// Safety: the outcome is written exactly once by the spawned thread and read
// only after the native join has returned, which orders the two accesses.
unsafe impl<T: Send> Sync for Packet<T> {}

/// An owned handle to a native thread.
///
/// The handle has exactly one owner. [`join`](Self::join) consumes it, so a
/// thread cannot be joined twice; dropping it instead detaches the thread,
/// which then releases its resources on its own when it terminates.
pub struct Thread<T> {
    /// Native handle, `None` once joined or detached.
    native: Option<RawThread>,

    /// Shared outcome slot.
    packet: Arc<Packet<T>>,

    /// Diagnostic name given by the builder.
    name: Option<String>,
}

// Safety: the native handle is only an identifier; moving it between
// threads is allowed by both pthreads and Win32.
unsafe impl<T: Send> Send for Thread<T> {}
// Safety: a shared reference only exposes the name.
unsafe impl<T: Send> Sync for Thread<T> {}

impl<T> Thread<T>
where
    T: Send + 'static,
{
    /// Spawns a native thread running `f` with default configuration.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a new execution context cannot be allocated.
    pub fn spawn<F>(f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        ThreadBuilder::new().spawn(f)
    }

    /// Spawns a native thread that calls `entry(argument)` exactly once.
    pub fn create<A, F>(entry: F, argument: A) -> Result<Self>
    where
        F: FnOnce(A) -> T + Send + 'static,
        A: Send + 'static,
    {
        Self::spawn(move || entry(argument))
    }

    pub(crate) fn spawn_with<F>(builder: ThreadBuilder, f: F) -> Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let packet = Arc::new(Packet {
            outcome: UnsafeCell::new(None),
        });
        let their_packet = packet.clone();

        let main: ThreadMain = Box::new(move || {
            SPAWNED_HERE.set(true);

            let outcome = match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => Ok(value),
                Err(payload) => resolve_unwind(payload),
            };

            // Safety: the joining side reads the slot only after this thread
            // has terminated.
            unsafe { *their_packet.outcome.get() = Some(outcome) };
        });

        let native = sys_thread_spawn(builder.stack_size, main)
            .inspect_err(|e| debug!(name = ?builder.name, error = %e, "thread spawn failed"))?;

        trace!(name = ?builder.name, "thread spawned");

        Ok(Self {
            native: Some(native),
            packet,
            name: builder.name,
        })
    }
}

impl<T> Thread<T> {
    /// Blocks until the thread terminates and returns its result.
    ///
    /// The result is the value returned by the entry function, or the value
    /// passed to [`exit`].
    ///
    /// # Errors
    ///
    /// - [`Error::ThreadPanicked`] if the thread panicked,
    /// - [`Error::ExitValueMismatch`] if [`exit`] was called with a value of
    ///   another type than `T`,
    /// - the OS error if the native join fails.
    pub fn join(mut self) -> Result<T> {
        if let Some(native) = self.native.take() {
            sys_thread_join(native)
                .inspect_err(|e| debug!(name = ?self.name, error = %e, "thread join failed"))?;
        }

        trace!(name = ?self.name, "thread joined");

        // Safety: the thread has terminated, so its write is visible and
        // nothing else touches the slot.
        let outcome = unsafe { (*self.packet.outcome.get()).take() };

        outcome.unwrap_or_else(|| {
            Err(Error::ThreadPanicked(
                "thread terminated without a result".to_owned(),
            ))
        })
    }

    /// Returns the name given through [`ThreadBuilder::name`].
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl<T> Drop for Thread<T> {
    /// Detaches the thread if it was never joined.
    fn drop(&mut self) {
        if let Some(native) = self.native.take() {
            trace!(name = ?self.name, "thread detached");
            sys_thread_detach(native);
        }
    }
}

impl<T> fmt::Debug for Thread<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("name", &self.name)
            .field("joined", &self.native.is_none())
            .finish()
    }
}

/// Terminates the calling thread immediately, making `value` available to
/// [`Thread::join`].
///
/// The thread's stack is unwound, so destructors of live values run. The
/// unwind must not be intercepted by a `catch_unwind` in the caller.
///
/// # Panics
///
/// Panics if the calling thread was not started by [`Thread::spawn`],
/// [`Thread::create`] or [`ThreadBuilder::spawn`].
pub fn exit<T: Send + 'static>(value: T) -> ! {
    assert!(
        SPAWNED_HERE.get(),
        "thread::exit called on a thread not started by cadentis-native"
    );

    panic::resume_unwind(Box::new(ExitRequest(Box::new(value))))
}

/// Turns an unwind payload caught at the top of a thread into its result.
fn resolve_unwind<T: 'static>(payload: Box<dyn Any + Send>) -> Result<T> {
    match payload.downcast::<ExitRequest>() {
        Ok(request) => request
            .0
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| Error::ExitValueMismatch),
        Err(payload) => Err(Error::ThreadPanicked(panic_message(payload.as_ref()))),
    }
}

/// Extracts the message of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
