use super::handle::Thread;
use crate::error::Result;

/// Builder for configuring and spawning a thread.
///
/// # Examples
///
/// ```rust
/// use cadentis_native::thread::ThreadBuilder;
///
/// let thread = ThreadBuilder::new()
///     .name("answer")
///     .stack_size(256 * 1024)
///     .spawn(|| 6 * 7)?;
///
/// assert_eq!(thread.join()?, 42);
/// # Ok::<(), cadentis_native::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ThreadBuilder {
    /// Diagnostic name reported by [`Thread::name`] and in traces.
    pub(crate) name: Option<String>,

    /// Stack size in bytes; the OS default when unset.
    pub(crate) stack_size: Option<usize>,
}

impl ThreadBuilder {
    /// Creates a builder using the OS default stack size and no name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the diagnostic name of the thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the stack size of the thread in bytes.
    ///
    /// The OS may round the value up, and rejects values below its minimum
    /// when the thread is spawned.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.
    pub fn stack_size(mut self, size: usize) -> Self {
        assert!(size > 0, "stack_size must be > 0");

        self.stack_size = Some(size);
        self
    }

    /// Spawns a thread that runs `f` exactly once.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a new execution context cannot be allocated.
    pub fn spawn<F, T>(self, f: F) -> Result<Thread<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        Thread::spawn_with(self, f)
    }
}
