//! Native mutual exclusion.
//!
//! The current primitives include:
//! - [`Mutex`]: an explicitly created, locked, unlocked and destroyed
//!   native mutex,
//! - [`MutexGuard`]: an RAII guard releasing one lock level on drop.
//!
//! ## Recursive locking
//!
//! Mutexes are recursive on every platform. A thread that already holds a
//! mutex may lock it again without blocking and must unlock it as many times
//! as it locked it before another thread can acquire it. Unix builds the
//! pthread mutex with `PTHREAD_MUTEX_RECURSIVE`; Win32 mutex objects behave
//! this way natively.
//!
//! Unlocking a mutex the calling thread does not hold is reported as an
//! error rather than silently releasing another thread's lock.

mod mutex;

pub use mutex::{Mutex, MutexGuard};
