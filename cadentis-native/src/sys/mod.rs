//! Platform abstraction layer.
//!
//! Every public handle in this crate is a thin owner around a value produced
//! here. The concrete implementation is selected at compile time depending
//! on the target operating system; there is no runtime dispatch.
//!
//! Both backends expose the same function names and semantics:
//! - sockets: `sys_socket`, `sys_connect`, `sys_bind_any`, `sys_listen`,
//!   `sys_accept`, `sys_send`, `sys_recv`, `sys_shutdown`, `sys_sockname`,
//!   `sys_close`,
//! - threads: `sys_thread_spawn`, `sys_thread_join`, `sys_thread_detach`,
//! - mutexes: `sys_mutex_create`, `sys_mutex_lock`, `sys_mutex_try_lock`,
//!   `sys_mutex_unlock`, `sys_mutex_destroy`.

#[cfg(unix)]
pub(crate) mod unix;

#[cfg(unix)]
pub(crate) use unix as platform;

#[cfg(windows)]
pub(crate) mod windows;

#[cfg(windows)]
pub(crate) use windows as platform;

pub use platform::RawSocket;

/// Entry point handed to a freshly created native thread.
///
/// The platform trampoline takes ownership of the box and calls it exactly
/// once. The closure must never unwind.
pub(crate) type ThreadMain = Box<dyn FnOnce() + Send + 'static>;
