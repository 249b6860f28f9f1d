//! Native threads.
//!
//! Each [`Thread`] wraps exactly one OS thread (`pthread_create` on Unix,
//! `CreateThread` on Windows). Threads are scheduled preemptively by the OS;
//! this module adds no pool, queue, or priority on top.
//!
//! A thread terminates either by returning from its entry function or by
//! calling [`exit`]. Both outcomes are observable only through
//! [`Thread::join`], which consumes the handle so it cannot be joined twice.
//! Dropping a handle without joining detaches the thread.
//!
//! [`exit`] unwinds the calling thread's stack, so destructors run and the
//! crate must be built with `panic = "unwind"` for it to work.

mod builder;
mod handle;

pub use builder::ThreadBuilder;
pub use handle::{Thread, exit};
