//! # Cadentis Native
//!
//! **Cadentis Native** is the blocking, platform-level companion of the
//! Cadentis runtime: a minimal abstraction exposing one API for TCP sockets
//! and native threads and mutexes over BSD sockets/pthreads and
//! Winsock/Win32.
//!
//! It owns no background execution, event loop, or registry. Every call is
//! synchronous and blocks until the operating system completes it; there is
//! no cancellation and no timeout parameter. Cancellable or async behavior
//! belongs to a layer built on top.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cadentis_native::net::{Socket, SocketType};
//! use cadentis_native::thread::Thread;
//!
//! let server = Socket::open(SocketType::Tcp)?;
//! server.listen(9000)?;
//!
//! let echo = Thread::spawn(move || -> cadentis_native::Result<()> {
//!     let (client, peer) = server.accept()?;
//!     println!("connection from {}:{}", peer.address, peer.port);
//!
//!     let mut buffer = [0u8; 1024];
//!     loop {
//!         let n = client.recv(&mut buffer)?;
//!         if n == 0 {
//!             return Ok(());
//!         }
//!         client.send_all(&buffer[..n])?;
//!     }
//! })?;
//!
//! let client = Socket::open(SocketType::Tcp)?;
//! client.connect("127.0.0.1", 9000)?;
//! client.send_all(b"hello")?;
//! client.close();
//!
//! echo.join()??;
//! # Ok::<(), cadentis_native::Error>(())
//! ```
//!
//! ## Modules
//!
//! - [`net`]: blocking IPv4 TCP sockets
//! - [`thread`]: native threads with join and exit
//! - [`sync`]: native recursive mutexes
//! - [`ffi`]: the same surface as a C ABI with sentinel return values
//!
//! ## Diagnostics
//!
//! Lifecycle transitions and failures are reported through [`tracing`]
//! events at `trace` and `debug` level. The crate installs no subscriber.

mod error;
mod sys;

pub mod ffi;
pub mod net;
pub mod sync;
pub mod thread;

pub use error::{Error, Result};
pub use sys::RawSocket;
