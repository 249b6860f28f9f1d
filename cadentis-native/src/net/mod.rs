//! Blocking TCP networking primitives.
//!
//! This module exposes one portable call sequence that works unmodified on
//! BSD-socket and Winsock platforms:
//!
//! ```text
//! open → connect            → send/recv loop → close
//! open → listen → accept    → send/recv loop → close
//! ```
//!
//! Every operation blocks the calling thread until the OS completes it.
//! Partial transfers are reported as-is: `send` and `recv` return the byte
//! count the OS actually moved and the caller loops as needed.
//!
//! Only IPv4 stream sockets are supported.

mod builder;
mod socket;

pub use builder::SocketBuilder;
pub use socket::{SOCKET_INFO_ADDRESS_LEN, Socket, SocketInfo, SocketType};

pub use std::net::Shutdown;
