//! Error type shared by every handle in the crate.

use std::io;

use thiserror::Error;

/// Errors returned by socket, thread and mutex operations.
///
/// OS failures are passed through untouched in [`Error::Io`]; no attempt is
/// made to normalize error codes across platforms. Use
/// [`Error::raw_os_error`] to inspect the native code.
#[derive(Debug, Error)]
pub enum Error {
    /// The operating system rejected the operation.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The address is not an IPv4 dotted quad.
    #[error("invalid IPv4 address `{0}`")]
    InvalidAddress(String),

    /// The one-time socket subsystem startup failed (Winsock only).
    #[error("socket subsystem startup failed with code {0}")]
    WinsockStartup(i32),

    /// The thread panicked before producing a value.
    #[error("thread panicked: {0}")]
    ThreadPanicked(String),

    /// The thread called [`exit`](crate::thread::exit) with a value whose
    /// type differs from the one its handle was created for.
    #[error("thread exited with a value of an unexpected type")]
    ExitValueMismatch,
}

impl Error {
    /// Returns the native error code carried by this error, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) => e.raw_os_error(),
            Error::WinsockStartup(code) => Some(*code),
            _ => None,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
