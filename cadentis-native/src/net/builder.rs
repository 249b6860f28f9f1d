use super::socket::{Socket, SocketType};
use crate::error::{Error, Result};
use crate::sys::platform::{DEFAULT_BACKLOG, sys_close, sys_set_reuseaddr, sys_socket, sys_startup};

use tracing::{debug, trace};

/// Builder for configuring and opening a socket.
///
/// `SocketBuilder` allows customizing socket parameters before the native
/// descriptor is created. [`Socket::open`] is equivalent to
/// `SocketBuilder::new(kind).open()`.
///
/// # Examples
///
/// ```rust,no_run
/// use cadentis_native::net::{SocketBuilder, SocketType};
///
/// let server = SocketBuilder::new(SocketType::Tcp)
///     .reuse_address(true)
///     .backlog(64)
///     .open()?;
///
/// server.listen(9000)?;
/// # Ok::<(), cadentis_native::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SocketBuilder {
    /// Transport of the socket.
    kind: SocketType,

    /// Pending-connection queue length passed to `listen`.
    backlog: i32,

    /// Whether `SO_REUSEADDR` is set before the socket is returned.
    reuse_address: bool,
}

impl SocketBuilder {
    /// Creates a builder with default configuration.
    ///
    /// By default the listen backlog is as large as the platform allows
    /// (`SOMAXCONN`) and no socket option is set.
    pub fn new(kind: SocketType) -> Self {
        Self {
            kind,
            backlog: DEFAULT_BACKLOG,
            reuse_address: false,
        }
    }

    /// Sets the backlog used by [`Socket::listen`].
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn backlog(mut self, n: u32) -> Self {
        assert!(n > 0, "backlog must be > 0");

        self.backlog = n.min(i32::MAX as u32) as i32;
        self
    }

    /// Enables or disables `SO_REUSEADDR`.
    ///
    /// Useful for servers that rebind a fixed port while previous
    /// connections are still in `TIME_WAIT`.
    pub fn reuse_address(mut self, enabled: bool) -> Self {
        self.reuse_address = enabled;
        self
    }

    /// Opens the socket with the configured options.
    ///
    /// The returned socket is bound to no address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WinsockStartup`] if the platform transport layer
    /// fails to initialize, or the OS error if the descriptor cannot be
    /// allocated or configured.
    pub fn open(self) -> Result<Socket> {
        sys_startup().map_err(|code| {
            debug!(code, "socket subsystem startup failed");
            Error::WinsockStartup(code)
        })?;

        let fd = match self.kind {
            SocketType::Tcp => sys_socket(),
        }
        .inspect_err(|e| debug!(error = %e, "socket allocation failed"))?;

        if self.reuse_address {
            if let Err(e) = sys_set_reuseaddr(fd) {
                debug!(error = %e, "setting SO_REUSEADDR failed");
                sys_close(fd);
                return Err(e.into());
            }
        }

        trace!(fd = ?fd, kind = ?self.kind, "socket opened");

        Ok(Socket::from_parts(fd, self.backlog))
    }
}
