use super::builder::SocketBuilder;
use crate::error::{Error, Result};
use crate::sys::RawSocket;
use crate::sys::platform::{
    DEFAULT_BACKLOG, sys_accept, sys_bind_any, sys_close, sys_connect, sys_listen, sys_recv,
    sys_send, sys_shutdown, sys_sockname,
};

use std::io;
use std::mem::ManuallyDrop;
use std::net::{Ipv4Addr, Shutdown, SocketAddrV4};
use std::str::FromStr;

use tracing::{debug, trace};

/// Capacity bound of the textual address in a [`SocketInfo`], in bytes.
///
/// Any IPv4 dotted quad fits well within it.
pub const SOCKET_INFO_ADDRESS_LEN: usize = 64;

/// Transport selected when opening a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SocketType {
    /// IPv4 stream socket (TCP).
    Tcp = 0,
}

impl TryFrom<i32> for SocketType {
    type Error = i32;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(SocketType::Tcp),
            other => Err(other),
        }
    }
}

/// Endpoint description produced by [`Socket::accept`] and
/// [`Socket::local_addr`].
///
/// Both fields are in host representation: `address` is the textual
/// dotted quad and `port` is a plain host-order number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SocketInfo {
    /// Textual IPv4 address, e.g. `"127.0.0.1"`.
    pub address: String,

    /// Port number in host byte order.
    pub port: u16,
}

impl SocketInfo {
    /// Returns the endpoint as a `SocketAddrV4`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `address` has been replaced by
    /// something that is not a dotted quad.
    pub fn socket_addr(&self) -> Result<SocketAddrV4> {
        Ok(SocketAddrV4::new(parse_ipv4(&self.address)?, self.port))
    }
}

impl From<SocketAddrV4> for SocketInfo {
    fn from(addr: SocketAddrV4) -> Self {
        Self {
            address: addr.ip().to_string(),
            port: addr.port(),
        }
    }
}

/// Parses a textual IPv4 dotted quad.
pub(crate) fn parse_ipv4(address: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(address).map_err(|_| Error::InvalidAddress(address.to_owned()))
}

/// A blocking TCP socket.
///
/// `Socket` owns one native descriptor and releases it exactly once, either
/// through [`close`](Self::close) or when dropped.
///
/// A socket is `Send` and `Sync`, but no internal locking protects it:
/// concurrent calls on the same handle behave exactly as the OS defines for
/// concurrent calls on one descriptor.
#[derive(Debug)]
pub struct Socket {
    /// Native descriptor.
    fd: RawSocket,

    /// Backlog passed to `listen`.
    backlog: i32,
}

impl Socket {
    /// Opens a new socket bound to no address.
    ///
    /// Shorthand for `SocketBuilder::new(kind).open()`.
    pub fn open(kind: SocketType) -> Result<Self> {
        SocketBuilder::new(kind).open()
    }

    pub(crate) fn from_parts(fd: RawSocket, backlog: i32) -> Self {
        Self { fd, backlog }
    }

    /// Connects to a remote IPv4 endpoint.
    ///
    /// `address` must be a dotted quad such as `"127.0.0.1"`; `port` is in
    /// host byte order. Blocks until the handshake completes, is refused, or
    /// times out according to OS defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] for a malformed address without
    /// touching the network, or the OS error otherwise.
    pub fn connect(&self, address: &str, port: u16) -> Result<()> {
        let addr = SocketAddrV4::new(parse_ipv4(address)?, port);

        sys_connect(self.fd, addr)
            .inspect_err(|e| debug!(fd = ?self.fd, %addr, error = %e, "connect failed"))?;

        trace!(fd = ?self.fd, %addr, "connected");
        Ok(())
    }

    /// Binds to the wildcard address on `port` and starts listening.
    ///
    /// `port` is in host byte order; `0` lets the OS pick one, which can be
    /// read back with [`local_addr`](Self::local_addr).
    pub fn listen(&self, port: u16) -> Result<()> {
        sys_bind_any(self.fd, port)
            .inspect_err(|e| debug!(fd = ?self.fd, port, error = %e, "bind failed"))?;

        sys_listen(self.fd, self.backlog)
            .inspect_err(|e| debug!(fd = ?self.fd, port, error = %e, "listen failed"))?;

        trace!(fd = ?self.fd, port, backlog = self.backlog, "listening");
        Ok(())
    }

    /// Blocks until a connection arrives and returns it with the peer's
    /// address.
    pub fn accept(&self) -> Result<(Socket, SocketInfo)> {
        let (fd, peer) = sys_accept(self.fd, true)
            .inspect_err(|e| debug!(fd = ?self.fd, error = %e, "accept failed"))?;

        let client = Socket::from_parts(fd, DEFAULT_BACKLOG);

        let info = peer.map(SocketInfo::from).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidData, "accept returned no peer address")
        })?;

        trace!(fd = ?self.fd, client = ?fd, peer = %info.address, port = info.port, "accepted");
        Ok((client, info))
    }

    /// Blocks until a connection arrives, without extracting the peer
    /// address.
    pub fn accept_without_info(&self) -> Result<Socket> {
        let (fd, _) = sys_accept(self.fd, false)
            .inspect_err(|e| debug!(fd = ?self.fd, error = %e, "accept failed"))?;

        trace!(fd = ?self.fd, client = ?fd, "accepted");
        Ok(Socket::from_parts(fd, DEFAULT_BACKLOG))
    }

    /// Sends bytes with a single OS call.
    ///
    /// Returns the number of bytes actually written, which may be less than
    /// `buffer.len()`. Use [`send_all`](Self::send_all) to loop until the
    /// whole buffer has been written.
    pub fn send(&self, buffer: &[u8]) -> Result<usize> {
        sys_send(self.fd, buffer)
            .inspect_err(|e| debug!(fd = ?self.fd, error = %e, "send failed"))
            .map_err(Error::from)
    }

    /// Writes the entire buffer to the socket.
    ///
    /// This method repeatedly calls [`send`](Self::send) until the full
    /// buffer has been written.
    ///
    /// # Errors
    ///
    /// Returns `WriteZero` if the OS reports progress of zero.
    pub fn send_all(&self, mut buffer: &[u8]) -> Result<()> {
        while !buffer.is_empty() {
            let n = self.send(buffer)?;

            if n == 0 {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "send returned zero bytes",
                )));
            }

            buffer = &buffer[n..];
        }

        Ok(())
    }

    /// Receives bytes with a single OS call.
    ///
    /// Returns the number of bytes read into `buffer`, or `0` once the peer
    /// has shut down its side of the connection and no data is pending.
    pub fn recv(&self, buffer: &mut [u8]) -> Result<usize> {
        sys_recv(self.fd, buffer)
            .inspect_err(|e| debug!(fd = ?self.fd, error = %e, "recv failed"))
            .map_err(Error::from)
    }

    /// Shuts down the read, write, or both halves of this connection
    /// without releasing the descriptor.
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        sys_shutdown(self.fd, how)
            .inspect_err(|e| debug!(fd = ?self.fd, ?how, error = %e, "shutdown failed"))
            .map_err(Error::from)
    }

    /// Returns the local address and port of this socket.
    pub fn local_addr(&self) -> Result<SocketInfo> {
        let addr = sys_sockname(self.fd)
            .inspect_err(|e| debug!(fd = ?self.fd, error = %e, "getsockname failed"))?;

        Ok(SocketInfo::from(addr))
    }

    /// Closes the socket.
    ///
    /// Equivalent to dropping it; provided to make the end of the lifecycle
    /// explicit at the call site.
    pub fn close(self) {
        drop(self);
    }

    /// Returns the native descriptor without giving up ownership.
    pub fn as_raw(&self) -> RawSocket {
        self.fd
    }

    /// Consumes the socket and returns the native descriptor.
    ///
    /// The caller becomes responsible for closing it.
    pub fn into_raw(self) -> RawSocket {
        ManuallyDrop::new(self).fd
    }

    /// Takes ownership of a native descriptor.
    ///
    /// # Safety
    ///
    /// `fd` must be an open IPv4 stream socket that nothing else closes.
    pub unsafe fn from_raw(fd: RawSocket) -> Self {
        Self::from_parts(fd, DEFAULT_BACKLOG)
    }
}

impl Drop for Socket {
    /// Closes the native descriptor.
    fn drop(&mut self) {
        trace!(fd = ?self.fd, "socket closed");
        sys_close(self.fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_type_from_raw_value() {
        assert_eq!(SocketType::try_from(0), Ok(SocketType::Tcp));
        assert_eq!(SocketType::try_from(7), Err(7));
    }

    #[test]
    fn parse_ipv4_accepts_dotted_quad_only() {
        assert_eq!(parse_ipv4("10.0.0.1").unwrap(), Ipv4Addr::new(10, 0, 0, 1));

        for bad in ["", "localhost", "10.0.0", "256.0.0.1", "::1", "10.0.0.1:80"] {
            assert!(
                matches!(parse_ipv4(bad), Err(Error::InvalidAddress(ref a)) if a == bad),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn socket_info_is_host_order() {
        let info = SocketInfo::from(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0x1f90));

        assert_eq!(info.address, "127.0.0.1");
        assert_eq!(info.port, 8080);
        assert!(info.address.len() < SOCKET_INFO_ADDRESS_LEN);
        assert_eq!(
            info.socket_addr().unwrap(),
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8080)
        );
    }
}
