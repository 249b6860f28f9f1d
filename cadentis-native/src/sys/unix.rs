use super::ThreadMain;

use libc::{
    AF_INET, EBUSY, IPPROTO_TCP, PTHREAD_MUTEX_RECURSIVE, SHUT_RD, SHUT_RDWR, SHUT_WR, SO_REUSEADDR,
    SOCK_STREAM, SOL_SOCKET, SOMAXCONN, accept, bind, c_int, c_void, close, connect, getsockname,
    listen, pthread_attr_destroy, pthread_attr_init, pthread_attr_setstacksize, pthread_attr_t,
    pthread_create, pthread_detach, pthread_join, pthread_mutex_destroy, pthread_mutex_init,
    pthread_mutex_lock, pthread_mutex_t, pthread_mutex_trylock, pthread_mutex_unlock,
    pthread_mutexattr_destroy, pthread_mutexattr_init, pthread_mutexattr_settype,
    pthread_mutexattr_t, pthread_t, recv, send, setsockopt, shutdown, sockaddr, sockaddr_in,
    socket, socklen_t,
};
use std::cell::UnsafeCell;
use std::mem::{self, MaybeUninit};
use std::net::{Ipv4Addr, Shutdown, SocketAddrV4};
use std::os::fd::RawFd;
use std::{io, ptr};

/// Raw socket descriptor type on Unix.
pub type RawSocket = RawFd;

/// Descriptor value never returned by a successful `socket(2)` call.
pub(crate) const INVALID_SOCKET: RawSocket = -1;

/// Backlog used by `listen` when none is configured.
pub(crate) const DEFAULT_BACKLOG: c_int = SOMAXCONN;

/// Flags passed to every `send(2)`.
///
/// Writing to a connection reset by the peer must surface as `EPIPE`
/// instead of raising `SIGPIPE` in the embedding process.
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly",
    target_os = "illumos",
    target_os = "solaris",
))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;

/// Apple has no `MSG_NOSIGNAL`; `SO_NOSIGPIPE` is set on the socket instead.
#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly",
    target_os = "illumos",
    target_os = "solaris",
)))]
const SEND_FLAGS: c_int = 0;

/// Native thread handle.
pub(crate) type RawThread = pthread_t;

/// Heap-pinned pthread mutex.
///
/// A `pthread_mutex_t` must not move once initialized, so it lives in its
/// own allocation for its whole lifetime.
pub(crate) struct RawMutex(Box<UnsafeCell<pthread_mutex_t>>);

/// Performs any one-time process setup required before sockets can be used.
///
/// Nothing is required on Unix.
pub(crate) fn sys_startup() -> Result<(), i32> {
    Ok(())
}

/// Converts a pthread return code into an `io::Result`.
fn cvt_nz(rc: c_int) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

/// Converts a socket call return value into an `io::Result`.
fn cvt(rc: c_int) -> io::Result<c_int> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// Sets an integer socket option.
fn sys_setsockopt_int(fd: RawSocket, level: c_int, name: c_int, value: c_int) -> io::Result<()> {
    let rc = unsafe {
        setsockopt(
            fd,
            level,
            name,
            &value as *const _ as *const c_void,
            mem::size_of::<c_int>() as socklen_t,
        )
    };

    cvt(rc).map(drop)
}

/// Applies the options every descriptor owned by this crate carries.
#[cfg(target_vendor = "apple")]
fn sys_configure(fd: RawSocket) -> io::Result<()> {
    sys_setsockopt_int(fd, SOL_SOCKET, libc::SO_NOSIGPIPE, 1)
}

#[cfg(not(target_vendor = "apple"))]
fn sys_configure(_fd: RawSocket) -> io::Result<()> {
    Ok(())
}

/// Creates a blocking IPv4 TCP socket.
pub(crate) fn sys_socket() -> io::Result<RawSocket> {
    let fd = cvt(unsafe { socket(AF_INET, SOCK_STREAM, IPPROTO_TCP) })?;

    if let Err(e) = sys_configure(fd) {
        sys_close(fd);
        return Err(e);
    }

    Ok(fd)
}

/// Enables `SO_REUSEADDR` on a socket.
pub(crate) fn sys_set_reuseaddr(fd: RawSocket) -> io::Result<()> {
    sys_setsockopt_int(fd, SOL_SOCKET, SO_REUSEADDR, 1)
}

/// Connects a socket to a remote IPv4 endpoint, blocking until the
/// handshake completes or fails.
pub(crate) fn sys_connect(fd: RawSocket, addr: SocketAddrV4) -> io::Result<()> {
    let storage = socketaddr_to_sockaddr_in(addr);

    let rc = unsafe {
        connect(
            fd,
            &storage as *const _ as *const sockaddr,
            mem::size_of::<sockaddr_in>() as socklen_t,
        )
    };

    cvt(rc).map(drop)
}

/// Binds a socket to the wildcard address on `port`.
pub(crate) fn sys_bind_any(fd: RawSocket, port: u16) -> io::Result<()> {
    let storage = socketaddr_to_sockaddr_in(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));

    let rc = unsafe {
        bind(
            fd,
            &storage as *const _ as *const sockaddr,
            mem::size_of::<sockaddr_in>() as socklen_t,
        )
    };

    cvt(rc).map(drop)
}

/// Marks a socket as a listening socket.
pub(crate) fn sys_listen(fd: RawSocket, backlog: c_int) -> io::Result<()> {
    cvt(unsafe { listen(fd, backlog) }).map(drop)
}

/// Blocks until a connection arrives on a listening socket.
///
/// The peer address is only extracted when `with_peer` is set.
pub(crate) fn sys_accept(
    fd: RawSocket,
    with_peer: bool,
) -> io::Result<(RawSocket, Option<SocketAddrV4>)> {
    let (client, peer) = if with_peer {
        let mut storage: sockaddr_in = unsafe { mem::zeroed() };
        let mut len = mem::size_of::<sockaddr_in>() as socklen_t;

        let client = cvt(unsafe {
            accept(fd, &mut storage as *mut _ as *mut sockaddr, &mut len)
        })?;

        (client, Some(sockaddr_in_to_socketaddr(&storage)))
    } else {
        let client = cvt(unsafe { accept(fd, ptr::null_mut(), ptr::null_mut()) })?;

        (client, None)
    };

    if let Err(e) = sys_configure(client) {
        sys_close(client);
        return Err(e);
    }

    Ok((client, peer))
}

/// Sends bytes on a connected socket.
///
/// Returns the number of bytes actually written, which may be less than
/// `buffer.len()`.
pub(crate) fn sys_send(fd: RawSocket, buffer: &[u8]) -> io::Result<usize> {
    let rc = unsafe { send(fd, buffer.as_ptr() as *const c_void, buffer.len(), SEND_FLAGS) };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

/// Receives bytes from a connected socket.
///
/// Returns `0` on orderly shutdown by the peer.
pub(crate) fn sys_recv(fd: RawSocket, buffer: &mut [u8]) -> io::Result<usize> {
    let rc = unsafe { recv(fd, buffer.as_mut_ptr() as *mut c_void, buffer.len(), 0) };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc as usize)
    }
}

/// Shuts down part or all of a connection.
pub(crate) fn sys_shutdown(fd: RawSocket, how: Shutdown) -> io::Result<()> {
    let how = match how {
        Shutdown::Read => SHUT_RD,
        Shutdown::Write => SHUT_WR,
        Shutdown::Both => SHUT_RDWR,
    };

    cvt(unsafe { shutdown(fd, how) }).map(drop)
}

/// Returns the local address of a socket.
pub(crate) fn sys_sockname(fd: RawSocket) -> io::Result<SocketAddrV4> {
    let mut storage: sockaddr_in = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_in>() as socklen_t;

    cvt(unsafe { getsockname(fd, &mut storage as *mut _ as *mut sockaddr, &mut len) })?;

    Ok(sockaddr_in_to_socketaddr(&storage))
}

/// Closes a socket descriptor.
pub(crate) fn sys_close(fd: RawSocket) {
    unsafe { close(fd) };
}

/// Converts a `sockaddr_in` to a host-order `SocketAddrV4`.
fn sockaddr_in_to_socketaddr(storage: &sockaddr_in) -> SocketAddrV4 {
    let ip = Ipv4Addr::from(u32::from_be(storage.sin_addr.s_addr));
    let port = u16::from_be(storage.sin_port);

    SocketAddrV4::new(ip, port)
}

/// Converts a `SocketAddrV4` to a network-order `sockaddr_in`.
fn socketaddr_to_sockaddr_in(addr: SocketAddrV4) -> sockaddr_in {
    let mut storage: sockaddr_in = unsafe { mem::zeroed() };

    storage.sin_family = AF_INET as _;
    storage.sin_port = addr.port().to_be();
    storage.sin_addr.s_addr = u32::from(*addr.ip()).to_be();

    storage
}

extern "C" fn thread_start(payload: *mut c_void) -> *mut c_void {
    let main = unsafe { Box::from_raw(payload as *mut ThreadMain) };
    main();

    ptr::null_mut()
}

/// Starts a native thread running `main`.
pub(crate) fn sys_thread_spawn(
    stack_size: Option<usize>,
    main: ThreadMain,
) -> io::Result<RawThread> {
    let payload = Box::into_raw(Box::new(main));

    let spawned = unsafe {
        let mut attr = MaybeUninit::<pthread_attr_t>::uninit();
        let mut native = MaybeUninit::<pthread_t>::uninit();

        match cvt_nz(pthread_attr_init(attr.as_mut_ptr())) {
            Ok(()) => {
                let mut rc = match stack_size {
                    Some(size) => pthread_attr_setstacksize(attr.as_mut_ptr(), size),
                    None => 0,
                };

                if rc == 0 {
                    rc = pthread_create(
                        native.as_mut_ptr(),
                        attr.as_ptr(),
                        thread_start,
                        payload as *mut c_void,
                    );
                }

                pthread_attr_destroy(attr.as_mut_ptr());
                cvt_nz(rc).map(|()| native.assume_init())
            }
            Err(e) => Err(e),
        }
    };

    if spawned.is_err() {
        drop(unsafe { Box::from_raw(payload) });
    }

    spawned
}

/// Blocks until the thread terminates and releases its resources.
pub(crate) fn sys_thread_join(thread: RawThread) -> io::Result<()> {
    cvt_nz(unsafe { pthread_join(thread, ptr::null_mut()) })
}

/// Releases a thread that will never be joined.
pub(crate) fn sys_thread_detach(thread: RawThread) {
    unsafe { pthread_detach(thread) };
}

/// Creates an unlocked recursive mutex.
pub(crate) fn sys_mutex_create() -> io::Result<RawMutex> {
    let mutex = RawMutex(Box::new(UnsafeCell::new(unsafe { mem::zeroed() })));

    unsafe {
        let mut attr = MaybeUninit::<pthread_mutexattr_t>::uninit();
        cvt_nz(pthread_mutexattr_init(attr.as_mut_ptr()))?;

        let mut rc = pthread_mutexattr_settype(attr.as_mut_ptr(), PTHREAD_MUTEX_RECURSIVE);
        if rc == 0 {
            rc = pthread_mutex_init(mutex.0.get(), attr.as_ptr());
        }

        pthread_mutexattr_destroy(attr.as_mut_ptr());
        cvt_nz(rc)?;
    }

    Ok(mutex)
}

/// Acquires the mutex, blocking until it is available.
pub(crate) fn sys_mutex_lock(mutex: &RawMutex) -> io::Result<()> {
    cvt_nz(unsafe { pthread_mutex_lock(mutex.0.get()) })
}

/// Attempts to acquire the mutex without blocking.
pub(crate) fn sys_mutex_try_lock(mutex: &RawMutex) -> io::Result<bool> {
    match unsafe { pthread_mutex_trylock(mutex.0.get()) } {
        0 => Ok(true),
        EBUSY => Ok(false),
        rc => Err(io::Error::from_raw_os_error(rc)),
    }
}

/// Releases one level of ownership of the mutex.
pub(crate) fn sys_mutex_unlock(mutex: &RawMutex) -> io::Result<()> {
    cvt_nz(unsafe { pthread_mutex_unlock(mutex.0.get()) })
}

/// Destroys the mutex and frees its storage.
pub(crate) fn sys_mutex_destroy(mutex: RawMutex) -> io::Result<()> {
    cvt_nz(unsafe { pthread_mutex_destroy(mutex.0.get()) })
}
