//! Windows platform abstraction layer.
//!
//! Mirrors the Unix layer function for function. Sockets go through
//! Winsock 2.2, threads through `CreateThread`, and mutexes are Win32 mutex
//! objects, which are recursive natively.

use super::ThreadMain;

use std::ffi::c_void;
use std::io;
use std::mem;
use std::net::{Ipv4Addr, Shutdown, SocketAddrV4};
use std::ptr;
use std::sync::OnceLock;

use windows_sys::Win32::Foundation::{
    CloseHandle, HANDLE, WAIT_ABANDONED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::Networking::WinSock::{
    AF_INET, INVALID_SOCKET as WS_INVALID_SOCKET, IPPROTO_TCP, SD_BOTH, SD_RECEIVE, SD_SEND,
    SO_REUSEADDR, SOCK_STREAM, SOCKADDR, SOCKADDR_IN, SOCKET, SOCKET_ERROR, SOL_SOCKET, SOMAXCONN,
    WSADATA, WSAStartup, accept, bind, closesocket, connect, getsockname, listen, recv, send,
    setsockopt, shutdown, socket,
};
use windows_sys::Win32::System::Threading::{
    CreateMutexW, CreateThread, INFINITE, ReleaseMutex, STACK_SIZE_PARAM_IS_A_RESERVATION,
    WaitForSingleObject,
};

/// Raw socket descriptor type on Windows.
pub type RawSocket = SOCKET;

/// Descriptor value never returned by a successful `socket` call.
pub(crate) const INVALID_SOCKET: RawSocket = WS_INVALID_SOCKET;

/// Backlog used by `listen` when none is configured.
pub(crate) const DEFAULT_BACKLOG: i32 = SOMAXCONN as i32;

/// Native thread handle.
pub(crate) type RawThread = HANDLE;

/// Win32 mutex object handle.
pub(crate) struct RawMutex(HANDLE);

/// Creates a MAKEWORD value for Winsock version.
#[inline]
const fn makeword(low: u8, high: u8) -> u16 {
    ((high as u16) << 8) | (low as u16)
}

/// Result of the one-time `WSAStartup` call.
static WINSOCK_INIT: OnceLock<i32> = OnceLock::new();

/// Initializes Winsock if not already initialized.
///
/// The outcome of the first attempt is cached for the whole process; on
/// failure the `WSAStartup` error code is returned.
pub(crate) fn sys_startup() -> Result<(), i32> {
    let rc = *WINSOCK_INIT.get_or_init(|| unsafe {
        let mut data: WSADATA = mem::zeroed();
        WSAStartup(makeword(2, 2), &mut data as *mut _)
    });

    if rc == 0 { Ok(()) } else { Err(rc) }
}

/// Converts a Winsock return value into an `io::Result`.
fn cvt(rc: i32) -> io::Result<i32> {
    if rc == SOCKET_ERROR {
        Err(io::Error::last_os_error())
    } else {
        Ok(rc)
    }
}

/// Creates a blocking IPv4 TCP socket.
pub(crate) fn sys_socket() -> io::Result<RawSocket> {
    let fd = unsafe { socket(AF_INET as i32, SOCK_STREAM, IPPROTO_TCP) };

    if fd == INVALID_SOCKET {
        Err(io::Error::last_os_error())
    } else {
        Ok(fd)
    }
}

/// Sets the `SO_REUSEADDR` option on a socket.
pub(crate) fn sys_set_reuseaddr(fd: RawSocket) -> io::Result<()> {
    let yes: i32 = 1;

    let rc = unsafe {
        setsockopt(
            fd,
            SOL_SOCKET,
            SO_REUSEADDR,
            &yes as *const _ as *const u8,
            mem::size_of::<i32>() as i32,
        )
    };

    cvt(rc).map(drop)
}

/// Connects a socket to a remote IPv4 endpoint, blocking until the
/// handshake completes or fails.
pub(crate) fn sys_connect(fd: RawSocket, addr: SocketAddrV4) -> io::Result<()> {
    let storage = socketaddr_to_sockaddr_in(addr);

    let rc = unsafe {
        connect(
            fd,
            &storage as *const _ as *const SOCKADDR,
            mem::size_of::<SOCKADDR_IN>() as i32,
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
            &storage as *const _ as *const SOCKADDR,
            mem::size_of::<SOCKADDR_IN>() as i32,
        )
    };

    cvt(rc).map(drop)
}

/// Puts a socket into listening mode.
pub(crate) fn sys_listen(fd: RawSocket, backlog: i32) -> io::Result<()> {
    cvt(unsafe { listen(fd, backlog) }).map(drop)
}

/// Blocks until a connection arrives on a listening socket.
///
/// The peer address is only extracted when `with_peer` is set.
pub(crate) fn sys_accept(
    fd: RawSocket,
    with_peer: bool,
) -> io::Result<(RawSocket, Option<SocketAddrV4>)> {
    let mut storage: SOCKADDR_IN = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<SOCKADDR_IN>() as i32;

    let client = unsafe {
        if with_peer {
            accept(fd, &mut storage as *mut _ as *mut SOCKADDR, &mut len)
        } else {
            accept(fd, ptr::null_mut(), ptr::null_mut())
        }
    };

    if client == INVALID_SOCKET {
        return Err(io::Error::last_os_error());
    }

    let peer = with_peer.then(|| sockaddr_in_to_socketaddr(&storage));

    Ok((client, peer))
}

/// Sends bytes on a connected socket.
///
/// Returns the number of bytes actually written. Buffers larger than
/// `i32::MAX` are truncated to one partial write.
pub(crate) fn sys_send(fd: RawSocket, buffer: &[u8]) -> io::Result<usize> {
    let len = buffer.len().min(i32::MAX as usize) as i32;
    let rc = cvt(unsafe { send(fd, buffer.as_ptr(), len, 0) })?;

    Ok(rc as usize)
}

/// Receives bytes from a connected socket.
///
/// Returns `0` on orderly shutdown by the peer.
pub(crate) fn sys_recv(fd: RawSocket, buffer: &mut [u8]) -> io::Result<usize> {
    let len = buffer.len().min(i32::MAX as usize) as i32;
    let rc = cvt(unsafe { recv(fd, buffer.as_mut_ptr(), len, 0) })?;

    Ok(rc as usize)
}

/// Shuts down part or all of a socket connection.
pub(crate) fn sys_shutdown(fd: RawSocket, how: Shutdown) -> io::Result<()> {
    let how = match how {
        Shutdown::Read => SD_RECEIVE,
        Shutdown::Write => SD_SEND,
        Shutdown::Both => SD_BOTH,
    };

    cvt(unsafe { shutdown(fd, how) }).map(drop)
}

/// Gets the local address of a socket.
pub(crate) fn sys_sockname(fd: RawSocket) -> io::Result<SocketAddrV4> {
    let mut storage: SOCKADDR_IN = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<SOCKADDR_IN>() as i32;

    cvt(unsafe { getsockname(fd, &mut storage as *mut _ as *mut SOCKADDR, &mut len) })?;

    Ok(sockaddr_in_to_socketaddr(&storage))
}

/// Closes a socket.
pub(crate) fn sys_close(fd: RawSocket) {
    unsafe {
        let _ = closesocket(fd);
    }
}

/// Converts a SOCKADDR_IN to a host-order SocketAddrV4.
fn sockaddr_in_to_socketaddr(storage: &SOCKADDR_IN) -> SocketAddrV4 {
    let ip = unsafe { Ipv4Addr::from(u32::from_be(storage.sin_addr.S_un.S_addr)) };

    SocketAddrV4::new(ip, u16::from_be(storage.sin_port))
}

/// Converts a SocketAddrV4 to a network-order SOCKADDR_IN.
fn socketaddr_to_sockaddr_in(addr: SocketAddrV4) -> SOCKADDR_IN {
    let mut storage: SOCKADDR_IN = unsafe { mem::zeroed() };

    storage.sin_family = AF_INET;
    storage.sin_port = addr.port().to_be();
    storage.sin_addr.S_un.S_addr = u32::from(*addr.ip()).to_be();

    storage
}

unsafe extern "system" fn thread_start(payload: *mut c_void) -> u32 {
    let main = unsafe { Box::from_raw(payload as *mut ThreadMain) };
    main();

    0
}

/// Starts a native thread running `main`.
pub(crate) fn sys_thread_spawn(
    stack_size: Option<usize>,
    main: ThreadMain,
) -> io::Result<RawThread> {
    let payload = Box::into_raw(Box::new(main));

    let handle = unsafe {
        CreateThread(
            ptr::null(),
            stack_size.unwrap_or(0),
            Some(thread_start),
            payload as *const c_void,
            STACK_SIZE_PARAM_IS_A_RESERVATION,
            ptr::null_mut(),
        )
    };

    if handle.is_null() {
        let err = io::Error::last_os_error();
        drop(unsafe { Box::from_raw(payload) });
        return Err(err);
    }

    Ok(handle)
}

/// Blocks until the thread terminates and releases its handle.
pub(crate) fn sys_thread_join(thread: RawThread) -> io::Result<()> {
    let rc = unsafe { WaitForSingleObject(thread, INFINITE) };

    let result = if rc == WAIT_OBJECT_0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    };

    unsafe { CloseHandle(thread) };

    result
}

/// Releases a thread that will never be joined.
pub(crate) fn sys_thread_detach(thread: RawThread) {
    unsafe { CloseHandle(thread) };
}

/// Creates an unowned mutex object.
pub(crate) fn sys_mutex_create() -> io::Result<RawMutex> {
    let handle = unsafe { CreateMutexW(ptr::null(), 0, ptr::null()) };

    if handle.is_null() {
        Err(io::Error::last_os_error())
    } else {
        Ok(RawMutex(handle))
    }
}

/// Waits on the mutex with the given timeout in milliseconds.
///
/// An abandoned mutex counts as acquired: ownership passes to the caller.
fn sys_mutex_wait(mutex: &RawMutex, timeout: u32) -> io::Result<bool> {
    match unsafe { WaitForSingleObject(mutex.0, timeout) } {
        WAIT_OBJECT_0 | WAIT_ABANDONED => Ok(true),
        WAIT_TIMEOUT => Ok(false),
        _ => Err(io::Error::last_os_error()),
    }
}

/// Acquires the mutex, blocking until it is available.
pub(crate) fn sys_mutex_lock(mutex: &RawMutex) -> io::Result<()> {
    sys_mutex_wait(mutex, INFINITE).map(drop)
}

/// Attempts to acquire the mutex without blocking.
pub(crate) fn sys_mutex_try_lock(mutex: &RawMutex) -> io::Result<bool> {
    sys_mutex_wait(mutex, 0)
}

/// Releases one level of ownership of the mutex.
pub(crate) fn sys_mutex_unlock(mutex: &RawMutex) -> io::Result<()> {
    if unsafe { ReleaseMutex(mutex.0) } == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Closes the mutex handle.
pub(crate) fn sys_mutex_destroy(mutex: RawMutex) -> io::Result<()> {
    if unsafe { CloseHandle(mutex.0) } == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
