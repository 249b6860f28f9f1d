//! C ABI surface.
//!
//! Flat functions over opaque handles for embedders linking the `cdylib` or
//! `staticlib` build. Failures are reported with sentinel values instead of
//! `Result`:
//!
//! - socket functions returning a descriptor yield [`CN_SOCKET_INVALID`],
//! - socket functions returning a status or count yield `-1`,
//! - thread and mutex constructors yield `NULL`,
//! - mutex operations yield `0` on success and the native error code (or
//!   `-1` when none is available) on failure.
//!
//! Ports are in host byte order in both directions.
//!
//! Handles follow the same rules as their Rust counterparts: each socket is
//! closed once, each thread joined once, each mutex destroyed once. Breaking
//! those rules is undefined behavior and is not checked.

use crate::error::Result;
use crate::net::{SOCKET_INFO_ADDRESS_LEN, Socket, SocketInfo, SocketType};
use crate::sync::Mutex;
use crate::sys::RawSocket;
use crate::sys::platform::INVALID_SOCKET;
use crate::thread::{self, Thread};

use std::ffi::{CStr, c_char, c_int, c_void};
use std::mem::ManuallyDrop;
use std::{ptr, slice};

/// Value of the TCP socket type.
pub const CN_SOCKET_TCP: c_int = SocketType::Tcp as c_int;

/// Descriptor returned when a socket cannot be opened or accepted.
pub const CN_SOCKET_INVALID: RawSocket = INVALID_SOCKET;

/// Thread entry point: receives the argument given to [`cn_thread_create`]
/// and returns the value handed to [`cn_thread_join`].
///
/// Declared `C-unwind` so [`cn_thread_exit`] can unwind through it.
pub type CnThreadEntry = extern "C-unwind" fn(*mut c_void) -> *mut c_void;

/// Peer description filled in by [`cn_socket_accept`].
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CnSocketInfo {
    /// NUL-terminated textual IPv4 address.
    pub address: [c_char; SOCKET_INFO_ADDRESS_LEN],

    /// Port in host byte order.
    pub port: u16,
}

impl From<&SocketInfo> for CnSocketInfo {
    fn from(info: &SocketInfo) -> Self {
        let mut address = [0 as c_char; SOCKET_INFO_ADDRESS_LEN];

        for (dst, src) in address
            .iter_mut()
            .zip(info.address.bytes().take(SOCKET_INFO_ADDRESS_LEN - 1))
        {
            *dst = src as c_char;
        }

        Self {
            address,
            port: info.port,
        }
    }
}

/// Raw pointer that may cross threads.
///
/// The pointee is owned by the C caller, which is responsible for its
/// synchronization.
struct SendPtr(*mut c_void);

// Safety: see the type documentation.
unsafe impl Send for SendPtr {}

/// Borrows a descriptor as a `Socket` that is not closed when dropped.
///
/// # Safety
///
/// `socket` must be a descriptor returned by this module and not yet closed.
unsafe fn borrowed(socket: RawSocket) -> ManuallyDrop<Socket> {
    ManuallyDrop::new(unsafe { Socket::from_raw(socket) })
}

/// Maps a status result to `0` / `-1`.
fn status(result: Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Maps a byte count result to the count / `-1`.
fn count(result: Result<usize>) -> c_int {
    match result {
        Ok(n) => n.min(c_int::MAX as usize) as c_int,
        Err(_) => -1,
    }
}

/// Maps a mutex result to `0` / native error code.
fn code(result: Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(e) => e.raw_os_error().filter(|&code| code != 0).unwrap_or(-1),
    }
}

/// Opens a socket of the given type.
///
/// Returns [`CN_SOCKET_INVALID`] for an unknown type or on failure.
#[unsafe(no_mangle)]
pub extern "C" fn cn_socket_open(kind: c_int) -> RawSocket {
    match SocketType::try_from(kind) {
        Ok(kind) => Socket::open(kind)
            .map(Socket::into_raw)
            .unwrap_or(CN_SOCKET_INVALID),
        Err(_) => CN_SOCKET_INVALID,
    }
}

/// Connects a socket to `address:port`.
///
/// # Safety
///
/// `socket` must be open and `address` must be NULL or a NUL-terminated
/// string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_socket_connect(
    socket: RawSocket,
    address: *const c_char,
    port: u16,
) -> c_int {
    if address.is_null() {
        return -1;
    }

    let Ok(address) = unsafe { CStr::from_ptr(address) }.to_str() else {
        return -1;
    };

    status(unsafe { borrowed(socket) }.connect(address, port))
}

/// Binds a socket to the wildcard address on `port` and starts listening.
///
/// # Safety
///
/// `socket` must be open.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_socket_listen(socket: RawSocket, port: u16) -> c_int {
    status(unsafe { borrowed(socket) }.listen(port))
}

/// Accepts a connection, filling `info` when it is not NULL.
///
/// # Safety
///
/// `socket` must be a listening socket and `info` must be NULL or valid for
/// writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_socket_accept(
    socket: RawSocket,
    info: *mut CnSocketInfo,
) -> RawSocket {
    let listener = unsafe { borrowed(socket) };

    if info.is_null() {
        return listener
            .accept_without_info()
            .map(Socket::into_raw)
            .unwrap_or(CN_SOCKET_INVALID);
    }

    match listener.accept() {
        Ok((client, peer)) => {
            unsafe { info.write(CnSocketInfo::from(&peer)) };
            client.into_raw()
        }
        Err(_) => CN_SOCKET_INVALID,
    }
}

/// Sends up to `size` bytes from `buffer`.
///
/// # Safety
///
/// `socket` must be connected and `buffer` valid for `size` bytes of reads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_socket_send(
    socket: RawSocket,
    buffer: *const c_char,
    size: c_int,
) -> c_int {
    let buffer: &[u8] = match size {
        ..=-1 => return -1,
        0 => &[],
        _ if buffer.is_null() => return -1,
        _ => unsafe { slice::from_raw_parts(buffer as *const u8, size as usize) },
    };

    count(unsafe { borrowed(socket) }.send(buffer))
}

/// Receives up to `size` bytes into `buffer`.
///
/// # Safety
///
/// `socket` must be connected and `buffer` valid for `size` bytes of writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_socket_recv(
    socket: RawSocket,
    buffer: *mut c_char,
    size: c_int,
) -> c_int {
    let buffer: &mut [u8] = match size {
        ..=-1 => return -1,
        0 => &mut [],
        _ if buffer.is_null() => return -1,
        _ => unsafe { slice::from_raw_parts_mut(buffer as *mut u8, size as usize) },
    };

    count(unsafe { borrowed(socket) }.recv(buffer))
}

/// Closes a socket.
///
/// # Safety
///
/// `socket` must be open; it must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_socket_close(socket: RawSocket) {
    drop(unsafe { Socket::from_raw(socket) });
}

/// Starts a thread calling `entry(argument)`.
///
/// Returns NULL if `entry` is NULL or the thread cannot be created.
#[unsafe(no_mangle)]
pub extern "C" fn cn_thread_create(
    entry: Option<CnThreadEntry>,
    argument: *mut c_void,
) -> *mut c_void {
    let Some(entry) = entry else {
        return ptr::null_mut();
    };

    match Thread::create(move |arg: SendPtr| SendPtr(entry(arg.0)), SendPtr(argument)) {
        Ok(thread) => Box::into_raw(Box::new(thread)) as *mut c_void,
        Err(_) => ptr::null_mut(),
    }
}

/// Waits for a thread and returns its result, or NULL if it failed.
///
/// # Safety
///
/// `thread` must come from [`cn_thread_create`] and not have been joined.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_thread_join(thread: *mut c_void) -> *mut c_void {
    if thread.is_null() {
        return ptr::null_mut();
    }

    let thread = unsafe { Box::from_raw(thread as *mut Thread<SendPtr>) };

    thread.join().map(|value| value.0).unwrap_or(ptr::null_mut())
}

/// Terminates the calling thread with `value` as its result.
///
/// Must be called from a thread started by [`cn_thread_create`]; every
/// frame between the entry point and this call must allow unwinding.
#[unsafe(no_mangle)]
pub extern "C-unwind" fn cn_thread_exit(value: *mut c_void) -> ! {
    thread::exit(SendPtr(value))
}

/// Creates an unlocked recursive mutex, or returns NULL.
#[unsafe(no_mangle)]
pub extern "C" fn cn_mutex_create() -> *mut c_void {
    match Mutex::new() {
        Ok(mutex) => Box::into_raw(Box::new(mutex)) as *mut c_void,
        Err(_) => ptr::null_mut(),
    }
}

/// Resolves a mutex handle.
///
/// # Safety
///
/// `mutex` must be NULL or come from [`cn_mutex_create`] and not have been
/// destroyed.
unsafe fn mutex_ref<'a>(mutex: *mut c_void) -> Option<&'a Mutex> {
    unsafe { (mutex as *const Mutex).as_ref() }
}

/// Locks a mutex.
///
/// # Safety
///
/// See [`cn_mutex_create`]; the handle must not have been destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_mutex_lock(mutex: *mut c_void) -> c_int {
    match unsafe { mutex_ref(mutex) } {
        Some(mutex) => code(mutex.lock()),
        None => -1,
    }
}

/// Unlocks a mutex held by the calling thread.
///
/// # Safety
///
/// See [`cn_mutex_create`]; the handle must not have been destroyed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_mutex_unlock(mutex: *mut c_void) -> c_int {
    match unsafe { mutex_ref(mutex) } {
        Some(mutex) => code(mutex.unlock()),
        None => -1,
    }
}

/// Destroys a mutex.
///
/// # Safety
///
/// No thread may hold or wait on the mutex, and the handle must not be used
/// afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn cn_mutex_destroy(mutex: *mut c_void) -> c_int {
    if mutex.is_null() {
        return -1;
    }

    code(unsafe { Box::from_raw(mutex as *mut Mutex) }.destroy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_info_is_nul_terminated() {
        let info = CnSocketInfo::from(&SocketInfo {
            address: "192.168.10.200".into(),
            port: 443,
        });

        let text = unsafe { CStr::from_ptr(info.address.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "192.168.10.200");
        assert_eq!(info.port, 443);
    }

    #[test]
    fn oversized_address_is_truncated() {
        let info = CnSocketInfo::from(&SocketInfo {
            address: "x".repeat(100),
            port: 1,
        });

        assert_eq!(info.address[SOCKET_INFO_ADDRESS_LEN - 1], 0);
        let text = unsafe { CStr::from_ptr(info.address.as_ptr()) };
        assert_eq!(text.to_bytes().len(), SOCKET_INFO_ADDRESS_LEN - 1);
    }

    #[test]
    fn mutex_codes() {
        assert_eq!(code(Ok(())), 0);
        assert_eq!(code(Err(std::io::Error::from_raw_os_error(1).into())), 1);
        assert_eq!(code(Err(crate::Error::ExitValueMismatch)), -1);
    }

    #[test]
    fn unknown_socket_type_is_invalid() {
        assert_eq!(cn_socket_open(42), CN_SOCKET_INVALID);
    }

    #[test]
    fn null_handles_are_rejected() {
        unsafe {
            assert!(cn_thread_join(ptr::null_mut()).is_null());
            assert_eq!(cn_mutex_lock(ptr::null_mut()), -1);
            assert_eq!(cn_mutex_destroy(ptr::null_mut()), -1);
        }
        assert!(cn_thread_create(None, ptr::null_mut()).is_null());
    }
}
