use cadentis_native::RawSocket;
use cadentis_native::ffi::*;
use cadentis_native::net::Socket;

use std::ffi::{CStr, c_char, c_int, c_void};
use std::mem::{ManuallyDrop, MaybeUninit};
use std::ptr;

fn local_port(socket: RawSocket) -> u16 {
    let socket = ManuallyDrop::new(unsafe { Socket::from_raw(socket) });
    socket.local_addr().expect("Failed to get local address").port
}

fn recv_exact(socket: RawSocket, buffer: &mut [u8]) {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = unsafe {
            cn_socket_recv(
                socket,
                buffer[filled..].as_mut_ptr() as *mut c_char,
                (buffer.len() - filled) as c_int,
            )
        };
        assert!(n > 0, "recv returned {n}");
        filled += n as usize;
    }
}

#[test]
fn test_ffi_socket_round_trip() {
    let server = cn_socket_open(CN_SOCKET_TCP);
    assert_ne!(server, CN_SOCKET_INVALID);
    assert_eq!(unsafe { cn_socket_listen(server, 0) }, 0);
    let port = local_port(server);

    let client = cn_socket_open(CN_SOCKET_TCP);
    assert_ne!(client, CN_SOCKET_INVALID);
    assert_eq!(
        unsafe { cn_socket_connect(client, c"127.0.0.1".as_ptr(), port) },
        0
    );

    let mut info = MaybeUninit::<CnSocketInfo>::uninit();
    let accepted = unsafe { cn_socket_accept(server, info.as_mut_ptr()) };
    assert_ne!(accepted, CN_SOCKET_INVALID);

    let info = unsafe { info.assume_init() };
    let address = unsafe { CStr::from_ptr(info.address.as_ptr()) };
    assert_eq!(address.to_str().expect("Address is not UTF-8"), "127.0.0.1");
    assert_eq!(info.port, local_port(client));

    let message = b"hello";
    let sent = unsafe {
        cn_socket_send(
            client,
            message.as_ptr() as *const c_char,
            message.len() as c_int,
        )
    };
    assert_eq!(sent, message.len() as c_int);

    let mut buffer = [0u8; 5];
    recv_exact(accepted, &mut buffer);
    assert_eq!(&buffer, message);

    unsafe { cn_socket_close(client) };

    let mut rest = [0u8; 8];
    let n = unsafe { cn_socket_recv(accepted, rest.as_mut_ptr() as *mut c_char, 8) };
    assert_eq!(n, 0);

    unsafe {
        cn_socket_close(accepted);
        cn_socket_close(server);
    }
}

#[test]
fn test_ffi_accept_with_null_info() {
    let server = cn_socket_open(CN_SOCKET_TCP);
    assert_eq!(unsafe { cn_socket_listen(server, 0) }, 0);

    let client = cn_socket_open(CN_SOCKET_TCP);
    let port = local_port(server);
    assert_eq!(
        unsafe { cn_socket_connect(client, c"127.0.0.1".as_ptr(), port) },
        0
    );

    let accepted = unsafe { cn_socket_accept(server, ptr::null_mut()) };
    assert_ne!(accepted, CN_SOCKET_INVALID);

    unsafe {
        cn_socket_close(accepted);
        cn_socket_close(client);
        cn_socket_close(server);
    }
}

#[test]
fn test_ffi_socket_failures_use_sentinels() {
    assert_eq!(cn_socket_open(-1), CN_SOCKET_INVALID);

    let client = cn_socket_open(CN_SOCKET_TCP);
    assert_ne!(client, CN_SOCKET_INVALID);

    unsafe {
        assert_eq!(cn_socket_connect(client, c"not an address".as_ptr(), 80), -1);
        assert_eq!(cn_socket_connect(client, ptr::null(), 80), -1);
        assert_eq!(cn_socket_send(client, ptr::null(), 4), -1);
        assert_eq!(cn_socket_recv(client, ptr::null_mut(), -1), -1);
        cn_socket_close(client);
    }
}

#[test]
fn test_ffi_send_to_closed_peer_returns_error() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let server = cn_socket_open(CN_SOCKET_TCP);
    assert_eq!(unsafe { cn_socket_listen(server, 0) }, 0);
    let port = local_port(server);

    let client = cn_socket_open(CN_SOCKET_TCP);
    assert_eq!(
        unsafe { cn_socket_connect(client, c"127.0.0.1".as_ptr(), port) },
        0
    );

    let accepted = unsafe { cn_socket_accept(server, ptr::null_mut()) };
    assert_ne!(accepted, CN_SOCKET_INVALID);
    unsafe { cn_socket_close(accepted) };

    let chunk = [0 as c_char; 1024];
    let failed = (0..1000).any(|_| {
        let n = unsafe { cn_socket_send(client, chunk.as_ptr(), chunk.len() as c_int) };
        if n != -1 {
            assert!(n > 0, "send returned {n}");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        n == -1
    });
    assert!(failed, "sending to a closed peer never returned -1");

    unsafe {
        cn_socket_close(client);
        cn_socket_close(server);
    }
}

extern "C-unwind" fn double(argument: *mut c_void) -> *mut c_void {
    let value = argument as usize;
    (value * 2) as *mut c_void
}

extern "C-unwind" fn exit_early(argument: *mut c_void) -> *mut c_void {
    cn_thread_exit(argument);
}

extern "C-unwind" fn increment(argument: *mut c_void) -> *mut c_void {
    let state = unsafe { &*(argument as *const (usize, *mut c_void)) };
    let (counter, mutex) = (state.0 as *mut usize, state.1);

    for _ in 0..1000 {
        unsafe {
            assert_eq!(cn_mutex_lock(mutex), 0);
            *counter += 1;
            assert_eq!(cn_mutex_unlock(mutex), 0);
        }
    }

    ptr::null_mut()
}

extern "C-unwind" fn explode(_: *mut c_void) -> *mut c_void {
    panic!("entry failed");
}

#[test]
fn test_ffi_thread_join_returns_entry_value() {
    let thread = cn_thread_create(Some(double), 21 as *mut c_void);
    assert!(!thread.is_null());

    let result = unsafe { cn_thread_join(thread) };
    assert_eq!(result as usize, 42);
}

#[test]
fn test_ffi_thread_exit_value_is_joined() {
    let thread = cn_thread_create(Some(exit_early), 7 as *mut c_void);
    assert!(!thread.is_null());

    let result = unsafe { cn_thread_join(thread) };
    assert_eq!(result as usize, 7);
}

#[test]
fn test_ffi_thread_panic_joins_as_null() {
    let thread = cn_thread_create(Some(explode), ptr::null_mut());
    assert!(!thread.is_null());

    assert!(unsafe { cn_thread_join(thread) }.is_null());
}

#[test]
fn test_ffi_mutex_protects_counter() {
    let mutex = cn_mutex_create();
    assert!(!mutex.is_null());

    let mut counter = 0usize;
    let state = (&mut counter as *mut usize as usize, mutex);
    let argument = &state as *const _ as *mut c_void;

    let threads: Vec<_> = (0..4)
        .map(|_| {
            let thread = cn_thread_create(Some(increment), argument);
            assert!(!thread.is_null());
            thread
        })
        .collect();

    for thread in threads {
        unsafe { cn_thread_join(thread) };
    }

    assert_eq!(counter, 4000);
    assert_eq!(unsafe { cn_mutex_destroy(mutex) }, 0);
}

#[test]
fn test_ffi_mutex_status_codes() {
    let mutex = cn_mutex_create();
    assert!(!mutex.is_null());

    unsafe {
        assert_ne!(cn_mutex_unlock(mutex), 0);

        assert_eq!(cn_mutex_lock(mutex), 0);
        assert_eq!(cn_mutex_lock(mutex), 0);
        assert_eq!(cn_mutex_unlock(mutex), 0);
        assert_eq!(cn_mutex_unlock(mutex), 0);

        assert_eq!(cn_mutex_destroy(mutex), 0);
    }
}
