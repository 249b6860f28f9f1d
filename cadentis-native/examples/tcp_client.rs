//! Example: blocking TCP client

use cadentis_native::net::{Socket, SocketType};

fn main() {
    let stream = Socket::open(SocketType::Tcp).unwrap();

    // Connect to a TCP server at localhost:9000
    match stream.connect("127.0.0.1", 9000) {
        Ok(()) => {
            let msg = b"Hello from client!";
            stream.send_all(msg).unwrap();
            println!("Sent: {}", String::from_utf8_lossy(msg));

            let mut buf = [0u8; 1024];
            let n = stream.recv(&mut buf).unwrap();
            println!("Received: {}", String::from_utf8_lossy(&buf[..n]));
        }
        Err(e) => {
            println!("Failed to connect: {}", e);
        }
    }
}
