//! Example: blocking TCP echo server with one native thread per client

use cadentis_native::net::{Socket, SocketBuilder, SocketType};
use cadentis_native::thread::Thread;

fn main() {
    // Listen on every interface, port 9000
    let listener = SocketBuilder::new(SocketType::Tcp)
        .reuse_address(true)
        .open()
        .unwrap();
    listener.listen(9000).unwrap();
    println!("Echo server listening on 0.0.0.0:9000");

    loop {
        let (stream, peer) = listener.accept().unwrap();
        println!("Accepted connection from {}:{}", peer.address, peer.port);

        // Dropping the handle detaches the thread
        Thread::spawn(move || handle_client(stream)).unwrap();
    }
}

// Echo handler: reads data and writes it back until the client hangs up
fn handle_client(stream: Socket) {
    let mut buf = [0u8; 1024];
    loop {
        let n = match stream.recv(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if stream.send_all(&buf[..n]).is_err() {
            break;
        }
    }
}
