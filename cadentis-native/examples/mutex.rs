//! Example: native threads sharing a counter behind a native mutex

use cadentis_native::sync::Mutex;
use cadentis_native::thread::Thread;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn main() {
    let mutex = Arc::new(Mutex::new().unwrap());
    let counter = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();

    for _ in 0..10 {
        let mutex = mutex.clone();
        let counter = counter.clone();
        handles.push(
            Thread::spawn(move || {
                let _guard = mutex.guard().unwrap();
                let value = counter.load(Ordering::Relaxed);
                counter.store(value + 1, Ordering::Relaxed);
            })
            .unwrap(),
        );
    }

    for handle in handles {
        handle.join().unwrap();
    }

    println!("counter = {}", counter.load(Ordering::Relaxed));
    Arc::try_unwrap(mutex).ok().unwrap().destroy().unwrap();
}
