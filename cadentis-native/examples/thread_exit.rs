//! Example: leaving a native thread early with a result

use cadentis_native::thread::{self, ThreadBuilder};

fn find_first_even(values: &[u32]) -> u32 {
    for &v in values {
        if v % 2 == 0 {
            // Ends the thread here; join() returns `v`
            thread::exit(v);
        }
    }
    0
}

fn main() {
    let handle = ThreadBuilder::new()
        .name("searcher")
        .spawn(|| find_first_even(&[3, 7, 10, 12]))
        .unwrap();

    println!("first even = {}", handle.join().unwrap());
}
