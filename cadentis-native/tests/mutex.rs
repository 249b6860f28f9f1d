use cadentis_native::sync::Mutex;
use cadentis_native::thread::Thread;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Runs `f` on another native thread and returns its result.
fn on_other_thread<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Thread::spawn(f)
        .expect("Failed to spawn thread")
        .join()
        .expect("Thread failed")
}

#[test]
fn test_mutex_mutual_exclusion() {
    let mutex = Arc::new(Mutex::new().expect("Failed to create mutex"));
    let inside = Arc::new(AtomicUsize::new(0));
    let total = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let mutex = mutex.clone();
            let inside = inside.clone();
            let total = total.clone();

            Thread::spawn(move || {
                for _ in 0..200 {
                    mutex.lock().expect("Failed to lock");

                    let holders = inside.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(holders, 0, "two threads inside the critical section");

                    let seen = total.load(Ordering::SeqCst);
                    std::thread::yield_now();
                    total.store(seen + 1, Ordering::SeqCst);

                    inside.fetch_sub(1, Ordering::SeqCst);
                    mutex.unlock().expect("Failed to unlock");
                }
            })
            .expect("Failed to spawn thread")
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread failed");
    }

    assert_eq!(total.load(Ordering::SeqCst), 8 * 200);
}

#[test]
fn test_mutex_lock_blocks_until_unlock() {
    let mutex = Arc::new(Mutex::new().expect("Failed to create mutex"));
    let released = Arc::new(AtomicBool::new(false));

    mutex.lock().expect("Failed to lock");

    let waiter = {
        let mutex = mutex.clone();
        let released = released.clone();

        Thread::spawn(move || {
            mutex.lock().expect("Failed to lock");
            let observed = released.load(Ordering::SeqCst);
            mutex.unlock().expect("Failed to unlock");
            observed
        })
        .expect("Failed to spawn thread")
    };

    std::thread::sleep(Duration::from_millis(50));
    released.store(true, Ordering::SeqCst);
    mutex.unlock().expect("Failed to unlock");

    assert!(waiter.join().expect("Thread failed"));
}

#[test]
fn test_mutex_is_recursive() {
    let mutex = Arc::new(Mutex::new().expect("Failed to create mutex"));

    mutex.lock().expect("First lock failed");
    mutex.lock().expect("Recursive lock failed");

    let probe = |mutex: &Arc<Mutex>| {
        let mutex = mutex.clone();
        on_other_thread(move || {
            let acquired = mutex.try_lock().expect("try_lock failed");
            if acquired {
                mutex.unlock().expect("Failed to unlock");
            }
            acquired
        })
    };

    assert!(!probe(&mutex), "acquired while held twice");

    mutex.unlock().expect("First unlock failed");
    assert!(!probe(&mutex), "acquired while still held once");

    mutex.unlock().expect("Second unlock failed");
    assert!(probe(&mutex), "not released after matching unlocks");
}

#[test]
fn test_mutex_unlock_by_non_owner_fails() {
    let mutex = Arc::new(Mutex::new().expect("Failed to create mutex"));
    mutex.lock().expect("Failed to lock");

    let other = mutex.clone();
    let result = on_other_thread(move || other.unlock().is_err());
    assert!(result, "a thread released a lock it did not hold");

    mutex.unlock().expect("Owner failed to unlock");
}

#[test]
fn test_mutex_unlock_without_lock_fails() {
    let mutex = Mutex::new().expect("Failed to create mutex");

    let err = mutex.unlock().expect_err("Unlocking a free mutex should fail");
    assert!(err.raw_os_error().is_some());
}

#[test]
fn test_mutex_guard_unlocks_on_drop() {
    let mutex = Arc::new(Mutex::new().expect("Failed to create mutex"));

    let guard = mutex.guard().expect("Failed to lock");
    let other = mutex.clone();
    assert!(!on_other_thread(move || other.try_lock().expect("try_lock failed")));

    drop(guard);

    let other = mutex.clone();
    assert!(on_other_thread(move || {
        let acquired = other.try_lock().expect("try_lock failed");
        other.unlock().expect("Failed to unlock");
        acquired
    }));
}

#[test]
fn test_mutex_destroy_after_use() {
    let mutex = Mutex::new().expect("Failed to create mutex");

    for _ in 0..3 {
        mutex.lock().expect("Failed to lock");
        mutex.unlock().expect("Failed to unlock");
    }

    mutex.destroy().expect("Failed to destroy mutex");
}

#[test]
fn test_mutex_destroy_after_threads_finish() {
    let mutex = Arc::new(Mutex::new().expect("Failed to create mutex"));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let mutex = mutex.clone();
            Thread::spawn(move || {
                let _guard = mutex.guard().expect("Failed to lock");
            })
            .expect("Failed to spawn thread")
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread failed");
    }

    let mutex = Arc::try_unwrap(mutex).expect("Mutex still shared");
    mutex.destroy().expect("Failed to destroy mutex");
}
