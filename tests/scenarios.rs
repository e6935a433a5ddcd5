use acceleratus_sync::{LockError, RecursiveSharedLock, ThreadIdentity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn eventually(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

/// Run `f` on a fresh thread and hand back its result.
fn on_other_thread<T: Send>(f: impl FnOnce() -> T + Send) -> T {
    thread::scope(|scope| scope.spawn(f).join().unwrap())
}

#[test]
fn nested_writer_keeps_reader_out_until_last_release() {
    let lock = RecursiveSharedLock::new();

    lock.acquire_exclusive().unwrap();
    lock.acquire_exclusive().unwrap();
    assert_eq!(lock.exclusive_depth(), 2);
    assert_eq!(on_other_thread(|| lock.try_acquire_shared()), Ok(false));

    lock.release_exclusive().unwrap();
    assert_eq!(on_other_thread(|| lock.try_acquire_shared()), Ok(false));

    lock.release_exclusive().unwrap();
    let admitted = on_other_thread(|| {
        let admitted = lock.try_acquire_shared();
        lock.release_shared().unwrap();
        admitted
    });
    assert_eq!(admitted, Ok(true));
}

#[test]
fn two_readers_keep_writer_out() {
    let lock = RecursiveSharedLock::new();
    let (release_a, a_released) = mpsc::channel::<()>();
    let (release_b, b_released) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel();
    let holders = Barrier::new(3);

    thread::scope(|scope| {
        for release in [a_released, b_released] {
            let (lock, holders, done_tx) = (&lock, &holders, done_tx.clone());
            scope.spawn(move || {
                lock.acquire_shared().unwrap();
                holders.wait();
                release.recv().unwrap();
                lock.release_shared().unwrap();
                done_tx.send(()).unwrap();
            });
        }

        // Both readers hold the lock at the same time.
        holders.wait();
        assert_eq!(lock.snapshot().shared_holders, 2);
        assert_eq!(lock.try_acquire_exclusive(), Ok(false));

        release_a.send(()).unwrap();
        done_rx.recv().unwrap();
        assert_eq!(lock.try_acquire_exclusive(), Ok(false));

        release_b.send(()).unwrap();
        done_rx.recv().unwrap();
        assert_eq!(lock.try_acquire_exclusive(), Ok(true));
        lock.release_exclusive().unwrap();
    });
}

#[test]
fn stray_release_does_not_disturb_others() {
    let lock = RecursiveSharedLock::new();

    assert_eq!(lock.release_exclusive(), Err(LockError::NotExclusiveOwner));
    assert!(!lock.snapshot().is_contended());

    let (writer, reader) = thread::scope(|scope| {
        let writer = scope.spawn(|| {
            let result = lock.try_acquire_exclusive();
            lock.release_exclusive().unwrap();
            result
        });
        let writer = writer.join().unwrap();

        let reader = scope.spawn(|| lock.shared().map(drop)).join().unwrap();
        (writer, reader)
    });

    assert_eq!(writer, Ok(true));
    assert_eq!(reader, Ok(()));
}

#[test]
fn release_by_non_owner_thread_is_rejected() {
    let lock = RecursiveSharedLock::new();
    lock.acquire_exclusive().unwrap();

    assert_eq!(
        on_other_thread(|| lock.release_exclusive()),
        Err(LockError::NotExclusiveOwner)
    );
    assert_eq!(lock.exclusive_depth(), 1);
    lock.release_exclusive().unwrap();
}

#[test]
fn mutual_exclusion_under_load() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    let lock = RecursiveSharedLock::new();
    let writers = AtomicUsize::new(0);
    let readers = AtomicUsize::new(0);

    thread::scope(|scope| {
        for index in 0..THREADS {
            let (lock, writers, readers) = (&lock, &writers, &readers);
            scope.spawn(move || {
                for round in 0..ROUNDS {
                    if (index + round) % 3 == 0 {
                        let _outer = lock.exclusive().unwrap();
                        assert_eq!(writers.fetch_add(1, Ordering::SeqCst), 0);
                        assert_eq!(readers.load(Ordering::SeqCst), 0);

                        // Re-entry in both modes must not let anyone else in.
                        let _inner = lock.exclusive().unwrap();
                        let _read = lock.shared().unwrap();
                        assert_eq!(writers.load(Ordering::SeqCst), 1);

                        writers.fetch_sub(1, Ordering::SeqCst);
                    } else {
                        let _outer = lock.shared().unwrap();
                        readers.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(writers.load(Ordering::SeqCst), 0);

                        let _inner = lock.shared().unwrap();
                        assert_eq!(writers.load(Ordering::SeqCst), 0);

                        readers.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    assert!(!lock.snapshot().is_contended());
}

#[test]
fn readers_share_concurrently() {
    const READERS: usize = 6;

    let lock = RecursiveSharedLock::new();
    let barrier = Barrier::new(READERS);

    thread::scope(|scope| {
        for _ in 0..READERS {
            scope.spawn(|| {
                assert_eq!(lock.try_acquire_shared(), Ok(true));
                // Nobody gets past this unless every reader holds at once.
                barrier.wait();
                lock.release_shared().unwrap();
            });
        }
    });

    assert!(!lock.is_locked());
}

#[test]
fn exclusive_owner_reads_without_letting_writers_in() {
    let lock = RecursiveSharedLock::new();
    lock.acquire_exclusive().unwrap();

    for _ in 0..5 {
        lock.acquire_shared().unwrap();
        assert_eq!(on_other_thread(|| lock.try_acquire_exclusive()), Ok(false));
        lock.release_shared().unwrap();
        assert_eq!(lock.exclusive_depth(), 1);
    }

    lock.release_exclusive().unwrap();
    assert!(!lock.is_locked());
}

#[test]
fn blocked_writers_all_get_in() {
    const WRITERS: usize = 4;

    let lock = Arc::new(RecursiveSharedLock::new());
    let admitted = Arc::new(AtomicUsize::new(0));
    lock.acquire_shared().unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let (lock, admitted) = (lock.clone(), admitted.clone());
            thread::spawn(move || {
                lock.acquire_exclusive().unwrap();
                admitted.fetch_add(1, Ordering::SeqCst);
                lock.release_exclusive().unwrap();
            })
        })
        .collect();

    eventually("writers to block", || {
        lock.snapshot().waiting_exclusive == WRITERS
    });
    assert_eq!(admitted.load(Ordering::SeqCst), 0);

    lock.release_shared().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), WRITERS);
    assert_eq!(lock.snapshot().waiters(), 0);
}

#[test]
fn blocked_readers_all_get_in_after_writer() {
    const READERS: usize = 5;

    let lock = Arc::new(RecursiveSharedLock::new());
    lock.acquire_exclusive().unwrap();

    let handles: Vec<_> = (0..READERS)
        .map(|_| {
            let lock = lock.clone();
            thread::spawn(move || lock.acquire_shared().and_then(|_| lock.release_shared()))
        })
        .collect();

    eventually("readers to block", || {
        lock.snapshot().waiting_shared == READERS
    });

    lock.release_exclusive().unwrap();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert!(!lock.snapshot().is_contended());
}

#[test]
fn synthetic_identities_model_threads() {
    let lock = RecursiveSharedLock::new();
    let a = lock.identified(ThreadIdentity::synthetic(1));
    let b = lock.identified(ThreadIdentity::synthetic(2));

    a.acquire_shared().unwrap();
    b.acquire_shared().unwrap();
    assert_eq!(a.try_acquire_exclusive(), Err(LockError::UpgradeNotSupported));

    a.release_shared().unwrap();
    b.release_shared().unwrap();
    assert_eq!(a.try_acquire_exclusive(), Ok(true));
    assert_eq!(b.try_acquire_shared(), Ok(false));
    assert_eq!(lock.try_acquire_shared(), Ok(false));
    a.release_exclusive().unwrap();
}
