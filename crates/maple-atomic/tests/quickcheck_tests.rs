//! Quickcheck properties for counters and the spin lock.

use maple_atomic::{BusCounters, LockCapability, ScopedLock, SpinLock};
use quickcheck_macros::quickcheck;

#[quickcheck]
fn counters_track_increment_count(n: u8) -> bool {
    let counters = BusCounters::new();
    for _ in 0..n {
        counters.inc_dispatched();
        counters.inc_succeeded();
    }
    let snap = counters.snapshot();
    snap.dispatched == u32::from(n) && snap.completed() == u32::from(n)
}

fn guarded_step(lock: &SpinLock, bail: bool) -> Result<(), ()> {
    let _guard = ScopedLock::new(lock);
    if bail {
        return Err(());
    }
    Ok(())
}

#[quickcheck]
fn guard_always_releases(bails: Vec<bool>) -> bool {
    let lock = SpinLock::new();
    bails
        .into_iter()
        .all(|bail| guarded_step(&lock, bail).is_err() == bail && !lock.is_locked())
}

#[test]
fn spin_lock_serialises_threads() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    let lock = Arc::new(SpinLock::new());
    let inside = Arc::new(AtomicU32::new(0));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            std::thread::spawn(move || {
                for _ in 0..1_000 {
                    lock.acquire();
                    let before = inside.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(before, 0, "two holders at once");
                    inside.fetch_sub(1, Ordering::SeqCst);
                    lock.release();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(!lock.is_locked());
}
