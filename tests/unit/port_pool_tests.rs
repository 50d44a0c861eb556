//! Port pool allocation under contention.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use session_broker::orchestrator::port_pool::PortPool;
use session_broker::AppError;

#[test]
fn concurrent_acquires_never_share_a_port() {
    let pool = Arc::new(PortPool::new(6000, 6064).expect("pool"));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                (0..8)
                    .map(|_| pool.acquire().expect("port available"))
                    .collect::<Vec<u16>>()
            })
        })
        .collect();

    let mut seen = BTreeSet::new();
    for handle in handles {
        for port in handle.join().expect("thread") {
            assert!(seen.insert(port), "port {port} handed out twice");
        }
    }

    assert_eq!(seen.len(), 64);
    assert!(matches!(pool.acquire(), Err(AppError::ResourceExhausted(_))));
}

#[test]
fn concurrent_acquire_and_release_keeps_counts_consistent() {
    let pool = Arc::new(PortPool::new(6100, 6104).expect("pool"));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..200 {
                    if let Ok(port) = pool.acquire() {
                        assert!(pool.is_reserved(port));
                        pool.release(port);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread");
    }

    let status = pool.status();
    assert_eq!(status.total, 4);
    assert_eq!(status.reserved, 0);
    assert_eq!(status.available, 4);
    assert!(status.reserved_list.is_empty());
}

#[test]
fn status_counts_always_add_up() {
    let pool = PortPool::new(6200, 6205).expect("pool");
    let a = pool.acquire().expect("a");
    let _b = pool.acquire().expect("b");
    pool.release(a);

    let status = pool.status();
    assert_eq!(status.reserved + status.available, status.total);
    assert_eq!(status.reserved_list, vec![6201]);
}

#[test]
fn released_port_is_reused_first() {
    let pool = PortPool::new(6300, 6303).expect("pool");
    let first = pool.acquire().expect("first");
    let _second = pool.acquire().expect("second");
    pool.release(first);
    assert_eq!(pool.acquire().expect("reused"), first);
}
