use filament::RuntimeBuilder;
use filament::sync::{Condvar, Mutex, MutexGuard, RecursiveMutex, RecursiveMutexGuard};
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[test]
fn test_mutex_uncontended() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let mutex = Arc::new(Mutex::new(1));

    let mutex_clone = mutex.clone();
    rt.block_on(move |fiber| {
        let mut guard = mutex_clone.lock(fiber).unwrap();
        *guard += 1;

        assert!(mutex_clone.is_locked());
        assert!(mutex_clone.try_lock().is_none());
    });

    assert!(!mutex.is_locked());
    let mutex = Arc::into_inner(mutex).unwrap();
    assert_eq!(mutex.into_inner(), 2);
}

#[test]
fn test_mutex_excludes_across_workers() {
    let rt = RuntimeBuilder::new().worker_threads(4).build();
    let counter = Arc::new(Mutex::new(0usize));
    let inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let counter = counter.clone();
            let inside = inside.clone();
            rt.spawn(move |fiber| {
                for _ in 0..25 {
                    let mut guard = counter.lock(fiber).unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);

                    let value = *guard;
                    fiber.yield_now().unwrap();
                    *guard = value + 1;

                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join_blocking().unwrap();
    }

    let total = rt.block_on(move |fiber| *counter.lock(fiber).unwrap());
    assert_eq!(total, 200);
}

#[test]
fn test_mutex_hands_off_in_fifo_order() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let order = Arc::new(Mutex::new(Vec::new()));

    let order_clone = order.clone();
    let result = rt.block_on(move |fiber| {
        let guard = order_clone.lock(fiber).unwrap();

        let waiters: Vec<_> = (0..3)
            .map(|i| {
                let order = order_clone.clone();
                fiber.spawn(move |fiber| order.lock(fiber).unwrap().push(i))
            })
            .collect();

        // Let every waiter queue up behind the held lock.
        for _ in 0..3 {
            fiber.yield_now().unwrap();
        }
        drop(guard);

        for waiter in &waiters {
            fiber.join(waiter).unwrap();
        }

        order_clone.lock(fiber).unwrap().clone()
    });

    assert_eq!(result, [0, 1, 2]);
}

#[test]
fn test_condvar_wakes_waiter() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();
    let pair = Arc::new((Mutex::new(false), Condvar::new()));

    let pair_clone = pair.clone();
    let waiter = rt.spawn(move |fiber| {
        let (flag, cvar) = &*pair_clone;
        let guard = cvar
            .wait_while(fiber, flag.lock(fiber).unwrap(), |ready| !*ready)
            .unwrap();
        *guard
    });

    rt.block_on(move |fiber| {
        fiber.sleep(Duration::from_millis(10)).unwrap();

        let (flag, cvar) = &*pair;
        *flag.lock(fiber).unwrap() = true;
        cvar.notify_one();
    });

    assert_eq!(waiter.join_blocking(), Ok(true));
}

#[test]
fn test_condvar_notify_all() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();
    let state = Arc::new((Mutex::new(0usize), Condvar::new()));
    let woken = Arc::new(AtomicUsize::new(0));

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let state = state.clone();
            let woken = woken.clone();
            rt.spawn(move |fiber| {
                let (count, cvar) = &*state;
                let mut guard = count.lock(fiber).unwrap();
                *guard += 1;
                let _guard = cvar.wait_while(fiber, guard, |count| *count < 100).unwrap();
                woken.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    rt.block_on(move |fiber| {
        let (count, cvar) = &*state;
        loop {
            let mut guard = count.lock(fiber).unwrap();
            if *guard == 4 {
                *guard = 100;
                break;
            }
            drop(guard);
            fiber.sleep(Duration::from_millis(1)).unwrap();
        }
        cvar.notify_all();
    });

    for waiter in waiters {
        waiter.join_blocking().unwrap();
    }
    assert_eq!(woken.load(Ordering::SeqCst), 4);
}

#[test]
fn test_notify_without_waiters() {
    let cvar = Condvar::new();

    assert!(!cvar.notify_one());
    assert_eq!(cvar.notify_all(), 0);
}

#[test]
fn test_recursive_mutex_reentry() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let mutex = Arc::new(RecursiveMutex::new(RefCell::new(Vec::new())));

    let mutex_clone = mutex.clone();
    rt.block_on(move |fiber| {
        let outer = mutex_clone.lock(fiber).unwrap();
        outer.borrow_mut().push(1);

        {
            let inner = mutex_clone.lock(fiber).unwrap();
            inner.borrow_mut().push(2);
        }

        assert_eq!(mutex_clone.owner(), Some(fiber.id()));
        outer.borrow_mut().push(3);
    });

    assert_eq!(mutex.owner(), None);
    let mutex = Arc::into_inner(mutex).unwrap();
    assert_eq!(mutex.into_inner().into_inner(), [1, 2, 3]);
}

#[test]
fn test_recursive_mutex_blocks_other_fibers() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();
    let mutex = Arc::new(RecursiveMutex::new(RefCell::new(Vec::new())));

    let mutex_clone = mutex.clone();
    let order = rt.block_on(move |fiber| {
        let outer = mutex_clone.lock(fiber).unwrap();
        let inner = mutex_clone.lock(fiber).unwrap();

        let other_mutex = mutex_clone.clone();
        let other = fiber.spawn(move |fiber| {
            let guard = other_mutex.lock(fiber).unwrap();
            guard.borrow_mut().push("other");
        });

        fiber.sleep(Duration::from_millis(10)).unwrap();
        inner.borrow_mut().push("owner");
        drop(inner);

        fiber.sleep(Duration::from_millis(10)).unwrap();
        outer.borrow_mut().push("owner again");
        drop(outer);

        fiber.join(&other).unwrap();
        let guard = mutex_clone.lock(fiber).unwrap();
        guard.borrow().clone()
    });

    assert_eq!(order, ["owner", "owner again", "other"]);
}

#[test]
fn test_guards_are_shareable_only_for_sync_values() {
    fn assert_sync<T: Sync>() {}

    assert_sync::<MutexGuard<'static, u32>>();
    assert_sync::<RecursiveMutexGuard<'static, Vec<u8>>>();
}
