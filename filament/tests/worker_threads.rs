use filament::{Error, RuntimeBuilder};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
fn test_single_worker_thread() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let result = rt.block_on(|_| 42);
    assert_eq!(result, 42);
}

#[test]
fn test_multiple_worker_threads() {
    let rt = RuntimeBuilder::new().worker_threads(4).build();

    let result = rt.block_on(|_| 100);
    assert_eq!(result, 100);
}

#[test]
fn test_fibers_spread_across_workers() {
    let rt = RuntimeBuilder::new()
        .worker_threads(4)
        .thread_name("spread")
        .build();

    let names = Arc::new(Mutex::new(HashSet::new()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let names = names.clone();
            rt.spawn(move |_| {
                let name = thread::current().name().map(str::to_owned);
                names.lock().unwrap().insert(name);
            })
        })
        .collect();

    for handle in handles {
        handle.join_blocking().unwrap();
    }

    let names = names.lock().unwrap();
    assert_eq!(names.len(), 4);
    for i in 0..4 {
        assert!(names.contains(&Some(format!("spread-{i}"))));
    }
}

#[test]
fn test_fiber_stays_on_its_worker() {
    let rt = RuntimeBuilder::new().worker_threads(4).build();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            rt.spawn(|fiber| {
                let first = thread::current().id();
                for _ in 0..10 {
                    fiber.yield_now().unwrap();
                    assert_eq!(thread::current().id(), first);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join_blocking().unwrap();
    }
}

#[test]
fn test_spawn_from_other_thread_via_handle() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();
    let handle = rt.handle().clone();

    let value = thread::spawn(move || handle.spawn(|_| "remote").join_blocking())
        .join()
        .unwrap();

    assert_eq!(value, Ok("remote"));
}

#[test]
fn test_small_stack_size_is_rounded_up() {
    let rt = RuntimeBuilder::new()
        .worker_threads(1)
        .stack_size(1)
        .build();

    let result = filament::Builder::new()
        .stack_size(1)
        .spawn_on(rt.handle(), |fiber| {
            fiber.yield_now().unwrap();
            let buffer = [7u8; 1024];
            buffer.iter().map(|b| *b as usize).sum::<usize>()
        })
        .join_blocking();

    assert_eq!(result, Ok(7 * 1024));
}

#[test]
fn test_spawn_after_shutdown_is_aborted() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let handle = rt.handle().clone();
    drop(rt);

    let late = handle.spawn(|_| ());
    assert_eq!(late.join_blocking(), Err(Error::Shutdown));
}

#[test]
fn test_try_build() {
    let rt = RuntimeBuilder::default().worker_threads(2).try_build().unwrap();
    assert_eq!(rt.block_on(|fiber| fiber.name()), None);
}

#[test]
fn test_fiber_names() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let handle = filament::Builder::new().name("first").spawn_on(rt.handle(), |fiber| {
        let before = fiber.name();
        fiber.set_name("second");
        before
    });

    while !handle.is_finished() {
        thread::yield_now();
    }
    assert_eq!(handle.name().as_deref(), Some("second"));
    assert_eq!(handle.join_blocking(), Ok(Some("first".to_owned())));
}
