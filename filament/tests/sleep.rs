use filament::RuntimeBuilder;
use filament::State;
use filament::time::{Clock, ManualClock};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn wait_for_state<T>(handle: &filament::JoinHandle<T>, state: State) {
    let deadline = Instant::now() + Duration::from_secs(5);

    while handle.state() != state {
        assert!(Instant::now() < deadline, "fiber never reached {state:?}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_sleep_waits_for_manual_clock() {
    let clock = ManualClock::new();
    let rt = RuntimeBuilder::new()
        .worker_threads(1)
        .clock(clock.clone())
        .build();

    let woke = Arc::new(AtomicBool::new(false));
    let woke_clone = woke.clone();

    let sleeper = rt.spawn(move |fiber| {
        let status = fiber.sleep(Duration::from_secs(60));
        woke_clone.store(true, Ordering::SeqCst);
        status
    });

    wait_for_state(&sleeper, State::Blocked);

    clock.advance(Duration::from_secs(30));
    thread::sleep(Duration::from_millis(20));
    assert!(!woke.load(Ordering::SeqCst));
    assert_eq!(sleeper.state(), State::Blocked);

    clock.advance(Duration::from_secs(30));
    assert_eq!(sleeper.join_blocking(), Ok(Ok(())));
    assert!(woke.load(Ordering::SeqCst));
}

#[test]
fn test_sleep_with_system_clock() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let elapsed = rt.block_on(|fiber| {
        let start = Instant::now();
        fiber.sleep(Duration::from_millis(20)).unwrap();
        start.elapsed()
    });

    assert!(elapsed >= Duration::from_millis(20));
}

#[test]
fn test_zero_sleep_still_suspends() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let ran = Arc::new(AtomicBool::new(false));

    let ran_clone = ran.clone();
    let seen = rt.block_on(move |fiber| {
        let sibling = fiber.spawn(move |_| ran_clone.store(true, Ordering::SeqCst));

        fiber.sleep(Duration::ZERO).unwrap();
        let seen = ran.load(Ordering::SeqCst);

        fiber.join(&sibling).unwrap();
        seen
    });

    assert!(seen);
}

#[test]
fn test_sleeping_fibers_do_not_block_worker() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let start = Instant::now();
    rt.block_on(|fiber| {
        let sleepers: Vec<_> = (0..10)
            .map(|_| fiber.spawn(|fiber| fiber.sleep(Duration::from_millis(50)).unwrap()))
            .collect();

        for sleeper in &sleepers {
            fiber.join(sleeper).unwrap();
        }
    });

    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn test_sleep_until_orders_wakeups() {
    let clock = ManualClock::new();
    let rt = RuntimeBuilder::new()
        .worker_threads(1)
        .clock(clock.clone())
        .build();

    let order = Arc::new(Mutex::new(Vec::new()));
    let base = clock.now();

    let handles: Vec<_> = [3u64, 1, 2]
        .into_iter()
        .map(|secs| {
            let order = order.clone();
            rt.spawn(move |fiber| {
                fiber.sleep_until(base + Duration::from_secs(secs)).unwrap();
                order.lock().unwrap().push(secs);
            })
        })
        .collect();

    for handle in &handles {
        wait_for_state(handle, State::Blocked);
    }

    for _ in 0..3 {
        clock.advance(Duration::from_secs(1));
        thread::sleep(Duration::from_millis(20));
    }

    for handle in handles {
        handle.join_blocking().unwrap();
    }

    assert_eq!(*order.lock().unwrap(), [1, 2, 3]);
}

#[test]
fn test_unbounded_sleep_parks_until_shutdown() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let sleeper = rt.spawn(|fiber| fiber.sleep(Duration::MAX));
    wait_for_state(&sleeper, State::Blocked);

    drop(rt);
    assert_eq!(sleeper.join_blocking(), Err(filament::Error::Shutdown));
}
