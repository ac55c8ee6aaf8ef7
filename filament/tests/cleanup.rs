use filament::{Error, LocalKey, RuntimeBuilder};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

static RESOURCE: LocalKey<&'static str> = LocalKey::new("resource");

#[test]
fn test_cleanup_runs_in_registration_order() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let log = Arc::new(Mutex::new(Vec::new()));

    let log_clone = log.clone();
    let handle = rt.spawn(move |fiber| {
        for i in 0..3 {
            let log = log_clone.clone();
            fiber.add_cleanup_function(move || log.lock().unwrap().push(i));
        }

        fiber.yield_now().unwrap();
        assert!(log_clone.lock().unwrap().is_empty());
    });

    handle.join_blocking().unwrap();
    assert_eq!(*log.lock().unwrap(), [0, 1, 2]);
}

#[test]
fn test_cleanup_runs_after_panic() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let log = Arc::new(Mutex::new(Vec::new()));

    let log_clone = log.clone();
    let handle = rt.spawn(move |fiber| -> () {
        let log = log_clone.clone();
        fiber.add_cleanup_function(move || log.lock().unwrap().push("cleanup"));

        panic!("fiber failed");
    });

    assert!(handle.join_blocking().is_err());
    assert_eq!(*log.lock().unwrap(), ["cleanup"]);
}

#[test]
fn test_panicking_cleanup_does_not_stop_the_rest() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let log = Arc::new(Mutex::new(Vec::new()));

    let log_clone = log.clone();
    let handle = rt.spawn(move |fiber| {
        fiber.add_cleanup_function(|| panic!("cleanup failed"));

        let log = log_clone.clone();
        fiber.add_cleanup_function(move || log.lock().unwrap().push("second"));
    });

    assert_eq!(handle.join_blocking(), Ok(()));
    assert_eq!(*log.lock().unwrap(), ["second"]);
}

#[test]
fn test_cleanup_completes_before_joiner_resumes() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();
    let log = Arc::new(Mutex::new(Vec::new()));

    let log_clone = log.clone();
    rt.block_on(move |fiber| {
        let log = log_clone.clone();
        let child = fiber.spawn(move |fiber| {
            let log = log.clone();
            fiber.add_cleanup_function(move || log.lock().unwrap().push("child cleanup"));
        });

        fiber.join(&child).unwrap();
        log_clone.lock().unwrap().push("joined");
    });

    assert_eq!(*log.lock().unwrap(), ["child cleanup", "joined"]);
}

#[test]
fn test_cleanup_runs_when_runtime_drops_a_sleeping_fiber() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (parked, asleep) = mpsc::channel();

    let log_clone = log.clone();
    let handle = rt.spawn(move |fiber| {
        let log = log_clone.clone();
        fiber.add_cleanup_function(move || log.lock().unwrap().push("cleanup"));

        let log = log_clone.clone();
        fiber.set_local_with(&RESOURCE, "socket", move |_| {
            log.lock().unwrap().push("destructor");
        });

        parked.send(()).unwrap();
        let _ = fiber.sleep(Duration::from_secs(3600));
        log_clone.lock().unwrap().push("woke");
    });

    asleep.recv().unwrap();
    // Let the fiber actually park on its timer.
    std::thread::sleep(Duration::from_millis(50));
    drop(rt);

    assert_eq!(handle.join_blocking(), Err(Error::Shutdown));
    assert_eq!(*log.lock().unwrap(), ["cleanup", "destructor"]);
}
