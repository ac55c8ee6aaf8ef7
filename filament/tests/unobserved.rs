use filament::{Failure, RuntimeBuilder};
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn test_hook_fires_for_detached_failure() {
    let (tx, rx) = mpsc::channel::<Failure>();
    let tx = std::sync::Mutex::new(tx);

    let rt = RuntimeBuilder::new()
        .worker_threads(1)
        .on_unobserved_failure(move |failure| {
            let _ = tx.lock().unwrap().send(failure.clone());
        })
        .build();

    let handle = filament::Builder::new()
        .name("doomed")
        .spawn_on(rt.handle(), |_| -> () { panic!("nobody is listening") });
    drop(handle);

    let failure = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(failure.name(), Some("doomed"));
    assert_eq!(failure.message(), "nobody is listening");
}

#[test]
fn test_hook_fires_when_handle_dropped_after_failure() {
    let (tx, rx) = mpsc::channel::<Failure>();
    let tx = std::sync::Mutex::new(tx);

    let rt = RuntimeBuilder::new()
        .worker_threads(1)
        .on_unobserved_failure(move |failure| {
            let _ = tx.lock().unwrap().send(failure.clone());
        })
        .build();

    let handle = rt.spawn(|_| -> () { panic!("late drop") });
    while !handle.is_finished() {
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(rx.try_recv().is_err());
    drop(handle);

    let failure = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(failure.message(), "late drop");
}

#[test]
fn test_hook_silent_for_observed_failure() {
    let (tx, rx) = mpsc::channel::<Failure>();
    let tx = std::sync::Mutex::new(tx);

    let rt = RuntimeBuilder::new()
        .worker_threads(1)
        .on_unobserved_failure(move |failure| {
            let _ = tx.lock().unwrap().send(failure.clone());
        })
        .build();

    let handle = rt.spawn(|_| -> () { panic!("seen") });
    assert!(handle.join_blocking().is_err());

    // Successful detached fibers are never reported either.
    rt.spawn(|_| ()).detach();

    drop(rt);
    assert!(rx.try_recv().is_err());
}
