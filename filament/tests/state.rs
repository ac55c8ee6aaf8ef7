use filament::{Error, RuntimeBuilder, State};
use std::sync::{Arc, Mutex};

#[test]
fn test_state_machine_transitions() {
    assert!(State::Ready.can_transition_to(State::Running));
    assert!(State::Running.can_transition_to(State::Blocked));
    assert!(State::Running.can_transition_to(State::Ready));
    assert!(State::Running.can_transition_to(State::Stopped));
    assert!(State::Blocked.can_transition_to(State::Ready));

    assert!(!State::Ready.can_transition_to(State::Blocked));
    assert!(!State::Blocked.can_transition_to(State::Running));

    for next in [State::Ready, State::Running, State::Blocked, State::Stopped] {
        assert!(!State::Stopped.can_transition_to(next));
    }
}

#[test]
fn test_fiber_observes_itself_running() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let state = rt.block_on(|fiber| fiber.state());
    assert_eq!(state, State::Running);
}

#[test]
fn test_set_state_rejects_non_suspending_targets() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let (running, stopped) = rt.block_on(|fiber| {
        (fiber.set_state(State::Running), fiber.set_state(State::Stopped))
    });

    assert_eq!(
        running,
        Err(Error::InvalidTransition {
            from: State::Running,
            to: State::Running
        })
    );
    assert_eq!(
        stopped,
        Err(Error::InvalidTransition {
            from: State::Running,
            to: State::Stopped
        })
    );
}

#[test]
fn test_yield_interleaves_fibers_on_one_worker() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();
    let log = Arc::new(Mutex::new(Vec::new()));

    let log_clone = log.clone();
    rt.block_on(move |fiber| {
        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|name| {
                let log = log_clone.clone();
                fiber.spawn(move |fiber| {
                    for i in 0..3 {
                        log.lock().unwrap().push(format!("{name}{i}"));
                        fiber.yield_now().unwrap();
                    }
                })
            })
            .collect();

        for handle in &handles {
            fiber.join(handle).unwrap();
        }
    });

    let log = log.lock().unwrap();
    assert_eq!(*log, ["a0", "b0", "a1", "b1", "a2", "b2"]);
}

#[test]
fn test_stopped_fiber_stays_stopped() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    let handle = rt.spawn(|fiber| fiber.id());
    let id = handle.id();

    assert!(rt.block_on(move |fiber| {
        fiber.join(&handle).unwrap();
        assert_eq!(handle.state(), State::Stopped);
        assert!(handle.is_finished());

        fiber.join(&handle).unwrap();
        assert_eq!(handle.state(), State::Stopped);

        fiber.join_and_rethrow(handle).unwrap() == id
    }));
}

#[test]
fn test_fiber_ids_are_unique() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    let ids: Vec<_> = (0..16).map(|_| rt.spawn(|fiber| fiber.id())).collect();
    let mut ids: Vec<_> = ids
        .into_iter()
        .map(|handle| handle.join_blocking().unwrap())
        .collect();

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
}

#[test]
fn test_stopped_state_implies_finished() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    for _ in 0..200 {
        let handle = rt.spawn(|fiber| fiber.yield_now());

        while handle.state() != State::Stopped {
            std::hint::spin_loop();
        }

        assert!(handle.is_finished());
        assert_eq!(handle.join_blocking(), Ok(Ok(())));
    }
}
