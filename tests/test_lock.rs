//! Lock discipline and barrier rounds under contention

use statefleet::{CoordinatorConfig, ProcessId, SharedSegment, SimEngine, StateManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn member(pid: u32, fleet: usize, segment: &Arc<SharedSegment>) -> StateManager<SimEngine> {
    let config = CoordinatorConfig::builder()
        .fleet_size(fleet)
        .max_lock_wait(Some(Duration::from_secs(30)))
        .build()
        .unwrap();
    let engine = SimEngine::new(ProcessId(pid), fleet).with_states(1);
    StateManager::new(engine, segment.clone(), config).unwrap()
}

#[test]
fn test_mutual_exclusion() {
    let fleet = 6;
    let rounds = 300;
    let segment = Arc::new(SharedSegment::new(fleet, 0));
    let inside = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..fleet as u32)
        .map(|pid| {
            let mut mgr = member(pid, fleet, &segment);
            let inside = Arc::clone(&inside);
            let entries = Arc::clone(&entries);
            thread::spawn(move || {
                for _ in 0..rounds {
                    mgr.acquire().unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    assert_eq!(mgr.segment().lock_owner(), Some(ProcessId(pid)));
                    entries.fetch_add(1, Ordering::SeqCst);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                    mgr.release();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(entries.load(Ordering::SeqCst), fleet * rounds);
    assert_eq!(segment.lock_owner(), None);
}

#[test]
fn test_every_peer_drains_each_round_once() {
    let fleet = 4;
    let rounds = 5;
    let segment = Arc::new(SharedSegment::new(fleet, 0));

    let peers: Vec<_> = (1..fleet as u32)
        .map(|pid| {
            let mut mgr = member(pid, fleet, &segment);
            thread::spawn(move || {
                while mgr.stats().directives_consumed < rounds {
                    mgr.acquire().unwrap();
                    mgr.release();
                    thread::yield_now();
                }
                mgr
            })
        })
        .collect();

    let mut leader = member(0, fleet, &segment);
    for _ in 0..rounds {
        leader.acquire().unwrap();
        leader.resume_fleet().unwrap();
        leader.release();
    }

    for handle in peers {
        let mgr = handle.join().unwrap();
        assert_eq!(mgr.stats().directives_consumed, rounds);
        assert_eq!(mgr.stats().barrier_rounds, 0);
        // RESUME never prunes
        assert_eq!(mgr.engine().live_count(), 1);
    }
    assert_eq!(leader.stats().barrier_rounds, rounds);
    assert_eq!(segment.waiting_count(), 0);
    assert!(!segment.is_suspending());
}

#[test]
fn test_competing_leaders_serialize_rounds() {
    let fleet = 3;
    let rounds_each = 3;
    let segment = Arc::new(SharedSegment::new(fleet, 0));
    let finished = Arc::new(AtomicUsize::new(0));

    // every process leads its own rounds and parks for everyone else's
    let handles: Vec<_> = (0..fleet as u32)
        .map(|pid| {
            let mut mgr = member(pid, fleet, &segment);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                for _ in 0..rounds_each {
                    mgr.acquire().unwrap();
                    mgr.resume_fleet().unwrap();
                    mgr.release();
                }
                finished.fetch_add(1, Ordering::SeqCst);
                // stay responsive until the others are done leading
                while finished.load(Ordering::SeqCst) < fleet {
                    mgr.acquire().unwrap();
                    mgr.release();
                    thread::yield_now();
                }
                mgr
            })
        })
        .collect();

    let managers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for mgr in &managers {
        assert_eq!(mgr.stats().barrier_rounds, rounds_each);
        assert_eq!(
            mgr.stats().directives_consumed,
            rounds_each * (fleet as u64 - 1)
        );
    }
}
