use anyhow::{Context, Result};
use serde_json::json;
use statefleet::{
    CoordinatorConfig, CoordinatorStats, ExecutionEngine, ProcessId, SharedSegment, SimEngine,
    StateManager,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

// Steps after which a worker stops forking and drains its states
const STEP_BUDGET: usize = 200;

// false means the current state was pruned and control is back with the scheduler
fn survived(result: statefleet::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_control_transfer() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

// One worker process: explore random states until none are left, then stay
// at the lock until the whole fleet is done so barriers can still complete.
fn run_worker(
    mut manager: StateManager<SimEngine>,
    finished: Arc<AtomicUsize>,
) -> Result<CoordinatorStats> {
    let fleet_size = manager.config().fleet_size;
    let succeed = (manager.config().guest_opcode as u64) << 8;
    let mut steps = 0;
    let mut done = false;

    loop {
        if !done && manager.engine().live_count() == 0 {
            done = true;
            finished.fetch_add(1, Ordering::SeqCst);
            info!("Process {} out of states after {} steps", manager.process_id(), steps);
        }
        if done && finished.load(Ordering::SeqCst) == fleet_size {
            break;
        }

        let picked = manager.engine_mut().pick_next();
        if !survived(manager.on_schedule(picked, false))? {
            continue;
        }
        let Some(state) = manager.engine().current_state() else {
            std::thread::yield_now();
            continue;
        };

        steps += 1;
        let roll = if steps > STEP_BUDGET {
            1.0
        } else {
            manager.engine_mut().rng().f64()
        };

        if roll < 0.30 {
            manager.engine_mut().fork(state);
        } else if roll < 0.35 {
            manager.on_new_coverage(0x40_0000 + steps as u64 * 0x10);
        } else if roll < 0.40 {
            survived(manager.on_custom_instruction(state, succeed))?;
        } else if survived(manager.on_schedule(Some(state), true))? {
            manager.engine_mut().finish_current();
        }
    }

    Ok(manager.stats().clone())
}

fn load_config() -> Result<CoordinatorConfig> {
    match std::env::args().nth(1) {
        Some(path) => CoordinatorConfig::from_file(&path)
            .with_context(|| format!("Failed to load fleet config from '{}'", path)),
        None => Ok(CoordinatorConfig::development()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = load_config()?;
    let segment = Arc::new(SharedSegment::new(config.fleet_size, 0));
    let finished = Arc::new(AtomicUsize::new(0));

    let mut workers = Vec::with_capacity(config.fleet_size);
    for pid in 0..config.fleet_size as u32 {
        let engine = SimEngine::new(ProcessId(pid), config.fleet_size)
            .with_states(2)
            .with_seed(0x5eed + pid as u64);
        let manager = StateManager::new(engine, segment.clone(), config.clone())?;
        let finished = finished.clone();
        workers.push(tokio::task::spawn_blocking(move || run_worker(manager, finished)));
    }

    let mut report = Vec::new();
    for (pid, worker) in workers.into_iter().enumerate() {
        let stats = worker.await??;
        report.push(json!({ "process": pid, "stats": stats }));
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
