//! The daemon loop — periodic scheduler ticks over an engine instance.
//!
//! Each tick runs the scheduler contract in full: poll the pending ring
//! for eligible wills, move them into RELEASE_REQUESTED, then sweep and
//! finalize every will whose timelock has expired. The event log tail is
//! dumped to the data directory after each tick so operators (and other
//! consumers) can follow along.

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use heirloom_core::{Auth, EventLog, Principal, Role, SystemClock};
use heirloom_engine::{ReleaseDispatcher, WillEngine};
use heirloom_guardians::{GuardianLimits, GuardianRegistry};
use heirloom_vault::{AssetVault, LedgerTransfer};
use std::sync::Arc;
use std::time::Duration;

/// The engine stack the daemon drives.
pub struct Stack {
    pub engine: WillEngine,
    pub events: Arc<EventLog>,
}

/// Assemble an in-process engine stack with the in-memory ledger
/// adapter. A ledger host embedding the engine replaces this wiring with
/// its own vault adapter and persistence.
pub fn build_stack() -> Stack {
    let clock = Arc::new(SystemClock);
    let events = Arc::new(EventLog::new());

    let guardians = Arc::new(GuardianRegistry::new(
        GuardianLimits::default(),
        events.clone(),
        clock.clone(),
    ));
    let vault = Arc::new(AssetVault::new(
        Arc::new(LedgerTransfer::new()),
        events.clone(),
        clock.clone(),
    ));
    let dispatcher =
        ReleaseDispatcher::new(vault.clone()).with_guardian_registry(guardians.clone());
    let engine = WillEngine::new(events.clone(), clock)
        .with_guardian_registry(guardians)
        .with_dispatcher(dispatcher);

    Stack { engine, events }
}

/// The scheduler's per-tick identity.
pub fn scheduler_auth() -> Auth {
    let mut bytes = [0u8; 32];
    bytes[..19].copy_from_slice(b"heirloom/scheduler\0");
    Auth::caller(Principal::new(bytes)).with_role(Role::Scheduler)
}

/// Outcome of one tick, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub polled: usize,
    pub requested: usize,
    pub finalized: usize,
    pub finalize_errors: usize,
}

/// One scheduler tick: poll → perform → finalize sweep.
pub fn run_tick(engine: &WillEngine, auth: &Auth, batch_size: usize) -> TickReport {
    let mut report = TickReport::default();

    let (needs_work, work) = engine.scheduler_poll(batch_size);
    report.polled = work.len();

    if needs_work {
        match engine.scheduler_perform(auth, &work) {
            Ok(n) => report.requested = n,
            Err(e) => log::error!("scheduler_perform failed: {e}"),
        }
    }

    for will_id in engine.finalizable_wills() {
        match engine.finalize_release(auth, will_id) {
            Ok(()) => {
                log::info!("finalized will {will_id}");
                report.finalized += 1;
            }
            Err(e) => {
                // Another worker may have won the race, or the clock
                // moved; both resolve on a later tick
                log::warn!("finalize of will {will_id} failed: {e}");
                report.finalize_errors += 1;
            }
        }
    }

    report
}

/// Run the daemon loop. Blocks until the task is cancelled.
pub async fn run(config: ServerConfig) -> Result<()> {
    log::info!("Heirloom scheduler starting…");
    log::info!("  Tick interval: {} seconds", config.scheduler.tick_interval_secs);
    log::info!("  Batch size:    {}", config.scheduler.batch_size);
    log::info!("  Data dir:      {}", config.server.data_dir.display());

    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data dir: {}",
            config.server.data_dir.display()
        )
    })?;

    let stack = build_stack();
    let auth = scheduler_auth();
    let interval = Duration::from_secs(config.scheduler.tick_interval_secs);
    let mut event_cursor = 0u64;

    loop {
        let report = run_tick(&stack.engine, &auth, config.scheduler.batch_size);
        log::info!(
            "tick: {} polled, {} requested, {} finalized",
            report.polled,
            report.requested,
            report.finalized
        );

        if let Err(e) = dump_events(&stack.events, &config, &mut event_cursor) {
            log::error!("event dump failed: {e:#}");
        }

        tokio::time::sleep(interval).await;
    }
}

/// Append new events to `data_dir/events.jsonl`, one JSON object per line.
fn dump_events(events: &EventLog, config: &ServerConfig, cursor: &mut u64) -> Result<()> {
    use std::io::Write;

    let fresh = events.tail(*cursor);
    if fresh.is_empty() {
        return Ok(());
    }

    let path = config.server.data_dir.join("events.jsonl");
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    for recorded in &fresh {
        let line = serde_json::to_string(recorded).context("Failed to serialize event")?;
        writeln!(file, "{line}").context("Failed to append event")?;
    }

    *cursor += fresh.len() as u64;
    Ok(())
}
