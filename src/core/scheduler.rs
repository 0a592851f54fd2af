use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use crate::core::config::EngineConfig;
use crate::core::engine::Engine;

/// Engine handle shared between command handlers and the maintenance task.
pub type SharedEngine = Arc<Mutex<Engine>>;

pub fn shared(config: EngineConfig) -> SharedEngine {
    Arc::new(Mutex::new(Engine::new(config)))
}

/// Run `Engine::tick` every `period` until the returned handle is aborted.
/// The lock is held for one tick at a time, bounded by the sync budget.
pub fn spawn_maintenance(engine: SharedEngine, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let tick = engine.lock().tick();
            if tick != Default::default() {
                debug!(
                    applied = tick.applied,
                    failed = tick.failed,
                    expired_cursors = tick.expired_cursors,
                    "maintenance tick"
                );
            }
        }
    })
}
