use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::Store;

/// Dispara o sweeper em background.
pub fn spawn_sweeper(store: Store, period: Duration) -> JoinHandle<()> {
    tokio::spawn(run_sweeper(store, period))
}

/// Background task que remove chaves expiradas a cada `period`.
pub async fn run_sweeper(store: Store, period: Duration) {
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // O primeiro tick é imediato.
    tick.tick().await;

    debug!("sweeper iniciado (período {period:?})");

    loop {
        tick.tick().await;
        let removed = store.cleanup_expired();
        if removed > 0 {
            info!("sweeper: {removed} chaves expiradas removidas");
        }
    }
}
