use std::time::Duration;
use tokio::{fs, time};
use tracing::{info, warn};
use crate::state::MediaLog;

pub const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Sweeper: every `every` (at least [`MIN_PERIOD`]), trim stored uploads
/// back under `cap` bytes.
pub async fn task(log: MediaLog, cap: u64, every: Duration) {
    let mut tick = time::interval(every.max(MIN_PERIOD));
    loop {
        tick.tick().await;
        let freed = sweep(&log, cap).await;
        if freed > 0 {
            info!(freed, cap, "upload sweep");
        }
    }
}

/// Deletes oldest uploads first until the total fits in `cap`.
/// Returns the bytes dropped from the log.
pub async fn sweep(log: &MediaLog, cap: u64) -> u64 {
    let used: u64 = log.read().await.iter().map(|m| m.size).sum();
    if used <= cap { return 0; }

    let mut lg = log.write().await;
    let mut space = used;
    while space > cap {
        let Some(old) = lg.pop_front() else { break };
        if let Err(e) = fs::remove_file(&old.path).await {
            // already gone counts as freed
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %old.path.display(), error = %e, "could not delete upload");
            }
        }
        space = space.saturating_sub(old.size);
    }
    used - space
}
