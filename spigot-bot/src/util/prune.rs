//! Periodic claim ledger pruning.

use std::sync::Arc;
use std::time::Duration;

use spigot::UnixTimestamp;
use spigot::ledger::ClaimLedger;
use tokio_util::sync::CancellationToken;

/// Drops expired claims every `interval` until `token` is cancelled.
///
/// Intervals below one second are raised to one second.
pub async fn prune_loop(ledger: Arc<ClaimLedger>, interval: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            () = token.cancelled() => break,
            _ = ticker.tick() => {
                let tracked = ledger.prune(UnixTimestamp::now());
                tracing::debug!(tracked, "Pruned claim ledger");
            }
        }
    }
}
