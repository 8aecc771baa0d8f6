//! Ctrl-C handling.
//!
//! The first interrupt cancels the run's [`CancellationToken`]. The
//! dispatcher then stops pulling new work and flushes whatever has been
//! recorded before `main` exits normally.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Spawn a task that cancels `token` on Ctrl-C.
///
/// The task also exits quietly when `token` is cancelled by someone else.
pub fn spawn_ctrl_c_watcher(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            result = signal::ctrl_c() => match result {
                Ok(()) => {
                    warn!("Interrupt received; saving collected metadata before exit");
                    token.cancel();
                }
                Err(e) => error!(error = %e, "Could not listen for Ctrl-C; interrupts will not flush"),
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_watcher_exits_when_token_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let handle = spawn_ctrl_c_watcher(token.clone());

        token.cancel();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("watcher should stop")
            .unwrap();
    }
}
