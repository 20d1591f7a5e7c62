use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Detects signals sent to the process. This works with limmited success. Returns as well once
/// `cancelation` is cancelled by someone else.
///
/// On Windows detached processes can't detect signals sent to them, so `fourhours stop`
/// terminates them instead.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = cancelation.cancelled() => (),
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for shutdown signal {e:?}"),
            }
            cancelation.cancel();
        },
    };
}
