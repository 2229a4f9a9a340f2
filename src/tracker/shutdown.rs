use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `cancelation` on Ctrl-C. Also returns as soon as the token is cancelled elsewhere.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {},
    };
}
