//! Interrupt-class signal handling for the signal-aware entry point.

use tokio::signal;

/// Completes when an interrupt-class signal arrives: SIGINT (Ctrl+C)
/// everywhere, SIGTERM additionally on unix. The signal-aware [`run`]
/// entry cancels the root scope when this resolves.
///
/// [`run`]: crate::app::App::run
pub async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("interrupt signal handler could not be installed");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler could not be installed")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => tracing::info!("interrupt received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
