//! Process termination signals.

use std::future::Future;

use log::info;

use crate::Result;

/// Installs handlers for SIGINT and SIGTERM and returns a future that completes when
/// either arrives.
///
/// Handlers are installed before this returns, so a signal delivered between the call
/// and the first poll is not lost. Must be called from within a tokio runtime.
#[cfg(unix)]
pub fn termination_signal() -> Result<impl Future<Output = ()> + Send> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("received SIGINT"),
            _ = terminate.recv() => info!("received SIGTERM"),
        }
    })
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
pub fn termination_signal() -> Result<impl Future<Output = ()> + Send> {
    Ok(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received Ctrl-C"),
            Err(_) => futures::future::pending::<()>().await,
        }
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sigterm_completes_the_future() {
        let signal = termination_signal().unwrap();
        let status = Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());
        assert!(tokio::time::timeout(Duration::from_secs(5), signal)
            .await
            .is_ok());
    }
}
