//! Process lifecycle: one cancellation token, signal handling, and a
//! bounded shutdown of the HTTP server and consumer tasks.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::LifecycleError;
use crate::pipeline::ConsumerSummary;

/// How long the HTTP server gets to drain after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// What shutdown observed.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownReport {
    pub consumer: ConsumerSummary,
    /// Time from cancellation until both tasks finished.
    pub elapsed: Duration,
}

/// Owns the process-wide cancellation token.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    token: CancellationToken,
    grace: Duration,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::with_grace(SHUTDOWN_GRACE)
    }

    pub fn with_grace(grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace,
        }
    }

    /// Token to hand to the consumer and server.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for `signal`, cancel once, then join both tasks.
    ///
    /// The server must finish within the grace period or the result is
    /// [`LifecycleError::ForcedShutdown`]. The consumer is never abandoned:
    /// if it is still finishing a record when the grace period is up, it is
    /// awaited to completion. A server that exits before `signal` triggers
    /// the same shutdown and its failure is returned.
    pub async fn shutdown<S>(
        &self,
        signal: S,
        mut server: JoinHandle<io::Result<()>>,
        mut consumer: JoinHandle<ConsumerSummary>,
    ) -> Result<ShutdownReport, LifecycleError>
    where
        S: Future<Output = ()>,
    {
        let exited = tokio::select! {
            () = signal => None,
            joined = &mut server => Some(joined),
        };
        info!("Shutting down server...");
        self.cancel();
        let started = Instant::now();

        let server_result = match exited {
            Some(joined) => {
                error!("Server stopped before shutdown was requested");
                match server_outcome(joined) {
                    Ok(()) => Err(LifecycleError::ServerStopped),
                    Err(e) => Err(e),
                }
            }
            None => match tokio::time::timeout(self.grace, server).await {
                Err(_) => {
                    error!(grace = ?self.grace, "Server forced to shutdown");
                    return Err(LifecycleError::ForcedShutdown { grace: self.grace });
                }
                Ok(joined) => server_outcome(joined),
            },
        };

        let remaining = self.grace.saturating_sub(started.elapsed());
        let consumer_result = match tokio::time::timeout(remaining, &mut consumer).await {
            Ok(result) => result,
            Err(_) => {
                warn!(grace = ?self.grace, "Consumer still draining after grace period, waiting for it");
                consumer.await
            }
        };
        let summary = consumer_result.map_err(|join| LifecycleError::TaskPanicked {
            name: "consumer",
            reason: join.to_string(),
        })?;

        server_result?;

        let elapsed = started.elapsed();
        info!(elapsed = ?elapsed, "Server exiting");
        Ok(ShutdownReport {
            consumer: summary,
            elapsed,
        })
    }
}

fn server_outcome(joined: Result<io::Result<()>, JoinError>) -> Result<(), LifecycleError> {
    match joined {
        Ok(result) => result.map_err(LifecycleError::Server),
        Err(join) => Err(LifecycleError::TaskPanicked {
            name: "http-server",
            reason: join.to_string(),
        }),
    }
}

/// Resolve on SIGINT or SIGTERM.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::select! {
                    _ = interrupt.recv() => info!("Received SIGINT"),
                    _ = terminate.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to install signal handlers, falling back to ctrl-c");
            }
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received ctrl-c"),
        Err(e) => {
            error!(error = %e, "Failed to listen for ctrl-c, shutdown only by other means");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    fn cooperative_server(token: CancellationToken) -> JoinHandle<io::Result<()>> {
        tokio::spawn(async move {
            token.cancelled().await;
            Ok(())
        })
    }

    fn cooperative_consumer(token: CancellationToken, drain: Duration) -> JoinHandle<ConsumerSummary> {
        tokio::spawn(async move {
            token.cancelled().await;
            tokio::time::sleep(drain).await;
            ConsumerSummary {
                received: 2,
                handled: 2,
                ..Default::default()
            }
        })
    }

    #[tokio::test]
    async fn cancels_only_after_signal() {
        let lifecycle = Lifecycle::with_grace(Duration::from_secs(1));
        let token = lifecycle.token();
        let server = cooperative_server(lifecycle.token());
        let consumer = cooperative_consumer(lifecycle.token(), Duration::ZERO);
        let (tx, rx) = oneshot::channel::<()>();

        let handle = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move {
                lifecycle
                    .shutdown(async { rx.await.unwrap_or(()) }, server, consumer)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!token.is_cancelled());

        tx.send(()).unwrap();
        let report = handle.await.unwrap().unwrap();
        assert!(token.is_cancelled());
        assert_eq!(report.consumer.handled, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_server_is_forced() {
        let lifecycle = Lifecycle::with_grace(Duration::from_secs(30));
        let server: JoinHandle<io::Result<()>> = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        let consumer = cooperative_consumer(lifecycle.token(), Duration::ZERO);

        let err = lifecycle
            .shutdown(async {}, server, consumer)
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::ForcedShutdown { grace } if grace == SHUTDOWN_GRACE));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_consumer_is_awaited_past_grace() {
        let lifecycle = Lifecycle::with_grace(Duration::from_secs(1));
        let server = cooperative_server(lifecycle.token());
        let consumer = cooperative_consumer(lifecycle.token(), Duration::from_secs(5));

        let report = lifecycle.shutdown(async {}, server, consumer).await.unwrap();

        assert_eq!(report.consumer.received, 2);
        assert!(report.elapsed >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn server_error_is_reported_after_consumer_finishes() {
        let lifecycle = Lifecycle::with_grace(Duration::from_secs(1));
        let server: JoinHandle<io::Result<()>> = tokio::spawn(async {
            Err(io::Error::new(io::ErrorKind::AddrInUse, "address in use"))
        });
        let consumer = cooperative_consumer(lifecycle.token(), Duration::ZERO);

        let err = lifecycle.shutdown(async {}, server, consumer).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Server(_)));
    }

    #[tokio::test]
    async fn early_server_failure_shuts_down_without_signal() {
        let lifecycle = Lifecycle::with_grace(Duration::from_secs(1));
        let token = lifecycle.token();
        let server: JoinHandle<io::Result<()>> = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err(io::Error::new(io::ErrorKind::ConnectionAborted, "listener failed"))
        });
        let consumer = cooperative_consumer(lifecycle.token(), Duration::ZERO);

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            lifecycle.shutdown(std::future::pending(), server, consumer),
        )
        .await
        .expect("shutdown must not wait for a signal")
        .unwrap_err();

        assert!(matches!(err, LifecycleError::Server(_)));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn server_returning_early_is_an_error() {
        let lifecycle = Lifecycle::with_grace(Duration::from_secs(1));
        let server: JoinHandle<io::Result<()>> = tokio::spawn(async { Ok(()) });
        let consumer = cooperative_consumer(lifecycle.token(), Duration::ZERO);

        let err = lifecycle
            .shutdown(std::future::pending(), server, consumer)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::ServerStopped));
    }

    #[tokio::test]
    async fn consumer_panic_is_reported() {
        let lifecycle = Lifecycle::with_grace(Duration::from_secs(1));
        let server = cooperative_server(lifecycle.token());
        let consumer: JoinHandle<ConsumerSummary> = tokio::spawn(async { panic!("boom") });

        let err = lifecycle.shutdown(async {}, server, consumer).await.unwrap_err();
        assert!(matches!(err, LifecycleError::TaskPanicked { name: "consumer", .. }));
    }
}
