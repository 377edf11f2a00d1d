use futures_util::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Shutdown Coordinator
// ============================================================================
//
// 1. `wait_for_signal` resolves on SIGINT / SIGTERM
// 2. `token().cancel()` stops consumers pulling new messages
// 3. `close_all` releases components in reverse registration order, so
//    whatever was opened first (store, bus producer) is closed last
//
// The whole release sequence shares one grace period. When it runs out the
// remaining components are abandoned and the caller exits anyway.
//
// ============================================================================

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("shutdown grace period of {0:?} exceeded while closing {1}")]
    Timeout(Duration, &'static str),
}

pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace: Duration,
    components: Vec<(&'static str, ReleaseFn)>,
}

impl ShutdownCoordinator {
    pub fn new(grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            grace,
            components: Vec::new(),
        }
    }

    /// Cancelled once shutdown starts.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn register<F, Fut>(&mut self, name: &'static str, release: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        tracing::debug!(component = name, "Registered for shutdown");
        let release: ReleaseFn =
            Box::new(move || -> BoxFuture<'static, anyhow::Result<()>> { Box::pin(release()) });
        self.components.push((name, release));
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Cancel the token and release every component, newest first.
    ///
    /// A component that fails to close is logged and skipped.
    pub async fn close_all(mut self) -> Result<(), ShutdownError> {
        self.token.cancel();

        let deadline = tokio::time::Instant::now() + self.grace;
        tracing::info!(
            components = self.components.len(),
            grace_secs = self.grace.as_secs(),
            "Shutting down"
        );

        while let Some((name, release)) = self.components.pop() {
            match tokio::time::timeout_at(deadline, release()).await {
                Ok(Ok(())) => tracing::info!(component = name, "Closed"),
                Ok(Err(e)) => tracing::error!(component = name, error = %e, "Close failed"),
                Err(_) => {
                    tracing::error!(
                        component = name,
                        abandoned = self.components.len(),
                        "Shutdown grace period exceeded"
                    );
                    return Err(ShutdownError::Timeout(self.grace, name));
                }
            }
        }

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C");
    }

    Ok(())
}
