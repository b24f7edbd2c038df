//! Process shutdown coordination
//!
//! Turns SIGINT/SIGTERM/SIGHUP/SIGQUIT (or Ctrl-C on other platforms) into
//! the cancellation of one root [`CancellationToken`]. Services take child
//! tokens from the coordinator; a second signal while shutdown is in
//! progress exits the process immediately with status 130.

use log::{info, warn};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit status used when a second signal forces termination
pub const FORCED_EXIT_CODE: i32 = 130;

/// Owns the root token cancelled on shutdown
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    root: CancellationToken,
    signals_seen: Arc<AtomicUsize>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when shutdown is triggered
    pub fn token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn trigger_shutdown(&self) {
        self.root.cancel();
    }

    /// Record a received signal; true when it is the first one
    fn on_signal(&self, name: &str) -> bool {
        let previous = self.signals_seen.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            info!("Received {}, shutting down", name);
            self.trigger_shutdown();
            true
        } else {
            warn!("Received {} again; exiting immediately", name);
            false
        }
    }

    /// Install signal handlers, then run `future_fn` with a shutdown token
    ///
    /// ```rust,no_run
    /// use topicq::core::shutdown::ShutdownCoordinator;
    ///
    /// # async fn example() -> Result<(), String> {
    /// ShutdownCoordinator::guard(|shutdown| async move {
    ///     shutdown.cancelled().await;
    ///     Ok::<(), String>(())
    /// })
    /// .await
    /// # }
    /// ```
    pub async fn guard<F, Fut, R, E>(future_fn: F) -> Result<R, E>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let coordinator = Self::new();
        coordinator.install_signal_handlers();
        future_fn(coordinator.token()).await
    }

    /// Spawn one listener task per handled signal
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            // Writing to a closed pipe should end the process quietly
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            let kinds = [
                (SignalKind::interrupt(), "SIGINT"),
                (SignalKind::terminate(), "SIGTERM"),
                (SignalKind::hangup(), "SIGHUP"),
                (SignalKind::quit(), "SIGQUIT"),
            ];

            for (kind, name) in kinds {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    let Ok(mut stream) = signal(kind) else {
                        warn!("Could not listen for {}", name);
                        return;
                    };
                    while stream.recv().await.is_some() {
                        if !coordinator.on_signal(name) {
                            std::process::exit(FORCED_EXIT_CODE);
                        }
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if !coordinator.on_signal("Ctrl-C") {
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                }
            });
        }
    }
}
