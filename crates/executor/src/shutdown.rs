use tokio::sync::watch;

/// Fans the process shutdown signal out to every long running task. The
/// HTTP server, queue consumers and promoter all hold a receiver and wind
/// down when it flips.
pub struct ShutdownController {
    sender: watch::Sender<bool>,
}

impl ShutdownController {
    /// Creates a controller which trips on SIGINT/SIGTERM from the OS.
    pub fn new_shutdown_on_signal() -> Self {
        let controller = Self::new_manual_shutdown();
        let sender = controller.sender.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            let _ = sender.send(true);
        });
        controller
    }

    /// Creates a controller that only trips via [`Self::shutdown`]. Used
    /// by tests.
    pub fn new_manual_shutdown() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }

    /// Resolves once shutdown has been requested.
    pub async fn signalled(&self) {
        let mut receiver = self.subscribe();
        while !*receiver.borrow() {
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.sender.send(true);
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::{signal, signal::unix};
        // On Unix-like systems, we can listen for SIGTERM.
        let mut sigterm = unix::signal(unix::SignalKind::terminate()).expect("install SIGTERM");

        let ctrl_c = signal::ctrl_c();
        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("received SIGINT");
            },
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM");
            },
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        tracing::info!("received SIGINT");
    }
}
