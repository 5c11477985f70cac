//! Signal handling for graceful shutdown

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::{Event, EventSender};

/// Errors registering the termination handlers
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error("failed to register {name} handler: {source}")]
    Register {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Handles shutdown signals (SIGTERM, SIGINT)
pub struct ShutdownSignal {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignal {
    /// Register the handlers. From here on SIGTERM and SIGINT no longer
    /// kill the process directly. Must be called inside the runtime.
    pub fn install() -> Result<Self, ShutdownError> {
        let sigterm = signal(SignalKind::terminate()).map_err(|source| ShutdownError::Register {
            name: "SIGTERM",
            source,
        })?;
        let sigint = signal(SignalKind::interrupt()).map_err(|source| ShutdownError::Register {
            name: "SIGINT",
            source,
        })?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for a shutdown signal
    pub async fn wait(&mut self) {
        tokio::select! {
            _ = self.sigterm.recv() => {
                debug!("received SIGTERM");
            }
            _ = self.sigint.recv() => {
                debug!("received SIGINT");
            }
        }
    }

    /// Turn the first termination signal into a `Shutdown` event on the
    /// control queue
    pub fn forward(mut self, events: EventSender) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.wait().await;
            info!("shutdown signal received");
            let _ = events.send(Event::Shutdown);
        })
    }
}
