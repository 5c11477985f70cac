//! Beacon audio playback
//!
//! Playback is fire-and-forget: the control loop never waits for the
//! player and never learns whether it worked. Failures only reach the log.

use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, error, info};

/// Starts audio playback without blocking the caller
pub trait Player: Send + Sync {
    fn play_async(&self, resource: &str);
}

/// Errors from an external player process
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("no async runtime available to launch {program}")]
    NoRuntime { program: String },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Exit { program: String, status: ExitStatus },
}

/// Runs `<program> <resource>` as a detached task
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
}

impl CommandPlayer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Player for CommandPlayer {
    fn play_async(&self, resource: &str) {
        let program = self.program.clone();
        let resource = resource.to_string();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            let e = PlaybackError::NoRuntime { program };
            error!(%e, "beacon playback not started");
            return;
        };

        // Detached: the JoinHandle is dropped on purpose
        runtime.spawn(async move {
            match play(&program, &resource).await {
                Ok(()) => debug!(%program, %resource, "beacon playback finished"),
                Err(e) => error!(%e, "beacon playback failed"),
            }
        });
    }
}

async fn play(program: &str, resource: &str) -> Result<(), PlaybackError> {
    info!(%program, %resource, "starting beacon playback");

    let status = Command::new(program)
        .arg(resource)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|source| PlaybackError::Spawn {
            program: program.to_string(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(PlaybackError::Exit {
            program: program.to_string(),
            status,
        })
    }
}

/// Records requested resources instead of playing them
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingPlayer {
    played: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Player for RecordingPlayer {
    fn play_async(&self, resource: &str) {
        self.played.lock().unwrap().push(resource.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_play_success() {
        assert!(play("true", "beacon.wav").await.is_ok());
    }

    #[tokio::test]
    async fn test_play_exit_failure() {
        let err = play("false", "beacon.wav").await.unwrap_err();
        assert!(matches!(err, PlaybackError::Exit { .. }));
    }

    #[tokio::test]
    async fn test_play_missing_program() {
        let err = play("/nonexistent/player", "beacon.wav").await.unwrap_err();
        assert!(matches!(err, PlaybackError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/player"));
    }

    #[tokio::test]
    async fn test_play_async_returns_immediately() {
        let player = CommandPlayer::new("/nonexistent/player");
        // Must not panic or surface the failure
        player.play_async("beacon.wav");
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_play_async_without_runtime() {
        CommandPlayer::new("true").play_async("beacon.wav");
    }
}
