//! Engine load sequencing
//!
//! `Uninitialized -> WaitingForEngine -> Ready`. The state only moves
//! forward; late callers of [`LoadSequencer::wait_ready`] resolve at once.

use std::fmt;

use tokio::sync::watch;
use tracing::info;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EngineState {
    /// No page has been loaded yet
    Uninitialized,
    /// Page loaded, the applet API is not callable yet
    WaitingForEngine,
    /// Listeners registered, proxies may be used
    Ready,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::WaitingForEngine => "waiting for engine",
            EngineState::Ready => "ready",
        };
        f.write_str(s)
    }
}

pub struct LoadSequencer {
    state: watch::Sender<EngineState>,
}

impl Default for LoadSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadSequencer {
    pub fn new() -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self { state }
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Navigation started; only valid once
    pub fn begin(&self) -> Result<()> {
        let mut previous = EngineState::Uninitialized;
        let moved = self.state.send_if_modified(|state| {
            previous = *state;
            if *state == EngineState::Uninitialized {
                *state = EngineState::WaitingForEngine;
                true
            } else {
                false
            }
        });

        if moved {
            info!("Waiting for the applet to load");
            Ok(())
        } else {
            Err(Error::Configuration(format!(
                "page already loaded (engine is {})",
                previous
            )))
        }
    }

    /// Engine reported itself loaded; returns `false` if it already was
    pub fn mark_ready(&self) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if *state == EngineState::Ready {
                false
            } else {
                *state = EngineState::Ready;
                true
            }
        });
        if moved {
            info!("Applet ready");
        }
        moved
    }

    /// Fail fast with `NotReady` unless the engine is ready
    pub fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }

    pub async fn wait_ready(&self) -> Result<()> {
        let mut rx = self.state.subscribe();
        rx.wait_for(|state| *state == EngineState::Ready)
            .await
            .map(|_| ())
            .map_err(|_| Error::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_transitions() {
        let seq = LoadSequencer::new();
        assert_eq!(seq.state(), EngineState::Uninitialized);
        assert!(matches!(seq.ensure_ready(), Err(Error::NotReady)));

        seq.begin().unwrap();
        assert_eq!(seq.state(), EngineState::WaitingForEngine);
        assert!(matches!(seq.begin(), Err(Error::Configuration(_))));

        assert!(seq.mark_ready());
        assert!(!seq.mark_ready());
        assert!(seq.ensure_ready().is_ok());
    }

    #[tokio::test]
    async fn test_wait_ready() {
        let seq = Arc::new(LoadSequencer::new());
        seq.begin().unwrap();

        let waiter = {
            let seq = seq.clone();
            tokio::spawn(async move { seq.wait_ready().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        seq.mark_ready();
        waiter.await.unwrap().unwrap();

        // Late callers resolve immediately
        tokio::time::timeout(Duration::from_millis(10), seq.wait_ready())
            .await
            .unwrap()
            .unwrap();
    }
}
