//! Run Cancellation
//!
//! A [`RunCancel`] is shared between whoever may stop a run (the signal
//! listener, a test) and the coordinator's admission loop. Cancelling stops
//! admission only: blocks already admitted finish their transition, so a
//! rotation is never cut between its copy and its delete. The first reason
//! recorded is the one the run summary reports.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What stopped admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// `RunCancel::cancel` from code
    Requested,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::Interrupt => "interrupt",
            StopReason::Terminate => "terminate",
            StopReason::Requested => "requested",
        };
        f.write_str(reason)
    }
}

/// Cancellation flag for one repair run. Clones observe the same flag.
#[derive(Debug, Clone)]
pub struct RunCancel {
    reason: watch::Sender<Option<StopReason>>,
}

impl RunCancel {
    pub fn new() -> Self {
        Self {
            reason: watch::Sender::new(None),
        }
    }

    /// Stop admitting blocks. Returns `false` if the run was already cancelled.
    pub fn cancel(&self, reason: StopReason) -> bool {
        self.reason.send_if_modified(|current| match current {
            Some(_) => false,
            None => {
                *current = Some(reason);
                true
            }
        })
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.reason.borrow()
    }

    /// Resolves once the run is cancelled, immediately if it already is.
    pub async fn cancelled(&self) -> StopReason {
        let mut rx = self.reason.subscribe();
        let reason = match rx.wait_for(Option::is_some).await {
            Ok(current) => *current,
            Err(_) => None,
        };
        reason.unwrap_or(StopReason::Requested)
    }
}

impl Default for RunCancel {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancel `cancel` on the first SIGINT or SIGTERM.
///
/// If the handlers cannot be installed the run is never cancelled by a
/// signal; it logs a warning and runs to completion.
pub fn cancel_on_signal(cancel: RunCancel) -> JoinHandle<()> {
    tokio::spawn(async move {
        match next_stop_signal().await {
            Ok(reason) => {
                info!(reason = %reason, "Stop signal received, finishing blocks in flight");
                cancel.cancel(reason);
            }
            Err(e) => warn!(error = %e, "Could not install signal handlers"),
        }
    })
}

#[cfg(unix)]
async fn next_stop_signal() -> std::io::Result<StopReason> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        interrupted = tokio::signal::ctrl_c() => interrupted.map(|()| StopReason::Interrupt),
        _ = terminate.recv() => Ok(StopReason::Terminate),
    }
}

#[cfg(not(unix))]
async fn next_stop_signal() -> std::io::Result<StopReason> {
    tokio::signal::ctrl_c().await?;
    Ok(StopReason::Interrupt)
}
