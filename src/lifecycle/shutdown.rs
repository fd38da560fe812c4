//! Signal handling for shutdown

use std::io;

use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// Which signal ended the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    Quit,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Interrupt => write!(f, "SIGINT"),
            ShutdownReason::Terminate => write!(f, "SIGTERM"),
            ShutdownReason::Quit => write!(f, "SIGQUIT"),
        }
    }
}

/// Handles shutdown signals (SIGINT, SIGTERM, SIGQUIT)
pub struct ShutdownSignal {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
    sigquit: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Register the handlers.
    ///
    /// Done up front so a signal arriving during startup is queued
    /// instead of killing the process with the indirection in place.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sigquit: signal(SignalKind::quit())?,
        })
    }

    /// Wait for a shutdown signal
    pub async fn wait(&mut self) -> ShutdownReason {
        let reason = tokio::select! {
            _ = self.sigint.recv() => ShutdownReason::Interrupt,
            _ = self.sigterm.recv() => ShutdownReason::Terminate,
            _ = self.sigquit.recv() => ShutdownReason::Quit,
        };
        debug!(%reason, "received signal");
        reason
    }
}
