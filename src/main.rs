//! hyperkey: Caps Lock as a hyper key for macOS
//!
//! Runs in the background and provides:
//! - A Caps Lock → F18 indirection via `hidutil`, reverted on exit
//! - A CGEventTap that turns a held Caps Lock into Cmd+Ctrl+Opt
//! - A quick-press action: toggle Caps Lock or send a custom key
//!
//! Scope:
//! - One trigger key, one fixed action chosen on the command line
//! - No configuration file, no per-application rules

mod action;
mod config;
mod hotkey;
mod intercept;
mod lifecycle;
mod remap;
mod state;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::hotkey::codes;
use crate::intercept::{Interceptor, InterceptorSettings};
use crate::lifecycle::{LifecycleGuard, ShutdownSignal};
use crate::remap::{KeyIndirector, RemapSpec};

#[tokio::main]
async fn main() -> Result<()> {
    // Bad arguments exit before anything touches the keyboard
    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => std::process::exit(config::report_parse_error(&e)),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hyperkey starting");
    info!(?config, "configuration loaded");

    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;
    lifecycle::install_panic_hook();

    let spec = RemapSpec::caps_lock_to_f18();
    let mut interceptor = Interceptor::new(InterceptorSettings::new(&config, codes::F18));

    // The indirection only goes in once the tap can receive F18
    let guard = match interceptor.start() {
        Ok(()) => {
            info!("event interceptor started");
            let guard = LifecycleGuard::install(KeyIndirector::hidutil(spec))?;
            if let Err(e) = guard.apply() {
                warn!(error = %e, "key indirection unavailable, Caps Lock keeps its native delay");
            }
            Some(guard)
        }
        Err(e) => {
            error!(error = %e, "failed to start event interceptor");
            warn!(
                "continuing without interception - grant Accessibility and Input Monitoring \
                 access in System Settings → Privacy & Security, then restart hyperkey"
            );
            None
        }
    };

    info!("hyperkey initialized, waiting for shutdown");

    tokio::select! {
        reason = shutdown.wait() => {
            lifecycle::revert_active();
            info!(%reason, "shutdown signal received");
            std::process::exit(0);
        }

        _ = interceptor.finished() => {
            warn!("event interceptor exited");
        }
    }

    // Cleanup
    info!("shutting down...");

    if let Some(guard) = guard {
        guard.revert();
    }

    info!("hyperkey stopped");

    Ok(())
}
