//! Ctrl-C routing.
//!
//! A single listener owns the process's interrupt signal. By default an
//! interrupt terminates the process; while a [`RedirectGuard`] is alive the
//! interrupt cancels that guard's token instead. Dropping the guard restores
//! whatever was in effect before it, so redirects nest.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exit status used when an interrupt is not redirected (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Clone, Default)]
pub struct InterruptRouter {
    target: Arc<Mutex<Option<CancellationToken>>>,
}

impl InterruptRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start listening for Ctrl-C on the current runtime.
    pub fn listen(&self) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!("cannot listen for interrupts: {}", err);
                    return;
                }
                if !router.interrupt() {
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        })
    }

    /// Send interrupts to `token` until the returned guard is dropped.
    pub fn redirect(&self, token: CancellationToken) -> RedirectGuard {
        let previous = self
            .target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token);
        RedirectGuard {
            target: Arc::clone(&self.target),
            previous,
        }
    }

    /// Deliver one interrupt. Returns `false` when nothing is redirected and
    /// the default behaviour applies.
    pub fn interrupt(&self) -> bool {
        let target = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        match target.as_ref() {
            Some(token) => {
                if !token.is_cancelled() {
                    eprintln!("\nInterrupted; waiting for in-flight downloads to finish...");
                }
                debug!("interrupt redirected to the running download");
                token.cancel();
                true
            }
            None => false,
        }
    }
}

#[must_use = "the redirect ends as soon as the guard is dropped"]
pub struct RedirectGuard {
    target: Arc<Mutex<Option<CancellationToken>>>,
    previous: Option<CancellationToken>,
}

impl Drop for RedirectGuard {
    fn drop(&mut self) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = self.previous.take();
    }
}
