//! Cooperative cancellation on interrupt

use crate::error::{Result, ShelfError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Shared flag raised by an interrupt
///
/// Workers check it before starting new work; encodes already running are
/// allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Error out if an interrupt has arrived
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ShelfError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Raise this flag on Ctrl-C; a second Ctrl-C exits immediately
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            if flag.is_cancelled() {
                std::process::exit(130);
            }
            warn!("Interrupt received, finishing running encodes (press Ctrl-C again to abort)");
            flag.cancel();
        })
        .map_err(|e| ShelfError::Config(format!("cannot install interrupt handler: {}", e)))
    }
}
