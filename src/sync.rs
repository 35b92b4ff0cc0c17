//! Interrupt handling for long runs.
//!
//! The comparator checks the flag between positions and the driver checks it
//! while waiting for a reply, so Ctrl-C unwinds through normal teardown
//! instead of killing the harness with the candidate still attached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag raised when the run should stop.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    #[must_use]
    pub fn new() -> Self {
        StopFlag(Arc::new(AtomicBool::new(false)))
    }

    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Raise this flag on SIGINT / Ctrl-C.
    ///
    /// A second interrupt while the first is still being handled exits the
    /// process immediately.
    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            if flag.is_stopped() {
                log::warn!("second interrupt, exiting without cleanup");
                std::process::exit(130);
            }
            log::warn!("interrupt received, stopping after cleanup");
            flag.stop();
        })
    }
}
