use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// Cooperative stop request shared between the Ctrl-C handler and the batch loop.
// The loop checks it before starting each job; a job already running is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    // Flag that gets raised on Ctrl-C. Only one handler can be installed per process.
    pub fn on_ctrlc() -> Result<Self> {
        let flag = Self::default();
        let for_signal = flag.clone();
        ctrlc::set_handler(move || for_signal.request())
            .context("installing Ctrl-C handler failed")?;
        Ok(flag)
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_seen_by_every_clone() {
        let flag = StopFlag::default();
        let observer = flag.clone();
        assert!(!observer.is_requested());
        flag.request();
        assert!(observer.is_requested());
    }
}
