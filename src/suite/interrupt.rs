//! Ctrl-C handling for the synchronous runner.
//!
//! A watcher thread runs a tiny current-thread runtime that waits for the
//! signal and raises a shared flag. The runner polls the flag between steps;
//! child processes poll it while they run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn as_atomic(&self) -> &AtomicBool {
        &self.0
    }

    /// Raise this flag on the first Ctrl-C. Failure to listen is logged, not fatal.
    pub fn watch_ctrl_c(&self) {
        let flag = self.clone();
        let spawned = std::thread::Builder::new()
            .name("ssz-ctrl-c".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::warn!(error = %e, "cannot start signal runtime; Ctrl-C will not be graceful");
                        return;
                    }
                };
                if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                    flag.raise();
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "cannot spawn signal watcher");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_state() {
        let flag = InterruptFlag::new();
        let other = flag.clone();
        assert!(!other.is_raised());
        flag.raise();
        assert!(other.is_raised());
        assert!(other.as_atomic().load(Ordering::SeqCst));
    }
}
