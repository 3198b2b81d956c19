//! Command hand-off slot
//!
//! A single-slot buffer between the line reader and the command processor.
//! It is not a queue: a line stored before the previous one was taken
//! replaces it, and the replacement is logged and counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Default)]
pub struct CommandSlot {
    line: Mutex<Option<String>>,
    ready: Notify,
    overwritten: AtomicU64,
}

impl CommandSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a completed line and wake the processor.
    ///
    /// Returns `true` when an unconsumed line was replaced.
    pub fn put(&self, line: String) -> bool {
        let previous = self.lock().replace(line);
        self.ready.notify_one();

        match previous {
            Some(dropped) => {
                self.overwritten.fetch_add(1, Ordering::Relaxed);
                warn!("Command '{}' replaced before it was processed", dropped);
                true
            }
            None => false,
        }
    }

    /// Take the stored line, if any
    pub fn take(&self) -> Option<String> {
        self.lock().take()
    }

    /// Wait until a line is available and take it
    pub async fn wait(&self) -> String {
        loop {
            if let Some(line) = self.take() {
                return line;
            }
            self.ready.notified().await;
        }
    }

    /// Number of lines lost to overwrites so far
    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.line.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_put_and_take() {
        let slot = CommandSlot::new();
        assert_eq!(slot.take(), None);
        assert!(!slot.put("iden".into()));
        assert_eq!(slot.take(), Some("iden".into()));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_second_line_overwrites_first() {
        let slot = CommandSlot::new();
        slot.put("get-wl?C".into());
        assert!(slot.put("get-wl?L".into()));
        assert_eq!(slot.take(), Some("get-wl?L".into()));
        assert_eq!(slot.overwritten(), 1);
    }

    #[tokio::test]
    async fn test_wait_wakes_on_put() {
        let slot = Arc::new(CommandSlot::new());
        let waiter = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        slot.put("powerup".into());
        assert_eq!(waiter.await.unwrap(), "powerup");
    }

    #[tokio::test]
    async fn test_wait_returns_stored_line_immediately() {
        let slot = CommandSlot::new();
        slot.put("iden".into());
        assert_eq!(slot.wait().await, "iden");
    }
}
