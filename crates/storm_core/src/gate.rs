//! Pause gate for a running build.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Open/closed gate shared by a build and whoever controls it.
///
/// The build calls [`PauseGate::wait_until_open`] before every side effect
/// and [`PauseGate::sleep`] for simulated work. Closing the gate freezes the
/// build at its next checkpoint; a sleep interrupted by a pause resumes with
/// the time it had left.
#[derive(Debug, Clone)]
pub struct PauseGate {
    open: Arc<watch::Sender<bool>>,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseGate {
    /// A new, open gate.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { open: Arc::new(tx) }
    }

    pub fn pause(&self) {
        self.open.send_replace(false);
    }

    pub fn resume(&self) {
        self.open.send_replace(true);
    }

    pub fn is_paused(&self) -> bool {
        !*self.open.borrow()
    }

    /// Return once the gate is open.
    pub async fn wait_until_open(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives in `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|open| *open).await.map(|_| ());
    }

    /// Sleep for `duration` of open-gate time.
    pub async fn sleep(&self, duration: Duration) {
        let mut remaining = duration;
        let mut rx = self.open.subscribe();

        while !remaining.is_zero() {
            self.wait_until_open().await;

            let started = Instant::now();
            tokio::select! {
                _ = tokio::time::sleep(remaining) => return,
                _ = rx.wait_for(|open| !*open) => {
                    remaining = remaining.saturating_sub(started.elapsed());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_gate_does_not_block() {
        let gate = PauseGate::new();
        assert!(!gate.is_paused());
        tokio::time::timeout(Duration::from_millis(100), gate.wait_until_open())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_paused_gate_blocks_until_resume() {
        let gate = PauseGate::new();
        gate.pause();
        assert!(gate.is_paused());

        let blocked = tokio::time::timeout(Duration::from_millis(50), gate.wait_until_open()).await;
        assert!(blocked.is_err());

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait_until_open().await }
        });
        gate.resume();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_keeps_remaining_time_across_pause() {
        let gate = PauseGate::new();
        let start = Instant::now();

        let sleeper = tokio::spawn({
            let gate = gate.clone();
            async move { gate.sleep(Duration::from_secs(10)).await }
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        gate.pause();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!sleeper.is_finished());
        gate.resume();

        sleeper.await.unwrap();
        let elapsed = start.elapsed();
        // 4s before the pause, 30s paused, 6s after.
        assert!(elapsed >= Duration::from_secs(40));
        assert!(elapsed < Duration::from_secs(41));
    }

    #[tokio::test]
    async fn test_zero_sleep_returns_immediately() {
        let gate = PauseGate::new();
        gate.pause();
        tokio::time::timeout(Duration::from_millis(50), gate.sleep(Duration::ZERO))
            .await
            .unwrap();
    }
}
