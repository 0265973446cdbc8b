//! Minimum spacing between remote calls.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Enforces a minimum interval between consecutive remote calls.
///
/// Clones share the same clock, so one gate can pace every concurrent item.
/// A gate without an interval never waits.
#[derive(Debug, Clone)]
pub struct PolitenessGate {
    last_call: Arc<Mutex<Option<Instant>>>,
    min_interval: Option<Duration>,
}

impl PolitenessGate {
    pub fn new(min_interval: Option<Duration>) -> Self {
        Self { last_call: Arc::new(Mutex::new(None)), min_interval }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Wait until the interval since the previous call has elapsed.
    pub async fn wait(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        let mut last = self.last_call.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_gate_does_not_wait() {
        let gate = PolitenessGate::disabled();
        let start = Instant::now();
        for _ in 0..3 {
            gate.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_first_call_is_immediate_then_spaced() {
        let gate = PolitenessGate::new(Some(Duration::from_millis(40)));
        let start = Instant::now();
        gate.wait().await;
        assert!(start.elapsed() < Duration::from_millis(20));

        gate.clone().wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
