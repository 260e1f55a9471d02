use std::collections::VecDeque;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding one-minute window of call timestamps.
pub struct CallWindow {
    max_calls: usize,
    calls: VecDeque<Instant>,
}

impl CallWindow {
    pub fn new(max_calls_per_minute: usize) -> Self {
        Self {
            max_calls: max_calls_per_minute.max(1),
            calls: VecDeque::new(),
        }
    }

    /// Records a call at `now` and returns how long the caller must wait before issuing it.
    pub fn reserve(&mut self, now: Instant) -> Duration {
        while let Some(oldest) = self.calls.front() {
            if now.duration_since(*oldest) >= WINDOW {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        let wait = if self.calls.len() >= self.max_calls {
            let oldest = self.calls[self.calls.len() - self.max_calls];
            WINDOW.saturating_sub(now.duration_since(oldest))
        } else {
            Duration::ZERO
        };

        self.calls.push_back(now + wait);
        wait
    }
}
