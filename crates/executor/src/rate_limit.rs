//! Fixed window limiter gating how many orders enter routing per minute.
//! Process wide: one instance is constructed at startup and shared by all
//! workers.

use {
    std::sync::Mutex,
    std::time::Duration,
    tokio::time::Instant,
};

pub struct FixedWindow {
    max: u32,
    window: Duration,
    yield_interval: Duration,
    state: Mutex<State>,
}

struct State {
    window_start: Instant,
    used: u32,
}

impl FixedWindow {
    /// A limiter admitting `max(1, max)` acquisitions per `window`.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max: max.max(1),
            window,
            yield_interval: Duration::from_millis(200),
            state: Mutex::new(State {
                window_start: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Per minute limiter, the window the routing gate uses.
    pub fn per_minute(max: u32) -> Self {
        Self::new(max, Duration::from_secs(60))
    }

    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        if now.duration_since(state.window_start) >= self.window {
            state.window_start = now;
            state.used = 0;
        }
        if state.used < self.max {
            state.used += 1;
            true
        } else {
            false
        }
    }

    /// Waits until a slot frees up, yielding in short intervals so a
    /// shutdown can still cancel the owning task promptly.
    pub async fn acquire(&self) {
        while !self.try_acquire() {
            tokio::time::sleep(self.yield_interval).await;
        }
    }
}
