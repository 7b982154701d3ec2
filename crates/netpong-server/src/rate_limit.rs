use tokio::time::Instant;

/// Token bucket for one WebSocket connection. Tracks how many frames the
/// current burst has dropped so callers can log once per burst instead of
/// once per frame.
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    per_sec: f64,
    refilled_at: Instant,
    dropped: u32,
}

impl TokenBucket {
    /// Full bucket holding `capacity` tokens, refilled at `per_sec`.
    pub fn new(capacity: f64, per_sec: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            per_sec,
            refilled_at: Instant::now(),
            dropped: 0,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.per_sec).min(self.capacity);
        self.refilled_at = now;
    }

    /// Spend one token. `false` means the frame should be dropped.
    pub fn allow(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            self.dropped = self.dropped.saturating_add(1);
            false
        }
    }

    /// Frames dropped since the last [`TokenBucket::end_burst`].
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Reset the drop counter, returning its value.
    pub fn end_burst(&mut self) -> u32 {
        std::mem::take(&mut self.dropped)
    }
}
