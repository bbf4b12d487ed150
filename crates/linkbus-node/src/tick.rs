/// Gate that opens once per tick period on a free-running millisecond clock.
///
/// Survives clock wrap-around.
#[derive(Debug, Clone)]
pub struct Ticker {
    period_ms: u32,
    last_ms: u32,
}

impl Ticker {
    pub fn new(period_ms: u32) -> Self {
        Self {
            period_ms,
            last_ms: 0,
        }
    }

    /// True if at least one period has passed since the last time it was.
    pub fn due(&mut self, now_ms: u32) -> bool {
        if now_ms.wrapping_sub(self.last_ms) >= self.period_ms {
            self.last_ms = now_ms;
            true
        } else {
            false
        }
    }
}
