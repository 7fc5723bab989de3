use std::time::Instant;

use log::{Level, debug, log_enabled};

/// Drop-logged tick duration, measured only when debug logging is on.
pub struct TickTimer {
    clock: u64,
    start: Option<Instant>,
}

impl TickTimer {
    pub fn new(clock: u64) -> Self {
        Self {
            clock,
            start: log_enabled!(Level::Debug).then(Instant::now),
        }
    }
}

impl Drop for TickTimer {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            debug!(
                "Tick {} took {} ms",
                self.clock,
                start.elapsed().as_millis()
            );
        }
    }
}
