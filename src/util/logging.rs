//! # Log Rate Limiting
//!
//! Rate-limited logging support for the noisy decode paths. A single run of
//! line noise can produce hundreds of unrecognized frames per second; the
//! throttle keeps the log readable without hiding that the noise happened.
//!
//! ## Usage
//!
//! ```rust
//! use dart_rs::util::logging::LogThrottle;
//!
//! let mut throttle = LogThrottle::new(1000, 5); // 5 messages per second
//! if throttle.allow() {
//!     log::warn!("unrecognized frame");
//! }
//! ```

use std::time::Instant;

/// Throttling structure for rate-limiting log messages
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    /// Current message count in window
    count: u32,
    /// Start time of current window
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with time window and message cap
    pub fn new(window_ms: u64, cap: u32) -> Self {
        LogThrottle {
            window_ms,
            cap,
            count: 0,
            t0: Instant::now(),
        }
    }

    /// Returns true when a message may be emitted in the current window.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.t0).as_millis() as u64 >= self.window_ms {
            self.t0 = now;
            self.count = 0;
        }
        self.count += 1;
        self.count <= self.cap
    }

    /// Messages suppressed in the current window so far.
    pub fn suppressed(&self) -> u32 {
        self.count.saturating_sub(self.cap)
    }
}
