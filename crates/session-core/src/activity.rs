//! Inactivity tracking for established sessions.
//!
//! A session that exchanges no media for the configured window is torn
//! down rather than left holding a dead TCP connection. The monitor is a
//! sliding deadline: any traffic calls [`ActivityMonitor::touch`], and
//! the session task races [`ActivityMonitor::expired`] against its other
//! event sources.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Sliding inactivity deadline.
#[derive(Debug)]
pub struct ActivityMonitor {
    deadline: Mutex<Instant>,
    timeout: Duration,
}

impl ActivityMonitor {
    /// Start the window now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Mutex::new(Instant::now() + timeout),
            timeout,
        }
    }

    /// Reset the window. Call on any media traffic, either direction.
    pub fn touch(&self) {
        *self.deadline.lock() = Instant::now() + self.timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves once the deadline passes with no intervening touch.
    ///
    /// Cancel-safe: the deadline is re-read after every sleep, so a touch
    /// that lands mid-sleep just extends the wait.
    pub async fn expired(&self) {
        loop {
            let deadline = *self.deadline.lock();
            tokio::time::sleep_until(deadline).await;
            if *self.deadline.lock() <= Instant::now() {
                return;
            }
        }
    }
}
