//! Token bucket pacing for providers with a per-second send quota.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = elapsed.mul_add(self.refill_rate, self.tokens).min(self.capacity);
        self.last_refill = now;
    }

    /// Take a token, or say how long until one is available
    fn try_consume(&mut self) -> Result<(), Duration> {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate))
        }
    }
}

/// Limits calls to `per_second`, allowing a burst of the same size
#[derive(Debug)]
pub struct SendRate {
    bucket: Mutex<TokenBucket>,
}

impl SendRate {
    #[must_use]
    pub fn new(per_second: u32) -> Self {
        let rate = f64::from(per_second.max(1));

        Self {
            bucket: Mutex::new(TokenBucket {
                tokens: rate,
                capacity: rate,
                refill_rate: rate,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait until a call is allowed
    pub async fn acquire(&self) {
        loop {
            let wait = self.bucket.lock().try_consume();
            match wait {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn paces_after_burst() {
        let rate = SendRate::new(20);
        let start = Instant::now();

        for _ in 0..22 {
            rate.acquire().await;
        }

        // 20 in the burst, two more at 50ms each
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn burst_is_immediate() {
        let rate = SendRate::new(5);
        let start = Instant::now();

        for _ in 0..5 {
            rate.acquire().await;
        }

        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
