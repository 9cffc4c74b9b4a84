//! Delays inserted between upstream requests.
//!
//! A [`Pacing`] maps an attempt index to a delay; callers await it through
//! [`pause`], which also wakes up early when the run is cancelled.

use crate::error::HarvestError;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub trait Pacing: Send + Sync {
    fn delay(&self, attempt: u32) -> Duration;
}

impl<F> Pacing for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl Pacing for NoPacing {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedPacing(pub Duration);

impl Pacing for FixedPacing {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Uniformly random delay in `[min, max]`.
#[derive(Debug, Clone, Copy)]
pub struct JitterPacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing for JitterPacing {
    fn delay(&self, _attempt: u32) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
    }
}

/// `base * 2^attempt`, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl Pacing for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Sleeps for the paced delay unless `cancel` fires first.
pub async fn pause(
    pacing: &dyn Pacing,
    attempt: u32,
    cancel: &CancellationToken,
) -> Result<(), HarvestError> {
    if cancel.is_cancelled() {
        return Err(HarvestError::Cancelled);
    }

    let delay = pacing.delay(attempt);
    if delay.is_zero() {
        return Ok(());
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(HarvestError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_bounds() {
        let pacing = JitterPacing {
            min: Duration::from_millis(1000),
            max: Duration::from_millis(3000),
        };
        for attempt in 0..50 {
            let delay = pacing.delay(attempt);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = ExponentialBackoff {
            base: Duration::from_secs(1),
            max: Duration::from_secs(5),
        };
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(5));
        assert_eq!(backoff.delay(40), Duration::from_secs(5));
    }

    #[test]
    fn closures_are_pacing_policies() {
        let pacing = |attempt: u32| Duration::from_millis(u64::from(attempt) * 10);
        assert_eq!(pacing.delay(3), Duration::from_millis(30));
    }

    #[tokio::test]
    async fn pause_returns_cancelled_when_token_fired() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pause(&FixedPacing(Duration::from_secs(60)), 0, &cancel).await;
        assert!(matches!(result, Err(HarvestError::Cancelled)));
    }

    #[tokio::test]
    async fn zero_delay_does_not_sleep() {
        let cancel = CancellationToken::new();
        assert!(pause(&NoPacing, 7, &cancel).await.is_ok());
    }
}
