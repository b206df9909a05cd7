use crate::error::AppResult;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Performs one refresh and returns the new expiry.
pub type RefreshJob = Arc<dyn Fn() -> BoxFuture<'static, AppResult<DateTime<Utc>>> + Send + Sync>;

#[derive(Default)]
struct Slot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    next_fire: Option<Duration>,
}

struct Inner {
    lead: Duration,
    slot: Mutex<Slot>,
}

impl Inner {
    fn delay_until_refresh(&self, expiry: DateTime<Utc>) -> Duration {
        let lead =
            chrono::Duration::from_std(self.lead).unwrap_or_else(|_| chrono::Duration::zero());
        (expiry - lead - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Record the next wake-up, unless this run has been superseded.
    fn record_next(&self, generation: u64, delay: Duration) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation != generation {
            return false;
        }
        slot.next_fire = Some(delay);
        true
    }

    fn release(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation == generation {
            slot.handle = None;
            slot.next_fire = None;
        }
    }
}

/// Keeps at most one refresh loop alive. Each wake-up is computed from the
/// absolute token expiry rather than a fixed interval, so a host that slept
/// through a deadline refreshes as soon as it runs again.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    pub fn new(lead: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                lead,
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    pub fn delay_until_refresh(&self, expiry: DateTime<Utc>) -> Duration {
        self.inner.delay_until_refresh(expiry)
    }

    /// Cancel any live loop and start a new one targeting `expiry - lead`.
    pub fn arm(&self, expiry: DateTime<Utc>, job: RefreshJob) {
        let delay = self.inner.delay_until_refresh(expiry);
        let mut slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.handle.take() {
            previous.abort();
        }
        slot.generation += 1;
        slot.next_fire = Some(delay);
        let generation = slot.generation;

        log::info!("Token refresh armed in {}s", delay.as_secs());
        let inner = Arc::clone(&self.inner);
        slot.handle = Some(tokio::spawn(run(inner, generation, delay, job)));
    }

    pub fn cancel(&self) {
        let mut slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        slot.next_fire = None;
        if let Some(handle) = slot.handle.take() {
            handle.abort();
            log::info!("Token refresh disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        let slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.handle.is_some()
    }

    /// Delay the live loop was last armed with.
    pub fn next_fire(&self) -> Option<Duration> {
        let slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.next_fire
    }
}

async fn run(inner: Arc<Inner>, generation: u64, first_delay: Duration, job: RefreshJob) {
    let mut delay = first_delay;
    loop {
        tokio::time::sleep(delay).await;
        match job().await {
            Ok(expiry) => {
                delay = inner.delay_until_refresh(expiry);
                if !inner.record_next(generation, delay) {
                    return;
                }
                log::info!("Token refreshed; next refresh in {}s", delay.as_secs());
            }
            Err(e) => {
                log::warn!("Token refresh failed: {}. Refresh loop stopped.", e);
                inner.release(generation);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(calls: Arc<AtomicUsize>, next_expiry_secs: Option<i64>) -> RefreshJob {
        Arc::new(move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                match next_expiry_secs {
                    Some(secs) => Ok(Utc::now() + chrono::Duration::seconds(secs)),
                    None => Err(AppError::TokenExpired),
                }
            })
        })
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn delay_subtracts_lead_from_expiry() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(60));
        let delay = scheduler.delay_until_refresh(Utc::now() + chrono::Duration::seconds(3600));
        assert!(delay <= Duration::from_secs(3540));
        assert!(delay > Duration::from_secs(3538));
    }

    #[test]
    fn past_due_expiry_fires_immediately() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(60));
        let delay = scheduler.delay_until_refresh(Utc::now() - chrono::Duration::seconds(10));
        assert_eq!(delay, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_then_rearms_from_new_expiry() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        scheduler.arm(
            Utc::now() + chrono::Duration::seconds(3600),
            counting_job(Arc::clone(&calls), Some(1800)),
        );

        tokio::time::sleep(Duration::from_secs(3500)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(41)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let next = scheduler.next_fire().unwrap();
        assert!(next <= Duration::from_secs(1740));
        assert!(next > Duration::from_secs(1730));
        assert!(scheduler.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_stops_the_loop() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        scheduler.arm(Utc::now(), counting_job(Arc::clone(&calls), None));

        tokio::time::sleep(Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.next_fire(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_cancels_the_previous_loop() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(60));
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        scheduler.arm(
            Utc::now() + chrono::Duration::seconds(120),
            counting_job(Arc::clone(&first), Some(3600)),
        );
        scheduler.arm(
            Utc::now() + chrono::Duration::seconds(600),
            counting_job(Arc::clone(&second), Some(3600)),
        );

        tokio::time::sleep(Duration::from_secs(541)).await;
        settle().await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_disarms() {
        let scheduler = RefreshScheduler::new(Duration::from_secs(60));
        scheduler.arm(
            Utc::now() + chrono::Duration::seconds(3600),
            counting_job(Arc::new(AtomicUsize::new(0)), Some(3600)),
        );
        assert!(scheduler.is_armed());
        scheduler.cancel();
        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.next_fire(), None);
    }
}
