//! Scoped group of timers and background work torn down together.

use std::{future::Future, time::Duration};

use tokio::time::{Instant, interval_at};
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};

/// Owns every timer started for one screen's lifetime.
///
/// Dropping the stage (or calling [`Stage::close`]) cancels all of them.
/// Detached work only observes the token; it is never aborted, so whatever
/// it reports after teardown must be discarded by the receiver.
pub struct Stage {
    name: &'static str,
    token: CancellationToken,
    timers: Vec<AbortOnDropHandle<()>>,
}

impl Stage {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            token: CancellationToken::new(),
            timers: Vec::new(),
        }
    }

    /// Token shared with detached work so it can tell the stage is gone.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run `on_tick` every `period`, first after one full period.
    /// The timer stops when `on_tick` returns false or the stage closes.
    pub fn every<F>(&mut self, period: Duration, mut on_tick: F)
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !on_tick() {
                            break;
                        }
                    }
                }
            }
        });
        self.timers.push(AbortOnDropHandle::new(handle));
    }

    /// Run `on_fire` once after `delay` unless the stage closes first.
    pub fn after<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => on_fire(),
            }
        });
        self.timers.push(AbortOnDropHandle::new(handle));
    }

    /// Spawn work that outlives teardown but must not act on it.
    pub fn detach<Fut>(&self, work: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(work);
    }

    /// Number of timers still running.
    pub fn live_timers(&self) -> usize {
        self.timers.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn close(&mut self) {
        if !self.token.is_cancelled() {
            tracing::debug!("stage {} closed with {} timers", self.name, self.timers.len());
        }
        self.token.cancel();
        self.timers.clear();
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    #[tokio::test(start_paused = true)]
    async fn test_every_ticks_after_each_period() {
        let count = Arc::new(AtomicU32::new(0));
        let mut stage = Stage::new("test");
        let c = count.clone();
        stage.every(Duration::from_millis(300), move || {
            c.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_every_timer() {
        let count = Arc::new(AtomicU32::new(0));
        let fired = Arc::new(AtomicU32::new(0));
        {
            let mut stage = Stage::new("test");
            let c = count.clone();
            stage.every(Duration::from_millis(100), move || {
                c.fetch_add(1, Ordering::SeqCst);
                true
            });
            let f = fired.clone();
            stage.after(Duration::from_secs(1), move || {
                f.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(250)).await;
            assert_eq!(stage.live_timers(), 2);
        }
        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_work_sees_closed_token() {
        let mut stage = Stage::new("test");
        let token = stage.token();
        let (tx, rx) = tokio::sync::oneshot::channel();
        stage.detach(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            let _ = tx.send(token.is_cancelled());
        });
        stage.close();
        assert!(stage.is_closed());
        assert!(rx.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_returning_false_stops_timer() {
        let count = Arc::new(AtomicU32::new(0));
        let mut stage = Stage::new("test");
        let c = count.clone();
        stage.every(Duration::from_millis(10), move || c.fetch_add(1, Ordering::SeqCst) < 2);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(stage.live_timers(), 0);
    }
}
