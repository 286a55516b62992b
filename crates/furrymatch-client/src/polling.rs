//! Interval-driven refresh.
//!
//! There is no server push. Anything that must stay eventually consistent
//! with the backend implements [`Refresh`] and is handed to [`Poller::spawn`].
//! Each tick runs the refresh in its own task, so a slow request is never
//! cancelled by the next tick; whichever response lands last wins.
//!
//! Refresh failures are logged and dropped. The next tick retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::Result;
use crate::events::{SessionBus, SessionEvent};

#[async_trait]
pub trait Refresh: Send + Sync + 'static {
    /// Ticks are skipped while this returns `false`.
    fn is_active(&self) -> bool {
        true
    }

    async fn refresh(&self) -> Result<()>;
}

/// Owns the timer task. Dropping the handle stops the timer; refreshes
/// already in flight run to completion.
#[derive(Debug)]
pub struct PollHandle {
    name: &'static str,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {
        // Drop aborts.
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
        debug!(poller = self.name, "Poller stopped");
    }
}

type Trigger = (broadcast::Receiver<SessionEvent>, fn(&SessionEvent) -> bool);

pub struct Poller;

impl Poller {
    /// Refresh `target` every `period`, starting immediately.
    pub fn spawn(name: &'static str, period: Duration, target: Arc<dyn Refresh>) -> PollHandle {
        Self::spawn_inner(name, period, target, None)
    }

    /// Like [`Poller::spawn`], but bus events accepted by `filter` also
    /// trigger an out-of-band refresh.
    pub fn spawn_triggered(
        name: &'static str,
        period: Duration,
        target: Arc<dyn Refresh>,
        bus: &SessionBus,
        filter: fn(&SessionEvent) -> bool,
    ) -> PollHandle {
        Self::spawn_inner(name, period, target, Some((bus.subscribe(), filter)))
    }

    fn spawn_inner(
        name: &'static str,
        period: Duration,
        target: Arc<dyn Refresh>,
        mut trigger: Option<Trigger>,
    ) -> PollHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(poller = name, ?period, "Poller started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    fired = next_trigger(&mut trigger) => {
                        if !fired {
                            continue;
                        }
                        debug!(poller = name, "Triggered refresh");
                    }
                }

                if !target.is_active() {
                    continue;
                }
                let target = target.clone();
                tokio::spawn(async move {
                    if let Err(e) = target.refresh().await {
                        warn!(poller = name, error = %e, "Refresh failed, retrying next tick");
                    }
                });
            }
        });

        PollHandle { name, task }
    }
}

/// Resolves when a bus event arrives: `true` if it should trigger a
/// refresh. Never resolves without a trigger, or once the bus is gone.
async fn next_trigger(trigger: &mut Option<Trigger>) -> bool {
    let Some((rx, filter)) = trigger.as_mut() else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(event) => filter(&event),
        // Missed events; refresh once to catch up.
        Err(RecvError::Lagged(_)) => true,
        Err(RecvError::Closed) => {
            *trigger = None;
            false
        }
    }
}

/// Trigger filter for pollers that track read state.
pub fn on_chat_read(event: &SessionEvent) -> bool {
    matches!(event, SessionEvent::ChatRead { .. })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;
    use crate::error::ClientError;
    use furrymatch_shared::types::MatchId;

    #[derive(Default)]
    struct Counter {
        runs: AtomicUsize,
        paused: AtomicBool,
        failing: AtomicBool,
    }

    impl Counter {
        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Refresh for Counter {
        fn is_active(&self) -> bool {
            !self.paused.load(Ordering::SeqCst)
        }

        async fn refresh(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ClientError::Status {
                    status: 503,
                    url: "test://refresh".into(),
                });
            }
            Ok(())
        }
    }

    const PERIOD: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn test_ticks_immediately_then_every_period() {
        let counter = Arc::new(Counter::default());
        let _handle = Poller::spawn("test", PERIOD, counter.clone());

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.runs(), 1);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(counter.runs(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_target_is_skipped() {
        let counter = Arc::new(Counter::default());
        counter.paused.store(true, Ordering::SeqCst);
        let _handle = Poller::spawn("test", PERIOD, counter.clone());

        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(counter.runs(), 0);

        counter.paused.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(counter.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_polling() {
        let counter = Arc::new(Counter::default());
        counter.failing.store(true, Ordering::SeqCst);
        let handle = Poller::spawn("test", PERIOD, counter.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(counter.runs(), 3);
        assert!(!handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timer() {
        let counter = Arc::new(Counter::default());
        let handle = Poller::spawn("test", PERIOD, counter.clone());
        tokio::time::sleep(Duration::from_millis(1)).await;
        handle.stop();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_read_triggers_refresh() {
        let bus = SessionBus::new(8);
        let counter = Arc::new(Counter::default());
        let _handle = Poller::spawn_triggered(
            "unread",
            Duration::from_secs(60),
            counter.clone(),
            &bus,
            on_chat_read,
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.runs(), 1);

        bus.publish(SessionEvent::MessageSent {
            match_id: MatchId(1),
            preview: "hi".into(),
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.runs(), 1);

        bus.publish(SessionEvent::ChatRead {
            match_id: MatchId(1),
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(counter.runs(), 2);
    }
}
