use log::{debug, info};
use std::future::Future;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A fixed-interval background job that stops when its token is cancelled
pub struct PeriodicTask {
    name: String,
    period: Duration,
    run_immediately: bool,
}

impl PeriodicTask {
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period,
            run_immediately: false,
        }
    }

    /// Also run once right away instead of waiting a full period
    pub fn run_immediately(mut self) -> Self {
        self.run_immediately = true;
        self
    }

    /// Spawn the job. Each tick runs to completion before the next is scheduled.
    pub fn spawn<F, Fut>(self, cancel: CancellationToken, mut tick: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            if !self.run_immediately {
                // The first tick of an interval completes immediately
                interval.tick().await;
            }

            info!("Timer '{}' started (every {:?})", self.name, self.period);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        debug!("Timer '{}' triggered", self.name);
                        tick().await;
                    }
                }
            }

            info!("Timer '{}' stopped", self.name);
        })
    }
}
