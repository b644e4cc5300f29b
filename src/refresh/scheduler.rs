//! Daily refresh trigger with single-flight execution
//!
//! The trigger loop sleeps until the next occurrence of the configured local
//! time of day and then fires a refresh. Scheduled firings and manual
//! triggers claim the same gate, so at most one refresh runs at a time.

use crate::config::{parse_refresh_time, SchedulerConfig};
use crate::refresh::status::{RefreshStatus, SchedulerStatus, TriggerResult};
use crate::refresh::RefreshRunner;
use crate::state::CrawlSummary;
use crate::ConfigError;
use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Returns the first instant after `now` whose local time is `at`
///
/// Days on which `at` does not exist (a DST gap) are skipped; when `at`
/// occurs twice the earlier instant is used.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let today = now.date_naive();
    let zone = now.timezone();

    (0..=2).find_map(|days| {
        let date = today + Duration::days(days);
        zone.from_local_datetime(&date.and_time(at))
            .earliest()
            .filter(|candidate| candidate > now)
    })
}

/// Where a refresh request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Firing {
    Scheduled,
    Manual,
}

struct Shared<R> {
    runner: Arc<R>,
    in_progress: AtomicBool,
    status: Mutex<RefreshStatus>,
    idle: Notify,
}

impl<R: RefreshRunner> Shared<R> {
    fn status(&self) -> MutexGuard<'_, RefreshStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the gate and starts a refresh on its own task
    fn launch(self: &Arc<Self>, firing: Firing) -> TriggerResult {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            if firing == Firing::Scheduled {
                tracing::warn!("Refresh already in progress, skipping scheduled run");
                self.status().record_skipped();
            } else {
                tracing::info!("Refresh already in progress, manual trigger ignored");
            }
            return TriggerResult::AlreadyRunning;
        }

        match firing {
            Firing::Scheduled => tracing::info!("Starting scheduled documentation refresh"),
            Firing::Manual => tracing::info!("Starting manual documentation refresh"),
        }
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let runner = Arc::clone(&shared.runner);
            let run = tokio::spawn(async move { runner.run_refresh().await });

            let result = match run.await {
                Ok(Ok(summary)) => {
                    tracing::info!(
                        "Refresh {}: {} pages updated, {} failed in {:?}",
                        summary.outcome,
                        summary.pages_succeeded,
                        summary.pages_failed,
                        summary.duration
                    );
                    Ok(summary)
                }
                Ok(Err(e)) => {
                    tracing::error!("Refresh failed: {}", e);
                    Err(e.to_string())
                }
                Err(e) => {
                    tracing::error!("Refresh task failed: {}", e);
                    Err(format!("Refresh task failed: {}", e))
                }
            };

            shared.finish(result);
        });

        TriggerResult::Scheduled
    }

    /// Records the outcome, then releases the gate while still holding the status lock
    fn finish(&self, result: Result<CrawlSummary, String>) {
        let mut status = self.status();
        status.record_run(result, Utc::now());
        self.in_progress.store(false, Ordering::Release);
        drop(status);

        self.idle.notify_waiters();
    }
}

struct TriggerLoop {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Fires incremental refreshes daily and on demand
pub struct RefreshScheduler<R> {
    shared: Arc<Shared<R>>,
    refresh_time: NaiveTime,
    trigger: Mutex<Option<TriggerLoop>>,
}

impl<R: RefreshRunner> RefreshScheduler<R> {
    /// Creates a scheduler firing daily at `refresh_time` local time
    pub fn new(runner: Arc<R>, refresh_time: NaiveTime) -> Self {
        Self {
            shared: Arc::new(Shared {
                runner,
                in_progress: AtomicBool::new(false),
                status: Mutex::new(RefreshStatus::default()),
                idle: Notify::new(),
            }),
            refresh_time,
            trigger: Mutex::new(None),
        }
    }

    /// Creates a scheduler from the `[scheduler]` config section
    pub fn from_config(runner: Arc<R>, config: &SchedulerConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(runner, parse_refresh_time(&config.refresh_time)?))
    }

    pub fn refresh_time(&self) -> NaiveTime {
        self.refresh_time
    }

    fn trigger(&self) -> MutexGuard<'_, Option<TriggerLoop>> {
        self.trigger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the daily trigger loop
    ///
    /// Must be called from within a Tokio runtime. Starting an already
    /// started scheduler does nothing.
    pub fn start(&self) {
        let mut trigger = self.trigger();
        if trigger.is_some() {
            tracing::warn!("Refresh scheduler already started");
            return;
        }

        tracing::info!(
            "Starting refresh scheduler (daily at {})",
            self.refresh_time.format("%H:%M")
        );

        let (stop, mut stop_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let at = self.refresh_time;

        let handle = tokio::spawn(async move {
            loop {
                let now = Local::now();
                let next = match next_run_after(&now, at) {
                    Some(next) => next,
                    None => {
                        tracing::error!("No upcoming local time matches {}", at);
                        break;
                    }
                };

                shared.status().next_scheduled_at = Some(next.with_timezone(&Utc));
                tracing::debug!("Next scheduled refresh at {}", next);

                let wait = next
                    .signed_duration_since(now)
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        shared.launch(Firing::Scheduled);
                    }
                    _ = stop_rx.changed() => break,
                }
            }

            shared.status().next_scheduled_at = None;
        });

        *trigger = Some(TriggerLoop { stop, handle });
    }

    /// Stops the trigger loop
    ///
    /// A refresh already in progress keeps running to completion.
    pub async fn stop(&self) {
        let trigger = self.trigger().take();
        if let Some(trigger) = trigger {
            tracing::info!("Stopping refresh scheduler");
            trigger.stop.send_replace(true);
            if let Err(e) = trigger.handle.await {
                tracing::warn!("Refresh trigger loop ended abnormally: {}", e);
            }
        }
    }

    /// Starts a refresh now unless one is already in progress
    pub fn trigger_manual(&self) -> TriggerResult {
        self.shared.launch(Firing::Manual)
    }

    pub fn is_refresh_in_progress(&self) -> bool {
        self.shared.in_progress.load(Ordering::Acquire)
    }

    /// Waits until no refresh is in progress
    pub async fn wait_for_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if !self.is_refresh_in_progress() {
                return;
            }
            notified.await;
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let scheduler_running = self.trigger().is_some();
        let status = self.shared.status();

        SchedulerStatus {
            scheduler_running,
            refresh_in_progress: self.is_refresh_in_progress(),
            last_refresh_time: status.last_run_at,
            next_scheduled_refresh_time: status.next_scheduled_at,
            last_refresh_outcome: status.last_outcome,
            pages_updated: status.pages_updated,
            last_error: status.last_error.clone(),
            skipped_runs: status.skipped_runs,
        }
    }
}
