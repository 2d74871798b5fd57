//! Minute-resolution trigger loop for the daily reminder and summary passes.
//!
//! # Responsibility
//! - Poll the clock, re-resolve the configured marks from a fresh settings
//!   snapshot on every tick, and run each due pass.
//! - Own the per-day fired flags (`DailyCycleState`).
//!
//! # Invariants
//! - Each trigger fires at most once per calendar day, however many ticks land
//!   inside its minute and however the mark changes after it fired.
//! - A minute missed entirely (suspend, long stall) is not caught up later.
//! - A failing or panicking pass never stops the loop.

mod clock;

pub use clock::{Clock, FixedClock, LocalClock};

use crate::model::time_mark::{parse_time_mark, TimeMark};
use crate::service::reminder::ReminderEngine;
use crate::service::summary::SummaryEngine;
use crate::settings::SettingsProvider;
use chrono::{NaiveDate, NaiveDateTime};
use log::{error, info, warn};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default wake interval; short enough that no minute is skipped by drift.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Coarsest accepted wake interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

const THREAD_NAME: &str = "checkin-scheduler";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Reminder,
    Summary,
}

impl Trigger {
    pub const ALL: [Trigger; 2] = [Trigger::Reminder, Trigger::Summary];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Summary => "summary",
        }
    }
}

impl Display for Trigger {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fired flags for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCycleState {
    date: NaiveDate,
    reminder_fired: bool,
    summary_fired: bool,
}

impl DailyCycleState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            reminder_fired: false,
            summary_fired: false,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Moves to `date`, clearing both flags when the day changed.
    ///
    /// Returns `true` on rollover.
    pub fn observe(&mut self, date: NaiveDate) -> bool {
        if self.date == date {
            return false;
        }
        *self = Self::new(date);
        true
    }

    pub fn has_fired(&self, trigger: Trigger) -> bool {
        match trigger {
            Trigger::Reminder => self.reminder_fired,
            Trigger::Summary => self.summary_fired,
        }
    }

    pub fn mark_fired(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::Reminder => self.reminder_fired = true,
            Trigger::Summary => self.summary_fired = true,
        }
    }
}

/// Tick-and-compare scheduler. Drive it with [`Scheduler::tick`] directly or
/// hand it to a background thread with [`Scheduler::start`].
pub struct Scheduler {
    settings: Arc<dyn SettingsProvider>,
    reminder: Arc<ReminderEngine>,
    summary: Arc<SummaryEngine>,
    cycle: Option<DailyCycleState>,
    /// Settings version the marks were last resolved from.
    settings_version: Option<u64>,
    /// Last malformed value logged per trigger.
    malformed_marks: HashMap<Trigger, String>,
}

impl Scheduler {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        reminder: Arc<ReminderEngine>,
        summary: Arc<SummaryEngine>,
    ) -> Self {
        Self {
            settings,
            reminder,
            summary,
            cycle: None,
            settings_version: None,
            malformed_marks: HashMap::new(),
        }
    }

    /// Fired flags for the most recently observed day.
    pub fn cycle(&self) -> Option<&DailyCycleState> {
        self.cycle.as_ref()
    }

    /// Runs every pass due at `now` and returns the triggers that fired.
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<Trigger> {
        let date = now.date();
        let settings = self.settings.snapshot();
        let version = self.settings.version();
        if self.settings_version.replace(version) != Some(version) {
            info!(
                "event=scheduler_settings module=scheduler status=ok version={version} reminder_time={} summary_time={}",
                settings.reminder_time, settings.summary_time
            );
        }
        let marks = [
            (
                Trigger::Reminder,
                self.resolve_mark(Trigger::Reminder, &settings.reminder_time),
            ),
            (
                Trigger::Summary,
                self.resolve_mark(Trigger::Summary, &settings.summary_time),
            ),
        ];

        let cycle = self.cycle.get_or_insert_with(|| DailyCycleState::new(date));
        if cycle.observe(date) {
            info!("event=scheduler_rollover module=scheduler status=ok date={date}");
        }

        let mut due = Vec::new();
        for (trigger, mark) in marks {
            let Some(mark) = mark else {
                continue;
            };
            if mark.matches(now.time()) && !cycle.has_fired(trigger) {
                cycle.mark_fired(trigger);
                due.push(trigger);
            }
        }

        for &trigger in &due {
            self.run_pass(trigger, date);
        }
        due
    }

    /// Moves the scheduler onto a named background thread.
    ///
    /// Intervals above [`MAX_POLL_INTERVAL`] are clamped.
    pub fn start(
        self,
        clock: impl Clock + 'static,
        interval: Duration,
    ) -> std::io::Result<SchedulerHandle> {
        let interval = if interval > MAX_POLL_INTERVAL {
            warn!(
                "event=scheduler_start module=scheduler status=warn reason=interval_clamped requested_ms={}",
                interval.as_millis()
            );
            MAX_POLL_INTERVAL
        } else {
            interval
        };

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let mut scheduler = self;
                info!(
                    "event=scheduler_start module=scheduler status=ok interval_ms={}",
                    interval.as_millis()
                );
                loop {
                    scheduler.tick(clock.now());
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("event=scheduler_stop module=scheduler status=ok");
                scheduler
            })?;

        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    fn resolve_mark(&mut self, trigger: Trigger, raw: &str) -> Option<TimeMark> {
        match parse_time_mark(raw) {
            Ok(mark) => {
                self.malformed_marks.remove(&trigger);
                mark
            }
            Err(err) => {
                if self.malformed_marks.get(&trigger) != Some(&err.value) {
                    warn!(
                        "event=scheduler_mark module=scheduler status=skip trigger={trigger} error={err}"
                    );
                    self.malformed_marks.insert(trigger, err.value);
                }
                None
            }
        }
    }

    fn run_pass(&self, trigger: Trigger, date: NaiveDate) {
        info!("event=scheduler_fire module=scheduler status=start trigger={trigger} date={date}");
        let result = catch_unwind(AssertUnwindSafe(|| match trigger {
            Trigger::Reminder => self.reminder.run_reminder_pass(date).map(|report| {
                format!("sent={} failed={}", report.sent.len(), report.failed.len())
            }),
            Trigger::Summary => self.summary.run_summary_pass(date).map(|outcome| {
                format!(
                    "missing={} purged={}",
                    outcome.missing().len(),
                    outcome.purged()
                )
            }),
        }));

        match result {
            Ok(Ok(summary)) => info!(
                "event=scheduler_fire module=scheduler status=ok trigger={trigger} date={date} {summary}"
            ),
            Ok(Err(err)) => error!(
                "event=scheduler_fire module=scheduler status=error trigger={trigger} date={date} error={err}"
            ),
            Err(_) => error!(
                "event=scheduler_fire module=scheduler status=error trigger={trigger} date={date} error_code=pass_panicked"
            ),
        }
    }
}

/// Handle to a running scheduler thread.
///
/// Dropping the handle stops the thread as well.
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<Scheduler>>,
}

impl SchedulerHandle {
    /// Signals the loop, waits for the current tick to finish and hands the
    /// scheduler back. Returns `None` if the thread panicked.
    pub fn stop(mut self) -> Option<Scheduler> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<Scheduler> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let joined = self.thread.take()?.join();
        if joined.is_err() {
            error!("event=scheduler_stop module=scheduler status=error error_code=thread_panicked");
        }
        joined.ok()
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
