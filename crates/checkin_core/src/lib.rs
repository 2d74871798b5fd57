//! Core of the daily check-in tracker.
//!
//! Decides who has checked in on a given day, reminds stragglers, sends the
//! daily digest and purges a day's evidence once its cycle closes. Transport,
//! HTTP and authentication layers live outside this crate and plug in through
//! the `AttendanceRepository`, `EvidenceBlobStore`, `NotificationGateway` and
//! `SettingsProvider` seams.

pub mod db;
pub mod evidence;
pub mod logging;
pub mod model;
pub mod notify;
pub mod repo;
pub mod scheduler;
pub mod service;
pub mod settings;

pub use evidence::fs_store::FsEvidenceStore;
pub use evidence::{BlobError, BlobResult, EvidenceBlobStore};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::person::Person;
pub use model::record::CheckInRecord;
pub use model::time_mark::{parse_time_mark, TimeMark, TimeMarkError};
pub use notify::{DispatchError, DispatchResult, LogOnlyGateway, NotificationGateway};
pub use repo::attendance_repo::{
    AttendanceRepository, RepoError, RepoResult, SqliteAttendanceRepository,
};
pub use scheduler::{
    Clock, DailyCycleState, FixedClock, LocalClock, Scheduler, SchedulerHandle, Trigger,
    DEFAULT_POLL_INTERVAL,
};
pub use service::checkin_service::{
    CheckInReceipt, CheckInService, CheckInStatus, CheckInSubmission, SubmissionError,
};
pub use service::reminder::{ReminderEngine, ReminderReport};
pub use service::summary::{PurgeError, PurgeResult, SummaryEngine, SummaryOutcome};
pub use settings::{ConfigError, JsonFileSettings, Settings, SettingsProvider, SharedSettings};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
