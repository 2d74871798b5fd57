//! `checkin` operator entry point.
//!
//! # Responsibility
//! - Wire the core to the SQLite store, the filesystem evidence store, the
//!   JSON settings file and the log-only notification transport.
//! - Run the scheduler in the foreground or trigger single passes by hand.

use anyhow::{bail, Context, Result};
use checkin_core::model::parse_date_key;
use checkin_core::{
    core_version, default_log_level, init_logging, CheckInService, CheckInSubmission,
    FsEvidenceStore, JsonFileSettings, LocalClock, LogOnlyGateway, NotificationGateway,
    ReminderEngine, Scheduler, SqliteAttendanceRepository, SummaryEngine, SummaryOutcome,
    DEFAULT_POLL_INTERVAL,
};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::info;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "checkin", version, about = "Daily check-in tracker with reminders and digests")]
struct Cli {
    /// Settings file (roster, `mentionTime`, `checkInTime`).
    #[arg(long, env = "CHECKIN_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// SQLite database holding check-in records.
    #[arg(long, env = "CHECKIN_DB", default_value = "checkin.db")]
    db: PathBuf,

    /// Root directory for uploaded evidence.
    #[arg(long, env = "CHECKIN_UPLOADS", default_value = "uploads")]
    uploads: PathBuf,

    /// Directory for rotating log files; defaults to `<cwd>/logs`.
    #[arg(long, env = "CHECKIN_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "CHECKIN_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler until stdin closes or `quit` is entered.
    Run {
        /// Seconds between clock checks (at most 60).
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
        interval_secs: u64,
    },
    /// Print per-person compliance for a date.
    Status {
        /// YYYY-MM-DD, defaults to today.
        #[arg(long)]
        date: Option<String>,
    },
    /// Submit an image as today's proof for a roster member.
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        file: PathBuf,
        /// Defaults to a guess from the file extension.
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Run the individual reminder pass once.
    Remind {
        #[arg(long)]
        date: Option<String>,
    },
    /// Run the summary pass (digest and purge) once.
    Summary {
        #[arg(long)]
        date: Option<String>,
    },
    /// Print the configured roster.
    Roster,
}

struct App {
    settings: Arc<JsonFileSettings>,
    repo: Arc<SqliteAttendanceRepository>,
    evidence: Arc<FsEvidenceStore>,
    gateway: Arc<dyn NotificationGateway>,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let settings = JsonFileSettings::load(&cli.config)
            .with_context(|| format!("loading settings from {}", cli.config.display()))?;
        let repo = SqliteAttendanceRepository::open(&cli.db)
            .with_context(|| format!("opening database {}", cli.db.display()))?;
        let evidence = FsEvidenceStore::open(&cli.uploads)
            .with_context(|| format!("preparing uploads at {}", cli.uploads.display()))?;

        Ok(Self {
            settings: Arc::new(settings),
            repo: Arc::new(repo),
            evidence: Arc::new(evidence),
            gateway: Arc::new(LogOnlyGateway),
        })
    }

    fn service(&self) -> CheckInService {
        CheckInService::new(
            self.settings.clone(),
            self.repo.clone(),
            self.evidence.clone(),
        )
    }

    fn reminder(&self) -> ReminderEngine {
        ReminderEngine::new(
            self.settings.clone(),
            self.repo.clone(),
            self.gateway.clone(),
        )
    }

    fn summary(&self) -> SummaryEngine {
        SummaryEngine::new(
            self.settings.clone(),
            self.repo.clone(),
            self.gateway.clone(),
            self.evidence.clone(),
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    start_logging(&cli)?;
    let app = App::open(&cli)?;

    match &cli.command {
        Command::Run { interval_secs } => {
            run(&app, Duration::from_secs((*interval_secs).max(1)))
        }
        Command::Status { date } => {
            let date = resolve_date(date.as_deref())?;
            println!("date={date}");
            for status in app.service().status_for(date)? {
                let mark = if status.uploaded { "yes" } else { "no" };
                println!("{}\tuploaded={mark}", status.name);
            }
            Ok(())
        }
        Command::Submit {
            name,
            file,
            content_type,
        } => {
            let bytes =
                std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
            let content_type = content_type
                .clone()
                .unwrap_or_else(|| guess_content_type(file).to_string());
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            let receipt = app.service().submit(
                &CheckInSubmission {
                    name,
                    content_type: &content_type,
                    file_name,
                    bytes: &bytes,
                },
                Local::now().date_naive(),
            )?;
            println!(
                "recorded {} for {} at {}",
                receipt.name, receipt.date, receipt.evidence_location
            );
            Ok(())
        }
        Command::Remind { date } => {
            let report = app.reminder().run_reminder_pass(resolve_date(date.as_deref())?)?;
            println!(
                "sent={} failed={} skipped_no_email={} already_checked_in={}",
                report.sent.len(),
                report.failed.len(),
                report.skipped_no_email.len(),
                report.already_checked_in.len()
            );
            Ok(())
        }
        Command::Summary { date } => {
            let outcome = app.summary().run_summary_pass(resolve_date(date.as_deref())?)?;
            println!("{}", describe_outcome(&outcome));
            Ok(())
        }
        Command::Roster => {
            for person in app.service().roster() {
                println!(
                    "{}\t{}",
                    person.name,
                    person.reachable_email().unwrap_or("-")
                );
            }
            Ok(())
        }
    }
}

fn start_logging(cli: &Cli) -> Result<()> {
    let log_dir = match &cli.log_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => std::env::current_dir()?.join(dir),
        None => std::env::current_dir()?.join("logs"),
    };
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let echo_stderr = matches!(cli.command, Command::Run { .. });
    init_logging(level, &log_dir.to_string_lossy(), echo_stderr)?;
    Ok(())
}

fn run(app: &App, interval: Duration) -> Result<()> {
    let scheduler = Scheduler::new(
        app.settings.clone(),
        Arc::new(app.reminder()),
        Arc::new(app.summary()),
    );
    let handle = scheduler
        .start(LocalClock, interval)
        .context("spawning scheduler thread")?;
    info!(
        "event=cli_run module=cli status=ok core_version={} config={} uploads={}",
        core_version(),
        app.settings.path().display(),
        app.evidence.root().display()
    );

    for line in std::io::stdin().lock().lines() {
        if line?.trim().eq_ignore_ascii_case("quit") {
            break;
        }
    }

    if handle.stop().is_none() {
        bail!("scheduler thread panicked");
    }
    Ok(())
}

fn resolve_date(value: Option<&str>) -> Result<NaiveDate> {
    match value {
        None => Ok(Local::now().date_naive()),
        Some(text) => match parse_date_key(text) {
            Some(date) => Ok(date),
            None => bail!("invalid date `{text}`; expected YYYY-MM-DD"),
        },
    }
}

fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("jpg" | "jpeg") | None => "image/jpeg",
        Some(_) => "application/octet-stream",
    }
}

fn describe_outcome(outcome: &SummaryOutcome) -> String {
    match outcome {
        SummaryOutcome::FullyCompliant { purge } => {
            format!("fully compliant; purged={}", purge.is_ok())
        }
        SummaryOutcome::DigestSent {
            missing,
            recipients,
            purge,
        } => format!(
            "digest sent to {} recipients; missing={}; purged={}",
            recipients.len(),
            missing.join(","),
            purge.is_ok()
        ),
        SummaryOutcome::DispatchFailed { missing, error, .. } => format!(
            "digest failed ({error}); missing={}; evidence retained",
            missing.join(",")
        ),
        SummaryOutcome::NoRecipients { missing } => format!(
            "no recipients; missing={}; evidence retained",
            missing.join(",")
        ),
    }
}
