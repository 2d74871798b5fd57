//! Notification dispatch contract.
//!
//! # Responsibility
//! - Define the `send(recipients, subject, body)` capability used by engines.
//! - Provide message templates for reminders and daily digests.
//!
//! # Invariants
//! - A failed send is an observable `DispatchError`, never a panic.
//! - Engines never hold a store lock while a send is in flight.

pub mod templates;

use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type DispatchResult = Result<(), DispatchError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    NoRecipients,
    /// The transport accepted the connection but refused the message.
    Rejected(String),
    Transport(String),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecipients => write!(f, "message has no recipients"),
            Self::Rejected(reason) => write!(f, "message rejected: {reason}"),
            Self::Transport(reason) => write!(f, "transport failure: {reason}"),
        }
    }
}

impl Error for DispatchError {}

/// Outbound message capability (mail transport, chat webhook, ...).
pub trait NotificationGateway: Send + Sync {
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> DispatchResult;
}

/// Gateway used when no transport is configured.
///
/// Every message is logged and reported as delivered, so daily cycles keep
/// running (and purging) on hosts without mail credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyGateway;

impl NotificationGateway for LogOnlyGateway {
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> DispatchResult {
        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }
        info!(
            "event=notify_send module=notify status=skip reason=transport_unconfigured recipients={} subject={:?} body_chars={}",
            recipients.join(","),
            subject,
            body.chars().count()
        );
        Ok(())
    }
}
