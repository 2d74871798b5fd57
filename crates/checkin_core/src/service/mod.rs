//! Core use-case services.
//!
//! # Responsibility
//! - `checkin_service`: accept proof submissions and report per-date status.
//! - `reminder`: individual reminders for people missing a check-in.
//! - `summary`: roster-wide digest followed by conditional evidence purge.
//!
//! # Invariants
//! - Each pass reads exactly one settings snapshot at its start.
//! - Store reads finish before any notification is sent.

pub mod checkin_service;
pub mod reminder;
pub mod summary;
