//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the attendance data access contract.
//! - Isolate SQLite query details from engines and services.

pub mod attendance_repo;
