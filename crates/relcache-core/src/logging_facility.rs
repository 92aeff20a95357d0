//! Structured logging facility for relcache
//!
//! This module provides:
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! # Logging Ownership
//!
//! Session and service public operations own lifecycle logging and emit the
//! start/end/end_error triple. The cache and the safe executor only use
//! `tracing::debug!()` for internal details (hits, misses, evictions, SQL).
//!
//! # Usage
//!
//! ```rust
//! use relcache_core::logging_facility::{init, Profile};
//!
//! // Initialize once at application startup
//! init(Profile::Development);
//! ```

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
