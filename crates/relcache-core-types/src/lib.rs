//! Core types shared across relcache crates
//!
//! This crate provides the leaf types used by the engine's error and
//! logging facilities:
//!
//! - **Correlation types**: `SessionId` tagging every log record of a unit of work
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::SessionId;
