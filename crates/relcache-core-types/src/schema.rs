//! Canonical schema constants for structured logging
//!
//! These constants keep field keys and event names consistent between the
//! logging macros, the cache internals and the test capture layer.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_SESSION_ID: &str = "session_id";

// Entity identifiers
pub const FIELD_ENTITY_TYPE: &str = "entity_type";
pub const FIELD_ENTITY_ID: &str = "entity_id";

// Cache bookkeeping
pub const FIELD_CACHE_LEN: &str = "cache_len";
pub const FIELD_BATCH_LEN: &str = "batch_len";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
