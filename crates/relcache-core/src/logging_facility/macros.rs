//! Canonical logging macros
//!
//! Every boundary operation emits a `start` event and exactly one of `end`
//! or `end_error`, all carrying `component` and `op`.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use relcache_core::log_op_start;
/// log_op_start!("by_id");
/// log_op_start!("by_id", entity_type = "Foo", entity_id = 3);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        $crate::__tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        $crate::__tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use relcache_core::log_op_end;
/// log_op_end!("flush", duration_ms = 4);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        $crate::__tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        $crate::__tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// The error expression must evaluate to a `&OrmError`.
///
/// # Example
///
/// ```
/// # use relcache_core::{log_op_error, OrmError};
/// let err = OrmError::NotImplemented { operation: "refresh".to_string() };
/// log_op_error!("refresh", &err, duration_ms = 0);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let err: &$crate::errors::OrmError = $err;
        $crate::__tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?err.kind(),
            err_code = err.code(),
            error = %err,
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let err: &$crate::errors::OrmError = $err;
        $crate::__tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?err.kind(),
            err_code = err.code(),
            error = %err,
            $($field)*
        );
    }};
}
