use thiserror::Error;

/// Result type alias using OrmError
pub type Result<T> = std::result::Result<T, OrmError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, log aggregation and tests. Kinds are coarser than
/// [`OrmError`] variants only where variants carry different context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Storage
    /// A statement failed structurally against the live schema
    SchemaMismatch,

    // Lookup
    NotFound,
    LazyNotInitialized,
    UnknownAttribute,
    ValueTypeMismatch,

    // Service / registry misuse
    InvalidEntityForService,
    ServiceAlreadyRegistered,
    NoRegisteredEntity,
    SessionClosed,

    // Configuration
    InvalidConfig,

    /// A valid operation surface that is deliberately not implemented
    NotImplemented,
}

impl ErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::SchemaMismatch => "ERR_SCHEMA_MISMATCH",
            ErrorKind::NotFound => "ERR_NOT_FOUND",
            ErrorKind::LazyNotInitialized => "ERR_LAZY_NOT_INITIALIZED",
            ErrorKind::UnknownAttribute => "ERR_UNKNOWN_ATTRIBUTE",
            ErrorKind::ValueTypeMismatch => "ERR_VALUE_TYPE_MISMATCH",
            ErrorKind::InvalidEntityForService => "ERR_INVALID_ENTITY_FOR_SERVICE",
            ErrorKind::ServiceAlreadyRegistered => "ERR_SERVICE_ALREADY_REGISTERED",
            ErrorKind::NoRegisteredEntity => "ERR_NO_REGISTERED_ENTITY",
            ErrorKind::SessionClosed => "ERR_SESSION_CLOSED",
            ErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ErrorKind::NotImplemented => "ERR_NOT_IMPLEMENTED",
        }
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for entity cache, service and session operations
///
/// Every failure is surfaced to the caller as one of these variants; the
/// storage driver's own error type never crosses the executor boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrmError {
    /// A statement failed against the live schema (bad table, column or value)
    #[error("{type_name} has no matching schema: {detail}")]
    SchemaMismatch { type_name: String, detail: String },

    /// Point lookup returned no row, or the entity is flagged deleted
    #[error("There is no {type_name} by id {id}")]
    EntityNotFound { type_name: String, id: i64 },

    /// A lazy attribute or relationship was read before being initialized
    #[error("{attribute} is not initialized")]
    LazyFieldNotInitialized { attribute: String },

    /// The attribute is not declared on the entity type
    #[error("{type_name} has no attribute {attribute}")]
    UnknownAttribute { type_name: String, attribute: String },

    /// A stored value could not be converted to the requested Rust type
    #[error("Attribute {attribute} holds {found}, expected {expected}")]
    ValueTypeMismatch {
        attribute: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Runtime type of an entity does not match the service's bound type
    #[error("Service for {expected} cannot accept an entity of type {found}")]
    InvalidEntityForService { expected: String, found: String },

    /// A service is already registered for the type
    #[error("There is already a service for {type_name}")]
    ServiceAlreadyRegistered { type_name: String },

    /// No service has been registered for the type
    #[error("No registered entity named {type_name}")]
    NoRegisteredEntity { type_name: String },

    /// The owning session was dropped while a service handle was still alive
    #[error("Session owning the {type_name} service has been closed")]
    SessionClosed { type_name: String },

    /// Session configuration is invalid
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The operation is intentionally unsupported
    #[error("{operation} is not implemented")]
    NotImplemented { operation: String },
}

impl OrmError {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrmError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            OrmError::EntityNotFound { .. } => ErrorKind::NotFound,
            OrmError::LazyFieldNotInitialized { .. } => ErrorKind::LazyNotInitialized,
            OrmError::UnknownAttribute { .. } => ErrorKind::UnknownAttribute,
            OrmError::ValueTypeMismatch { .. } => ErrorKind::ValueTypeMismatch,
            OrmError::InvalidEntityForService { .. } => ErrorKind::InvalidEntityForService,
            OrmError::ServiceAlreadyRegistered { .. } => ErrorKind::ServiceAlreadyRegistered,
            OrmError::NoRegisteredEntity { .. } => ErrorKind::NoRegisteredEntity,
            OrmError::SessionClosed { .. } => ErrorKind::SessionClosed,
            OrmError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
            OrmError::NotImplemented { .. } => ErrorKind::NotImplemented,
        }
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    pub(crate) fn schema_mismatch(type_name: &str, detail: impl Into<String>) -> Self {
        OrmError::SchemaMismatch {
            type_name: type_name.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn not_found(type_name: &str, id: i64) -> Self {
        OrmError::EntityNotFound {
            type_name: type_name.to_string(),
            id,
        }
    }
}

/// Error raised by a storage driver
///
/// Drivers convert their native error into this message-bearing type. The
/// safe executor is the only consumer; it rewraps every `StorageError` as
/// [`OrmError::SchemaMismatch`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StorageError {
    message: String,
}

impl StorageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
