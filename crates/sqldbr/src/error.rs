//! Error types for sqldbr

use thiserror::Error;

/// Result type alias for sqldbr operations
pub type DbrResult<T> = Result<T, DbrError>;

/// Boxed error type used for executor (driver) failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The abstract kind of a [`DbrError`], stable across any number of context layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Empty,
    Mismatch,
    NotAllowed,
    NotFound,
    Fatal,
    NotValid,
    OutOfRange,
    Cancelled,
    Driver,
}

/// Error types for statement building, binding and execution
#[derive(Debug, Error)]
pub enum DbrError {
    /// A required clause, body or cached SQL string is missing
    #[error("Empty: {0}")]
    Empty(String),

    /// Two lists which must line up do not (aliases, placeholders, columns)
    #[error("Mismatch: {0}")]
    Mismatch(String),

    /// The requested combination of options is not supported
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    /// A row, column or named argument could not be found
    #[error("Not found: {0}")]
    NotFound(String),

    /// An unsupported combination which indicates a programming error
    #[error("Fatal: {0}")]
    Fatal(String),

    /// A value failed validation
    #[error("Not valid: {0}")]
    NotValid(String),

    /// A numeric parameter is outside its accepted range
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// The operation was cancelled or its deadline elapsed
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Error reported by the executor
    #[error("Driver error: {0}")]
    Driver(#[source] BoxError),

    /// Any error wrapped with the statement id, SQL text or column which caused it
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<DbrError>,
    },
}

impl DbrError {
    /// Create an empty error
    pub fn empty(message: impl Into<String>) -> Self {
        Self::Empty(message.into())
    }

    /// Create a mismatch error
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::Mismatch(message.into())
    }

    /// Create a not-allowed error
    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::NotAllowed(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a fatal error
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }

    /// Create a not-valid error
    pub fn not_valid(message: impl Into<String>) -> Self {
        Self::NotValid(message.into())
    }

    /// Create an out-of-range error
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange(message.into())
    }

    /// Create a cancellation error
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    /// Wrap an executor error, keeping it reachable through `source()`.
    pub fn driver<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Driver(err.into())
    }

    /// Wrap this error with additional context.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The kind of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty(_) => ErrorKind::Empty,
            Self::Mismatch(_) => ErrorKind::Mismatch,
            Self::NotAllowed(_) => ErrorKind::NotAllowed,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Fatal(_) => ErrorKind::Fatal,
            Self::NotValid(_) => ErrorKind::NotValid,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Driver(_) => ErrorKind::Driver,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &DbrError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// An owned copy with the same kind. Context layers are folded into the
    /// message and driver errors keep only their text.
    pub(crate) fn detached(&self) -> DbrError {
        let message = self.to_string();
        match self.root() {
            Self::Empty(_) => Self::Empty(message),
            Self::Mismatch(_) => Self::Mismatch(message),
            Self::NotAllowed(_) => Self::NotAllowed(message),
            Self::NotFound(_) => Self::NotFound(message),
            Self::Fatal(_) => Self::Fatal(message),
            Self::NotValid(_) => Self::NotValid(message),
            Self::OutOfRange(_) => Self::OutOfRange(message),
            Self::Cancelled(_) => Self::Cancelled(message),
            Self::Driver(_) | Self::Context { .. } => Self::Driver(message.into()),
        }
    }

    /// Check if this is an empty error
    pub fn is_empty(&self) -> bool {
        self.kind() == ErrorKind::Empty
    }

    /// Check if this is a mismatch error
    pub fn is_mismatch(&self) -> bool {
        self.kind() == ErrorKind::Mismatch
    }

    /// Check if this is a not-allowed error
    pub fn is_not_allowed(&self) -> bool {
        self.kind() == ErrorKind::NotAllowed
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    /// Check if this is a not-valid error
    pub fn is_not_valid(&self) -> bool {
        self.kind() == ErrorKind::NotValid
    }

    /// Check if this is an out-of-range error
    pub fn is_out_of_range(&self) -> bool {
        self.kind() == ErrorKind::OutOfRange
    }

    /// Check if this is a cancellation error
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Check if this is an executor error
    pub fn is_driver(&self) -> bool {
        self.kind() == ErrorKind::Driver
    }

    /// Downcast the wrapped executor error, looking through context layers.
    pub fn driver_error<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self.root() {
            Self::Driver(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Extension for attaching context to results.
pub trait ResultExt<T> {
    /// Wrap the error, if any, with the context produced by `f`.
    fn with_context<F, S>(self, f: F) -> DbrResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for DbrResult<T> {
    fn with_context<F, S>(self, f: F) -> DbrResult<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}
