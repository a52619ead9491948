//! Error types for the streaming runtime

/// Error type for stream-attribute negotiation
///
/// Raised during the setup pass that flows [`StreamAttributes`] through a
/// pipeline. Each variant carries the identity of the module that detected
/// the problem so a host can diagnose a deep graph without inspecting it.
///
/// [`StreamAttributes`]: super::stream::StreamAttributes
#[derive(Debug, Clone, thiserror::Error)]
pub enum NegotiateError {
    #[error("module '{module}' rejected stream format: {field}: {reason}")]
    FormatRejected {
        module: String,
        field: &'static str,
        reason: String,
    },

    #[error(
        "parallel branches disagree on {field}: '{left_module}' produces {left_value}, '{right_module}' produces {right_value}"
    )]
    RateMismatch {
        field: &'static str,
        left_module: String,
        left_value: String,
        right_module: String,
        right_value: String,
    },
}

impl NegotiateError {
    /// Shorthand for a format rejection with the standard context fields.
    pub fn rejected(
        module: impl Into<String>,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        NegotiateError::FormatRejected {
            module: module.into(),
            field,
            reason: reason.into(),
        }
    }
}

/// Error type for attribute access
///
/// Every way a `set` can be invalid gets its own variant; a failed set
/// leaves the previous value untouched.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AttrError {
    #[error("attribute '{path}' not found")]
    Unknown { path: String },

    #[error("attribute '{name}' expects {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("attribute '{name}': value {value} outside range [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("attribute '{name}': '{value}' is not one of [{allowed}]")]
    NotInEnum {
        name: String,
        value: String,
        allowed: String,
    },

    #[error("attribute '{name}': length {len} exceeds maximum {max}")]
    LengthExceeded { name: String, len: usize, max: usize },

    #[error("attribute '{name}': length {len} does not match fixed size {expected}")]
    LengthMismatch {
        name: String,
        len: usize,
        expected: usize,
    },
}

/// Error type for frame delivery
///
/// Any of these is fatal to the current stream run: the pipeline must be
/// reset and renegotiated before frames flow again.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliverError {
    #[error(
        "parallel branch '{module}' emitted {produced} frames where its peers emitted {expected}"
    )]
    FanoutDesync {
        module: String,
        produced: usize,
        expected: usize,
    },

    #[error("ring buffer underrun: requested {requested} elements, {available} available")]
    Underrun { requested: usize, available: usize },

    #[error("stream attributes not negotiated; call negotiate() before streaming")]
    NotNegotiated,

    #[error("frame batch length {got} does not match negotiated shape ({expected} values)")]
    BadBatch { expected: usize, got: usize },

    #[error("batch of {count} frames exceeds the negotiated max_block of {max_block}")]
    BlockTooLarge { max_block: usize, count: usize },
}

/// Result type for frame delivery and finalization
pub type DeliverResult<T = ()> = Result<T, DeliverError>;
