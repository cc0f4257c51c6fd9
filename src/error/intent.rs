use thiserror::Error;

/// Local validation failures of user operation intents.
///
/// These are programmer errors and are never retryable.
#[derive(Debug, Error)]
pub enum IntentError {
    /// No intents were given.
    #[error("at least one intent is required")]
    Empty,
    /// Too many intents in one bundle.
    #[error("too many intents: {count}, max {max}")]
    TooMany {
        /// Number of intents given.
        count: usize,
        /// Maximum allowed.
        max: usize,
    },
    /// An intent targets the zero address.
    #[error("intent {index} targets the zero address")]
    ZeroTarget {
        /// Position of the intent in the bundle.
        index: usize,
    },
    /// An intent carries more calldata than allowed.
    #[error("intent {index} calldata is {size} bytes, max {max}")]
    CalldataTooLarge {
        /// Position of the intent in the bundle.
        index: usize,
        /// Calldata size.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },
}
