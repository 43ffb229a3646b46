//! # Cobalt Bloom
//!
//! A classical Bloom filter with a pluggable family of hash strategies.
//! Adding an element runs it through every configured strategy and sets one
//! bit per strategy; a membership test reports `false` only when the element
//! was definitely never added. False positives are possible, false negatives
//! are not.
//!
//! The filter performs no internal synchronization. Concurrent `contains`
//! calls are safe with each other; a `contains` racing an `add` may observe
//! a partially applied insertion, and concurrent `add` calls require an
//! external lock around the filter.

pub mod bloom;
pub mod hash;

pub use bloom::{BloomFilter, DEFAULT_BIT_COUNT};
pub use hash::{CarterWegmanHash, FnStrategy, HashStrategy, LcgHash, ObjectHash};

/// Common error type for the library
#[derive(Debug)]
pub enum CobaltError {
    /// A construction parameter or hash range is out of range.
    InvalidArgument(String),
    /// An operation ran against a filter with an empty strategy set.
    IllegalState(String),
    /// An element could not be turned into its stable byte representation.
    Serialization(bincode::Error),
    /// A strategy returned a value outside its `[1, range]` contract.
    HashStrategy(String),
}

impl std::fmt::Display for CobaltError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CobaltError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CobaltError::IllegalState(msg) => write!(f, "Illegal state: {}", msg),
            CobaltError::Serialization(err) => write!(f, "Serialization failure: {}", err),
            CobaltError::HashStrategy(msg) => write!(f, "Hash strategy error: {}", msg),
        }
    }
}

impl std::error::Error for CobaltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CobaltError::Serialization(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CobaltError>;
