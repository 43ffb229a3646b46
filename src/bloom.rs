//! Standard Bloom filter implementation
//!
//! A space-efficient probabilistic data structure for membership testing.
//! The filter is generic over the element type and delegates bit-position
//! selection to its [`HashStrategy`] set.

use std::hash::Hash;

use bit_vec::BitVec;
use serde::Serialize;

use crate::hash::{default_strategies, HashStrategy};
use crate::{CobaltError, Result};

/// Bit count used by [`BloomFilter::default`].
pub const DEFAULT_BIT_COUNT: usize = 1000;

/// A standard Bloom filter
///
/// Adding an element sets one bit per strategy; a membership test reports
/// `true` only when every one of those bits is set. `false` means the
/// element was never added; `true` means it was probably added, with a
/// false-positive probability that rises with the load factor.
///
/// The filter does not synchronize: concurrent `contains` calls are fine,
/// but a `contains` racing an `add` may see a partially applied insertion,
/// and concurrent `add` calls need an external lock.
pub struct BloomFilter<E> {
    /// Bit array storing the filter data
    bits: BitVec,
    /// Hash strategies used for this filter, deduplicated by name
    strategies: Vec<Box<dyn HashStrategy<E>>>,
}

impl<E> BloomFilter<E>
where
    E: Serialize + Hash + 'static,
{
    /// Create a Bloom filter with the default strategy set
    ///
    /// Allocates `bit_count` zeroed bits and installs the four default
    /// strategies from [`default_strategies`].
    pub fn new(bit_count: usize) -> Result<Self> {
        Self::with_strategies(bit_count, default_strategies())
    }
}

impl<E> BloomFilter<E> {
    /// Create a Bloom filter with a caller-supplied strategy set
    ///
    /// The supplied collection becomes the active set, deduplicated by
    /// [`HashStrategy::name`] with the first occurrence winning. An empty
    /// collection is accepted here, but `add` and `contains` on the
    /// resulting filter fail with [`CobaltError::IllegalState`].
    pub fn with_strategies(
        bit_count: usize,
        strategies: Vec<Box<dyn HashStrategy<E>>>,
    ) -> Result<Self> {
        if bit_count == 0 {
            return Err(CobaltError::InvalidArgument(
                "Bit count must be > 0".to_string(),
            ));
        }

        let mut deduplicated: Vec<Box<dyn HashStrategy<E>>> = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            if !deduplicated.iter().any(|s| s.name() == strategy.name()) {
                deduplicated.push(strategy);
            }
        }

        Ok(BloomFilter {
            bits: BitVec::from_elem(bit_count, false),
            strategies: deduplicated,
        })
    }

    /// Add an element to the filter
    ///
    /// Sets one bit per strategy. Adding an element twice is a no-op for
    /// the second call: bits only ever transition from 0 to 1.
    pub fn add(&mut self, element: &E) -> Result<()> {
        self.check_strategies()?;
        let bit_count = self.bits.len() as u64;

        for strategy in &self.strategies {
            let position = checked_position(strategy.as_ref(), element, bit_count)?;
            // Strategies report 1-based positions.
            self.bits.set((position - 1) as usize, true);
        }

        Ok(())
    }

    /// Check if an element might be in the filter
    ///
    /// Returns false if the element is definitely not present; returns true
    /// if it might be present (false positives are possible).
    pub fn contains(&self, element: &E) -> Result<bool> {
        self.check_strategies()?;
        let bit_count = self.bits.len() as u64;

        for strategy in &self.strategies {
            let position = checked_position(strategy.as_ref(), element, bit_count)?;
            if !self.bits.get((position - 1) as usize).unwrap_or(false) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn check_strategies(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(CobaltError::IllegalState(
                "Filter has no hash strategies".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the number of bits in the filter
    pub fn bit_count(&self) -> usize {
        self.bits.len()
    }

    /// Get the number of strategies after deduplication
    pub fn num_strategies(&self) -> usize {
        self.strategies.len()
    }

    /// Get the names of the active strategies, in installation order
    pub fn strategy_names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Get the current load factor (fraction of bits set)
    pub fn load_factor(&self) -> f64 {
        let set_bits = self.bits.iter().filter(|&bit| bit).count();
        set_bits as f64 / self.bits.len() as f64
    }

    /// Get the estimated false positive rate at the current load
    pub fn estimated_fpr(&self) -> f64 {
        let load = self.load_factor();
        load.powi(self.strategies.len() as i32)
    }
}

impl<E> Default for BloomFilter<E>
where
    E: Serialize + Hash + 'static,
{
    /// A filter with [`DEFAULT_BIT_COUNT`] bits and the default strategies
    fn default() -> Self {
        // DEFAULT_BIT_COUNT is non-zero, so `new` cannot fail here.
        match Self::new(DEFAULT_BIT_COUNT) {
            Ok(filter) => filter,
            Err(_) => unreachable!("default bit count is non-zero"),
        }
    }
}

impl<E> std::fmt::Debug for BloomFilter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("bit_count", &self.bits.len())
            .field("strategies", &self.strategy_names())
            .field("load_factor", &self.load_factor())
            .finish()
    }
}

/// Run a strategy and enforce its `[1, range]` contract.
fn checked_position<E>(
    strategy: &dyn HashStrategy<E>,
    element: &E,
    range: u64,
) -> Result<u64> {
    let position = strategy.hash(element, range)?;
    if position == 0 || position > range {
        return Err(CobaltError::HashStrategy(format!(
            "strategy {} returned {} outside [1, {}]",
            strategy.name(),
            position,
            range
        )));
    }
    Ok(position)
}
