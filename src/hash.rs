//! Hash strategies for Bloom filters
//!
//! Implements the default strategy family plus an adapter for closure-based
//! strategies. A strategy maps an element and a range upper bound to a bit
//! position in `[1, range]`.

use std::any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use fnv::FnvHasher;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::{CobaltError, Result};

/// Trait for hash strategies used in Bloom filters
///
/// Strategies must be deterministic: the same element and range always
/// yield the same value within one process run, and hashing one element
/// never changes the value computed for another.
pub trait HashStrategy<E>: Send + Sync {
    /// Hash an element into `[1, range]`. The range must be at least 1.
    fn hash(&self, element: &E, range: u64) -> Result<u64>;

    /// Get a name/identifier for this strategy
    ///
    /// The name is the strategy's identity: a filter deduplicates its
    /// strategy set by name, keeping the first occurrence.
    fn name(&self) -> String;
}

/// Derive the stable byte representation of an element.
///
/// Equal logical values encode to equal bytes, which is what the
/// byte-driven strategies ([`CarterWegmanHash`], [`LcgHash`]) hash over.
/// An encoding failure surfaces as [`CobaltError::Serialization`] instead
/// of feeding an invalid buffer into the hash arithmetic.
pub fn stable_bytes<E: Serialize + ?Sized>(element: &E) -> Result<Vec<u8>> {
    bincode::serialize(element).map_err(CobaltError::Serialization)
}

/// Hash a value with a fresh hasher of type `H`.
fn value_hash<E: Hash, H: Hasher + Default>(element: &E) -> u64 {
    let mut hasher = H::default();
    element.hash(&mut hasher);
    hasher.finish()
}

fn check_range(range: u64) -> Result<()> {
    if range == 0 {
        return Err(CobaltError::InvalidArgument(
            "hash range must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Seed for deriving the Carter-Wegman parameters.
const CARTER_WEGMAN_SEED: u64 = 89478583;

/// 35-bit prime modulus of the Carter-Wegman family.
const CARTER_WEGMAN_PRIME: u64 = 32416190071;

/// Carter-Wegman style universal hash: h(x) = ((a * x + b) mod P) mod range + 1
///
/// The element's byte representation is read as a large base-256 integer
/// `x`. The parameters `a` and `b` are drawn from a generator re-seeded
/// with [`CARTER_WEGMAN_SEED`] on every call, which is what makes the
/// strategy deterministic. Dominates the cost of the default set: it
/// serializes the element and folds every byte through a modular reduction.
#[derive(Debug, Clone, Copy, Default)]
pub struct CarterWegmanHash;

impl<E: Serialize> HashStrategy<E> for CarterWegmanHash {
    fn hash(&self, element: &E, range: u64) -> Result<u64> {
        check_range(range)?;
        let bytes = stable_bytes(element)?;

        let mut rng = StdRng::seed_from_u64(CARTER_WEGMAN_SEED);
        let a: u64 = rng.gen();
        let b: u64 = rng.gen();

        // Fold the bytes into `x mod P`; base-256 positional reduction keeps
        // the arithmetic inside u64 (P is 35 bits, so x * 256 + byte < 2^43).
        let mut x: u64 = 0;
        for &byte in &bytes {
            x = (x * 256 + u64::from(byte)) % CARTER_WEGMAN_PRIME;
        }

        let product = u128::from(a % CARTER_WEGMAN_PRIME) * u128::from(x) + u128::from(b);
        let hashed = (product % u128::from(CARTER_WEGMAN_PRIME)) as u64;
        Ok(hashed % range + 1)
    }

    fn name(&self) -> String {
        "carter-wegman".to_string()
    }
}

/// General-purpose value-hash wrapper: h(x) = hash(x) mod range + 1
///
/// Runs the element through a fresh hasher of type `H` and reduces the
/// result into `[1, range]`. Simple and fast, but the quality of the bit
/// positions depends entirely on `H`; FNV, the default, may cluster for
/// related values. Any `Hasher + Default` type plugs in, e.g.
/// `std::collections::hash_map::DefaultHasher`.
pub struct ObjectHash<H = FnvHasher> {
    hasher: PhantomData<fn() -> H>,
}

impl<H> ObjectHash<H> {
    /// Create a value-hash strategy over the hasher type `H`
    pub fn new() -> Self {
        ObjectHash {
            hasher: PhantomData,
        }
    }
}

impl<H> Default for ObjectHash<H> {
    fn default() -> Self {
        ObjectHash::new()
    }
}

impl<H> Clone for ObjectHash<H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for ObjectHash<H> {}

impl<H> fmt::Debug for ObjectHash<H> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectHash<{}>", any::type_name::<H>())
    }
}

impl<E: Hash, H: Hasher + Default> HashStrategy<E> for ObjectHash<H> {
    fn hash(&self, element: &E, range: u64) -> Result<u64> {
        check_range(range)?;
        Ok(value_hash::<E, H>(element) % range + 1)
    }

    fn name(&self) -> String {
        format!("object-{}", any::type_name::<H>())
    }
}

const FNV_PRIME: u64 = 16777619;
const FNV_OFFSET_BASIS: u64 = 2166136261;

const LCG_MULTIPLIER: u64 = 0x5DEECE66D;
const LCG_ADDEND: u64 = 0xB;
const LCG_MASK: u64 = (1 << 48) - 1;

/// Seed substituted when the folded hash is `i32::MIN`, whose absolute
/// value does not fit in an `i32`.
const ABS_FALLBACK: i32 = 42;

/// FNV/LCG hybrid hash over the element's byte representation.
///
/// A 32-bit FNV-1 style fold of the bytes seeds one 48-bit linear
/// congruential step; the top 30 bits of the state pick the position.
#[derive(Debug, Clone, Copy, Default)]
pub struct LcgHash;

impl<E: Serialize> HashStrategy<E> for LcgHash {
    fn hash(&self, element: &E, range: u64) -> Result<u64> {
        check_range(range)?;
        let bytes = stable_bytes(element)?;

        let mut reduced = fold_bytes(&bytes).wrapping_abs();
        if reduced == i32::MIN {
            reduced = ABS_FALLBACK;
        }

        let state = (reduced as u64)
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_ADDEND)
            & LCG_MASK;
        Ok((state >> 18) % range + 1)
    }

    fn name(&self) -> String {
        "lcg".to_string()
    }
}

/// FNV-1 style fold of a byte slice: multiply, mask to 32 bits, xor the
/// byte in. Returns the truncated 32-bit state.
fn fold_bytes(bytes: &[u8]) -> i32 {
    let mut state = FNV_OFFSET_BASIS;
    for &byte in bytes {
        state = (state * FNV_PRIME) & 0xFFFF_FFFF;
        state ^= u64::from(byte);
    }
    state as u32 as i32
}

/// Adapter turning a closure into a [`HashStrategy`].
///
/// The lightweight way to define one-off strategies: a constant-output
/// strategy in a collision test, or an extra position function layered on
/// top of the defaults. The closure owns the whole `[1, range]` contract;
/// the filter rejects out-of-range results at use time.
pub struct FnStrategy<E> {
    name: String,
    func: Box<dyn Fn(&E, u64) -> Result<u64> + Send + Sync>,
}

impl<E> FnStrategy<E> {
    /// Wrap a closure under the given strategy name
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&E, u64) -> Result<u64> + Send + Sync + 'static,
    {
        FnStrategy {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl<E> fmt::Debug for FnStrategy<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FnStrategy").field("name", &self.name).finish()
    }
}

impl<E> HashStrategy<E> for FnStrategy<E> {
    fn hash(&self, element: &E, range: u64) -> Result<u64> {
        (self.func)(element, range)
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

/// Create the default strategy set: the Carter-Wegman universal hash, the
/// FNV value-hash wrapper, an inline duplicate of that wrapper, and the
/// FNV/LCG hybrid.
///
/// Four strategies ship, but the `"object-inline"` entry computes the same
/// positions as the [`ObjectHash`] entry, so the set carries three
/// independent position functions and the false-positive rate is that of
/// k = 3. The duplicate is kept deliberately to preserve the observable
/// behavior of filters built with the historical default set; drop it with
/// [`BloomFilter::with_strategies`](crate::BloomFilter::with_strategies) if
/// three entries are preferred.
pub fn default_strategies<E>() -> Vec<Box<dyn HashStrategy<E>>>
where
    E: Serialize + Hash + 'static,
{
    vec![
        Box::new(CarterWegmanHash),
        Box::new(ObjectHash::<FnvHasher>::new()),
        Box::new(FnStrategy::new("object-inline", |element: &E, range: u64| {
            check_range(range)?;
            Ok(value_hash::<E, FnvHasher>(element) % range + 1)
        })),
        Box::new(LcgHash),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    #[test]
    fn test_equal_elements_hash_equal() {
        let strategy = CarterWegmanHash;
        let first = strategy.hash(&"String to be hashed", 1000).unwrap();
        let second = strategy.hash(&"String to be hashed".to_string().as_str(), 1000).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_strategies_are_repeatable() {
        for strategy in default_strategies::<&str>() {
            let first = strategy.hash(&"String to be hashed", 1000).unwrap();
            for _ in 0..10 {
                assert_eq!(
                    strategy.hash(&"String to be hashed", 1000).unwrap(),
                    first,
                    "strategy {} is not repeatable",
                    strategy.name()
                );
            }
        }
    }

    #[test]
    fn test_strategies_stay_in_range() {
        let elements = ["", "a", "String to be hashed", "another string"];
        for strategy in default_strategies::<&str>() {
            for element in &elements {
                for range in [1, 2, 3, 10, 1000, 1_000_000] {
                    let hashed = strategy.hash(element, range).unwrap();
                    assert!(
                        (1..=range).contains(&hashed),
                        "strategy {} returned {} for range {}",
                        strategy.name(),
                        hashed,
                        range
                    );
                }
            }
        }
    }

    #[test]
    fn test_strategies_do_not_interfere() {
        for strategy in default_strategies::<&str>() {
            let first = strategy.hash(&"first string", 1000).unwrap();
            let second = strategy.hash(&"second string", 1000).unwrap();

            assert_eq!(strategy.hash(&"first string", 1000).unwrap(), first);
            assert_eq!(strategy.hash(&"second string", 1000).unwrap(), second);
        }
    }

    #[test]
    fn test_strategy_diversity() {
        let values: Vec<u64> = default_strategies::<&str>()
            .iter()
            .map(|s| s.hash(&"diversity probe", 1_000_000).unwrap())
            .collect();

        let unique: std::collections::HashSet<_> = values.iter().collect();
        assert!(unique.len() > 1, "all strategies agreed: {:?}", values);
    }

    #[test]
    fn test_inline_duplicate_matches_object_hash() {
        let strategies = default_strategies::<&str>();
        let object = strategies
            .iter()
            .find(|s| s.name().starts_with("object-fnv"))
            .unwrap();
        let inline = strategies
            .iter()
            .find(|s| s.name() == "object-inline")
            .unwrap();

        for element in ["", "data", "other data", "String to be hashed"] {
            for range in [1, 7, 1000] {
                assert_eq!(
                    object.hash(&element, range).unwrap(),
                    inline.hash(&element, range).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_object_hash_hasher_is_pluggable() {
        let fnv: Box<dyn HashStrategy<&str>> = Box::new(ObjectHash::<FnvHasher>::new());
        let sip: Box<dyn HashStrategy<&str>> = Box::new(ObjectHash::<DefaultHasher>::new());

        assert_ne!(fnv.name(), sip.name());

        let disagreements = ["alpha", "beta", "gamma", "delta"]
            .iter()
            .copied()
            .filter(|element| {
                fnv.hash(element, 1_000_000).unwrap() != sip.hash(element, 1_000_000).unwrap()
            })
            .count();
        assert!(disagreements > 0);
    }

    #[test]
    fn test_zero_range_is_rejected() {
        let strategies = default_strategies::<&str>();
        for strategy in &strategies {
            let err = strategy.hash(&"anything", 0).unwrap_err();
            assert!(
                matches!(err, CobaltError::InvalidArgument(_)),
                "strategy {} accepted a zero range",
                strategy.name()
            );
        }
    }

    #[test]
    fn test_stable_bytes_tracks_value_equality() {
        assert_eq!(
            stable_bytes(&"data").unwrap(),
            stable_bytes(&"data".to_string().as_str()).unwrap()
        );
        assert_ne!(stable_bytes(&"data").unwrap(), stable_bytes(&"other data").unwrap());
    }

    #[test]
    fn test_serialization_failure_surfaces() {
        #[derive(Hash)]
        struct Opaque;

        impl Serialize for Opaque {
            fn serialize<S>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                use serde::ser::Error;
                Err(S::Error::custom("no byte representation"))
            }
        }

        let err = CarterWegmanHash.hash(&Opaque, 1000).unwrap_err();
        assert!(matches!(err, CobaltError::Serialization(_)));

        let err = LcgHash.hash(&Opaque, 1000).unwrap_err();
        assert!(matches!(err, CobaltError::Serialization(_)));
    }

    #[test]
    fn test_fn_strategy_controls_its_output() {
        let always_five = FnStrategy::new("always-five", |_: &&str, _| Ok(5));

        assert_eq!(always_five.name(), "always-five");
        assert_eq!(always_five.hash(&"anything", 10).unwrap(), 5);
        assert_eq!(always_five.hash(&"something else", 10).unwrap(), 5);
    }

    #[test]
    fn test_fold_bytes_masks_to_32_bits() {
        // One step from the offset basis: (basis * prime) & 0xFFFFFFFF ^ byte.
        let expected = ((FNV_OFFSET_BASIS * FNV_PRIME) & 0xFFFF_FFFF) ^ 0x61;
        assert_eq!(fold_bytes(b"a"), expected as u32 as i32);
        assert_eq!(fold_bytes(b""), FNV_OFFSET_BASIS as u32 as i32);
    }
}
