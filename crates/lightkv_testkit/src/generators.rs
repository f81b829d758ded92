//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use lightkv_core::{Comparator, MAX_KEY_SIZE};
use proptest::prelude::*;

/// Strategy for generating valid keys: non-empty and within the size limit.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=64usize.min(MAX_KEY_SIZE))
}

/// Strategy for generating keys from a small alphabet, so operations
/// collide on the same keys often.
pub fn dense_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(b'a'..=b'd', 1..4)
}

/// Strategy for generating values (arbitrary bytes, possibly empty).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..256)
}

/// Strategy for generating valid named database names.
pub fn db_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for picking one of the built-in comparators.
pub fn comparator_strategy() -> impl Strategy<Value = Comparator> {
    prop::sample::select(Comparator::ALL.to_vec())
}

/// A single key/value operation against one database.
#[derive(Debug, Clone)]
pub enum KvOperation {
    /// Store a value
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Delete a key
    Delete {
        /// Key
        key: Vec<u8>,
    },
    /// Read a key
    Get {
        /// Key
        key: Vec<u8>,
    },
}

/// Strategy for generating key/value operations over a dense key space.
pub fn kv_operation_strategy() -> impl Strategy<Value = KvOperation> {
    prop_oneof![
        3 => (dense_key_strategy(), value_strategy())
            .prop_map(|(key, value)| KvOperation::Put { key, value }),
        1 => dense_key_strategy().prop_map(|key| KvOperation::Delete { key }),
        2 => dense_key_strategy().prop_map(|key| KvOperation::Get { key }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<KvOperation>> {
    prop::collection::vec(kv_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_are_storable(key in key_strategy()) {
            prop_assert!(!key.is_empty());
            prop_assert!(key.len() <= MAX_KEY_SIZE);
        }

        #[test]
        fn db_name_is_valid(name in db_name_strategy()) {
            let first = name.chars().next();
            prop_assert!(first.map_or(false, |c| c.is_ascii_lowercase()));
        }

        #[test]
        fn operation_sequences_respect_bounds(ops in operation_sequence_strategy(1, 20)) {
            prop_assert!(!ops.is_empty());
            prop_assert!(ops.len() < 20);
        }
    }
}
