//! Property-based test generators using proptest.
//!
//! Keys are drawn from a small byte alphabet that includes `0x00` and `0xFF`,
//! so generated operations collide on keys and exercise range edges often.

use crate::model::ModelOp;
use proptest::prelude::*;

/// Bytes keys are built from.
pub const KEY_ALPHABET: &[u8] = &[0x00, 0x01, b'a', b'b', b'c', b'n', b's', b':', 0xFE, 0xFF];

/// Strategy for one key byte from [`KEY_ALPHABET`].
fn key_byte() -> impl Strategy<Value = u8> {
    prop::sample::select(KEY_ALPHABET)
}

/// Strategy for generating valid (non-empty) keys.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(key_byte(), 1..5)
}

/// Strategy for generating values, including empty ones.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

/// Strategy for prefixes, including all-`0xFF` ones that have no successor.
pub fn prefix_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 1..6),
        (1usize..4).prop_map(|len| vec![0xFF; len]),
        prop::collection::vec(key_byte(), 1..4),
    ]
}

/// Strategy for an optional range bound.
pub fn bound_strategy() -> impl Strategy<Value = Option<Vec<u8>>> {
    prop::option::of(key_strategy())
}

/// Strategy for a `(start, end)` range. Inverted ranges are included on
/// purpose; they must scan as empty.
pub fn range_strategy() -> impl Strategy<Value = (Option<Vec<u8>>, Option<Vec<u8>>)> {
    (bound_strategy(), bound_strategy())
}

/// Strategy for a single store mutation.
pub fn op_strategy() -> impl Strategy<Value = ModelOp> {
    prop_oneof![
        3 => (key_strategy(), value_strategy()).prop_map(|(key, value)| ModelOp::Set { key, value }),
        1 => key_strategy().prop_map(|key| ModelOp::Delete { key }),
        1 => prop::collection::vec(
            (key_strategy(), prop::option::of(value_strategy())),
            0..8,
        )
        .prop_map(|ops| ModelOp::Batch { ops }),
    ]
}

/// Strategy for a sequence of mutations.
pub fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<ModelOp>> {
    prop::collection::vec(op_strategy(), 0..max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn keys_are_never_empty(key in key_strategy()) {
            prop_assert!(!key.is_empty());
            prop_assert!(key.iter().all(|b| KEY_ALPHABET.contains(b)));
        }

        #[test]
        fn prefixes_are_never_empty(prefix in prefix_strategy()) {
            prop_assert!(!prefix.is_empty());
        }
    }
}
