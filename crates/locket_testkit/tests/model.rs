//! Every engine agrees with an ordered-map model on point reads and range
//! scans in both directions.

use locket_db::{prefix_successor, Db, Engine, PrefixDb};
use locket_testkit::fixtures::scenarios::scan_keys;
use locket_testkit::{
    apply_all, assert_matches_model, ops_strategy, prefix_strategy, range_strategy, Model, ModelOp,
    TestStore,
};
use proptest::prelude::*;
use std::sync::Arc;

fn check_engine(
    engine: Engine,
    prefixed: bool,
    ops: &[ModelOp],
    ranges: &[(Option<Vec<u8>>, Option<Vec<u8>>)],
) {
    let store = if prefixed {
        TestStore::prefixed(engine)
    } else {
        TestStore::open(engine)
    };
    let mut model = Model::new();
    apply_all(store.db(), &mut model, ops);
    for (start, end) in ranges {
        assert_matches_model(store.db(), &model, start.as_deref(), end.as_deref());
    }
    store.assert_neighbors_intact();
}

macro_rules! model_suite {
    ($($module:ident => $engine:expr, $cases:expr);* $(;)?) => {
        $(
            mod $module {
                use super::*;

                proptest! {
                    #![proptest_config(ProptestConfig::with_cases($cases))]

                    #[test]
                    fn matches_model(
                        ops in ops_strategy(40),
                        ranges in prop::collection::vec(range_strategy(), 1..4),
                    ) {
                        check_engine($engine, false, &ops, &ranges);
                    }

                    #[test]
                    fn prefixed_matches_model(
                        ops in ops_strategy(40),
                        ranges in prop::collection::vec(range_strategy(), 1..4),
                    ) {
                        check_engine($engine, true, &ops, &ranges);
                    }
                }
            }
        )*
    };
}

model_suite!(
    memdb => Engine::MemDb, 128;
    redb => Engine::Redb, 24;
    sled => Engine::Sled, 24;
);

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A namespace sees exactly the physical keys that start with its prefix.
    /// A key equal to the prefix shows up as the empty logical key.
    #[test]
    fn namespace_sees_exactly_its_keys(
        prefix in prefix_strategy(),
        physical in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..6), 0..24),
    ) {
        let store = TestStore::memory();
        let shared = store.shared();
        for key in &physical {
            shared.set(key, b"x").unwrap();
        }
        let ns = PrefixDb::new(Arc::clone(&shared), prefix.clone());

        let mut expected: Vec<Vec<u8>> = physical
            .iter()
            .filter(|k| k.starts_with(&prefix))
            .map(|k| k[prefix.len()..].to_vec())
            .collect();
        expected.sort();
        expected.dedup();

        prop_assert_eq!(scan_keys(&ns, None, None, false), expected.clone());
        expected.reverse();
        prop_assert_eq!(scan_keys(&ns, None, None, true), expected);
    }

    /// Everything at or past the successor lies outside the namespace.
    #[test]
    fn successor_excludes_outside_keys(
        prefix in prefix_strategy(),
        key in prop::collection::vec(any::<u8>(), 1..8),
    ) {
        match prefix_successor(&prefix) {
            Some(next) => {
                let inside = key.starts_with(&prefix);
                let below_next = key.as_slice() < next.as_slice();
                let at_or_above = key.as_slice() >= prefix.as_slice();
                prop_assert_eq!(inside, at_or_above && below_next);
            }
            None => prop_assert!(prefix.iter().all(|&b| b == 0xFF)),
        }
    }
}

#[test]
fn shared_engine_holds_both_namespaces() {
    let store = TestStore::open(Engine::MemDb);
    let shared: Arc<dyn Db> = store.shared();
    let left = PrefixDb::new(Arc::clone(&shared), b"l".to_vec());
    let right = PrefixDb::new(Arc::clone(&shared), b"r".to_vec());
    let mut left_model = Model::new();
    let mut right_model = Model::new();

    let ops = vec![
        ModelOp::Set { key: b"a".to_vec(), value: b"1".to_vec() },
        ModelOp::Batch { ops: vec![(b"b".to_vec(), Some(Vec::new())), (b"a".to_vec(), None)] },
    ];
    apply_all(&left, &mut left_model, &ops);
    apply_all(&right, &mut right_model, &ops[..1]);

    assert_matches_model(&left, &left_model, None, None);
    assert_matches_model(&right, &right_model, None, None);
    assert_eq!(scan_keys(&*shared, None, None, false), vec![b"lb".to_vec(), b"ra".to_vec()]);
}
