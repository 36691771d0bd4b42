//! # Key Ordering Tests
//!
//! The key codec promises that comparing encoded keys bytewise gives the same
//! answer as comparing the decoded keys. These tests check that promise on a
//! hand-picked ladder of keys and on generated tuples.

use std::cmp::Ordering;

use maho::encoding::key::{
    format_key, make_key, make_key_with_type, make_proposal_key, make_proposed_write_key,
    make_transaction_key, make_version_key, next_key, parse_key, Key, KeyType,
};
use maho::Value;
use proptest::prelude::*;

fn ladder() -> Vec<Vec<u8>> {
    let one = [Value::Int(1)];
    vec![
        make_key(4096, 0, &[]),
        make_key(4096, 0, &[Value::Null]),
        make_key(4096, 0, &[Value::Null, Value::Int(-1)]),
        make_key(4096, 0, &[Value::Bool(false)]),
        make_key(4096, 0, &[Value::Bool(true)]),
        make_key(4096, 0, &[Value::from("")]),
        make_key(4096, 0, &[Value::from("\u{0}")]),
        make_key(4096, 0, &[Value::from("apple")]),
        make_key(4096, 0, &[Value::from("apple"), Value::Int(0)]),
        make_key(4096, 0, &[Value::from("apples")]),
        make_key(4096, 0, &[Value::Blob(vec![])]),
        make_key(4096, 0, &[Value::Blob(vec![0xFF, 0xFF])]),
        make_key(4096, 0, &[Value::Float(f64::NAN)]),
        make_key(4096, 0, &[Value::Float(-1.5)]),
        make_key(4096, 0, &[Value::Float(0.0)]),
        make_key(4096, 0, &[Value::Float(1.5)]),
        make_key(4096, 0, &[Value::Int(i64::MIN)]),
        make_key(4096, 0, &[Value::Int(0)]),
        make_key(4096, 0, &one),
        make_proposal_key(4096, 0, &one),
        make_proposed_write_key(4096, 0, &one, 9),
        make_proposed_write_key(4096, 0, &one, 2),
        make_version_key(4096, 0, &one, 300),
        make_version_key(4096, 0, &one, 20),
        make_transaction_key(4096, 0, &one, 1),
        make_key(4096, 0, &[Value::Int(1), Value::Null]),
        make_key(4096, 0, &[Value::Int(2)]),
        make_key(4096, 1, &[]),
        make_key(4097, 0, &[]),
    ]
}

#[test]
fn ladder_is_strictly_ascending() {
    let keys = ladder();
    for pair in keys.windows(2) {
        assert!(
            pair[0] < pair[1],
            "{} should sort before {}",
            format_key(&pair[0]),
            format_key(&pair[1])
        );
    }
}

#[test]
fn decoded_compare_agrees_with_bytes() {
    let keys = ladder();
    let decoded: Vec<Key> = keys.iter().map(|k| parse_key(k).unwrap()).collect();
    for (i, a) in decoded.iter().enumerate() {
        for (j, b) in decoded.iter().enumerate() {
            assert_eq!(
                a.compare(b),
                keys[i].cmp(&keys[j]),
                "{} vs {}",
                format_key(&keys[i]),
                format_key(&keys[j])
            );
        }
    }
}

#[test]
fn next_key_bounds_every_extension() {
    let base = make_key(4096, 0, &[Value::from("k")]);
    let bound = next_key(&base);
    let extensions = [
        make_proposal_key(4096, 0, &[Value::from("k")]),
        make_version_key(4096, 0, &[Value::from("k")], 0),
        make_transaction_key(4096, 0, &[Value::from("k")], u32::MAX),
        make_key(4096, 0, &[Value::from("k"), Value::Int(i64::MAX)]),
        make_key(4096, 0, &[Value::from("k"), Value::Blob(vec![0xFF; 8])]),
    ];
    for ext in &extensions {
        assert!(base < *ext && *ext < bound, "{} escapes bound", format_key(ext));
    }
    assert!(bound < make_key(4096, 0, &[Value::from("k\u{0}")]));
}

#[test]
fn version_key_renders_like_docs() {
    let key = make_version_key(4096, 1, &[Value::Int(7)], 20);
    assert_eq!(format_key(&key), "/4096/1/7@v(20)");
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<f64>().prop_map(Value::Float),
        prop::collection::vec(prop::sample::select(vec!['\u{0}', '\u{1}', 'a', 'b', 'é']), 0..4)
            .prop_map(|chars| Value::Text(chars.into_iter().collect())),
        prop::collection::vec(prop_oneof![Just(0u8), Just(1u8), Just(0xFFu8), any::<u8>()], 0..4)
            .prop_map(Value::Blob),
    ]
}

fn key_type_strategy() -> impl Strategy<Value = KeyType> {
    prop_oneof![
        Just(KeyType::Bare),
        Just(KeyType::Proposal),
        any::<u32>().prop_map(KeyType::ProposedWrite),
        any::<u64>().prop_map(KeyType::Version),
        any::<u32>().prop_map(KeyType::Transaction),
    ]
}

fn key_strategy() -> impl Strategy<Value = Key> {
    (
        0u32..3,
        0u32..2,
        prop::collection::vec(value_strategy(), 0..3),
        key_type_strategy(),
    )
        .prop_map(|(table, index, values, key_type)| Key::new(table, index, values, key_type))
}

proptest! {
    #[test]
    fn byte_order_matches_key_order(a in key_strategy(), b in key_strategy()) {
        let ea = a.encode();
        let eb = b.encode();
        prop_assert_eq!(ea.cmp(&eb), a.compare(&b));
        if ea.cmp(&eb) == Ordering::Equal {
            prop_assert_eq!(b.compare(&a), Ordering::Equal);
        }
    }

    #[test]
    fn parse_inverts_encode(key in key_strategy()) {
        let encoded = make_key_with_type(key.table_id, key.index_id, &key.values, key.key_type);
        let parsed = parse_key(&encoded).unwrap();
        prop_assert_eq!(parsed.encode(), encoded);
        prop_assert_eq!(parsed.key_type, key.key_type);
    }

    #[test]
    fn next_key_bounds_generated_extensions(
        base in key_strategy(),
        extra in prop::collection::vec(value_strategy(), 0..3),
        suffix in key_type_strategy(),
    ) {
        let bare = Key::new(base.table_id, base.index_id, base.values.clone(), KeyType::Bare);
        let mut values = base.values;
        values.extend(extra.iter().cloned());
        let extended = Key::new(bare.table_id, bare.index_id, values, suffix);
        prop_assume!(!(extra.is_empty() && suffix == KeyType::Bare));

        let lower = bare.encode();
        let inside = extended.encode();
        let bound = next_key(&lower);
        prop_assert!(lower < inside, "{} !< {}", format_key(&lower), format_key(&inside));
        prop_assert!(inside < bound, "{} !< {}", format_key(&inside), format_key(&bound));
        prop_assert_eq!(bare.compare(&extended), Ordering::Less);
    }
}
