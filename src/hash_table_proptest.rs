#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can check the
// slot layout after every operation.

use std::collections::HashMap;
use std::vec::Vec;

use proptest::prelude::*;

use crate::hash_table::Entry;
use crate::hash_table::HashTable;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Item {
    key: usize,
    value: i32,
}

// Pool-indexed operations: every key owns a fixed hash drawn from a small
// range, so keys collide on home indices and runs wrap past the array end.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, i32),
    Remove(usize),
    Find(usize),
    Mutate(usize, i32),
    Retain(u8),
    Reserve(u8),
    Clear,
    Clone,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<u64>, Vec<Op>)> {
    proptest::collection::vec(0u64..512, 1..=96).prop_flat_map(|hashes| {
        let idx = 0..hashes.len();
        let op = prop_oneof![
            8 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Insert(i, v)),
            4 => idx.clone().prop_map(Op::Remove),
            3 => idx.clone().prop_map(Op::Find),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| Op::Mutate(i, d)),
            1 => any::<u8>().prop_map(Op::Retain),
            1 => any::<u8>().prop_map(Op::Reserve),
            1 => Just(Op::Clear),
            1 => Just(Op::Clone),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (hashes.clone(), ops))
    })
}

fn check_against_model(
    table: &HashTable<Item>,
    hashes: &[u64],
    model: &HashMap<usize, i32>,
) -> Result<(), TestCaseError> {
    table.assert_invariants();
    prop_assert_eq!(table.len(), model.len());
    prop_assert_eq!(table.iter().count(), model.len());
    for (key, &hash) in hashes.iter().enumerate() {
        let found = table.find(hash, |item| item.key == key).map(|item| item.value);
        prop_assert_eq!(found, model.get(&key).copied(), "key {} hash {}", key, hash);
    }
    Ok(())
}

// Property: state-machine equivalence against std::collections::HashMap.
// After every operation the slot layout satisfies the ordering and no-gap
// invariants, the populated count matches, and every key resolves exactly as
// the model says.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((hashes, ops) in arb_scenario()) {
        let mut table: HashTable<Item> = HashTable::new();
        let mut model: HashMap<usize, i32> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let hash = hashes[key];
                    match table.entry(hash, |item| item.key == key) {
                        Entry::Occupied(mut entry) => {
                            prop_assert!(model.contains_key(&key));
                            entry.get_mut().value = value;
                        }
                        Entry::Vacant(entry) => {
                            prop_assert!(!model.contains_key(&key));
                            let inserted = entry.insert(Item { key, value });
                            prop_assert_eq!(inserted.key, key);
                        }
                    }
                    model.insert(key, value);
                }
                Op::Remove(key) => {
                    let removed = table.remove(hashes[key], |item| item.key == key);
                    prop_assert_eq!(removed.map(|item| item.value), model.remove(&key));
                }
                Op::Find(key) => {
                    let found = table.find(hashes[key], |item| item.key == key);
                    prop_assert_eq!(found.map(|item| item.value), model.get(&key).copied());
                }
                Op::Mutate(key, delta) => {
                    if let Some(item) = table.find_mut(hashes[key], |item| item.key == key) {
                        item.value = item.value.wrapping_add(delta);
                    }
                    if let Some(value) = model.get_mut(&key) {
                        *value = value.wrapping_add(delta);
                    }
                }
                Op::Retain(modulus) => {
                    let modulus = usize::from(modulus.max(2));
                    table.retain(|item| item.key % modulus != 0);
                    model.retain(|key, _| key % modulus != 0);
                }
                Op::Reserve(additional) => {
                    let capacity = table.capacity();
                    table.reserve(usize::from(additional));
                    prop_assert!(table.capacity() >= capacity);
                    prop_assert!(table.capacity() / 2 >= table.len() + usize::from(additional));
                }
                Op::Clear => {
                    let capacity = table.capacity();
                    table.clear();
                    model.clear();
                    prop_assert_eq!(table.capacity(), capacity);
                }
                Op::Clone => {
                    let cloned = table.clone();
                    check_against_model(&cloned, &hashes, &model)?;
                    table = cloned;
                }
            }

            check_against_model(&table, &hashes, &model)?;
        }
    }
}

// Property: the slots visited by a drain are exactly the live items, and the
// table is reusable afterwards.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_drain_empties((hashes, take) in (proptest::collection::vec(0u64..256, 0..150), 0usize..150)) {
        let mut table: HashTable<Item> = HashTable::new();
        for (key, &hash) in hashes.iter().enumerate() {
            table.entry(hash, |item| item.key == key).or_insert(Item { key, value: key as i32 });
        }

        let drained: Vec<Item> = table.drain().take(take).collect();
        prop_assert_eq!(drained.len(), take.min(hashes.len()));
        prop_assert!(table.is_empty());
        table.assert_invariants();

        for (key, &hash) in hashes.iter().enumerate() {
            table.entry(hash, |item| item.key == key).or_insert(Item { key, value: 0 });
        }
        prop_assert_eq!(table.len(), hashes.len());
        table.assert_invariants();
    }
}
