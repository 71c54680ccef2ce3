#![cfg(test)]

// Property tests for RawTable kept inside the crate so they can drive the
// engine directly with hand-picked hashes.

use crate::error::Error;
use crate::pool::PoolOptions;
use crate::raw_table::{InsertMode, Placed, RawTable, TablePools};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum Op {
    Add(u16, i32),
    TryAdd(u16, i32),
    Set(u16, i32),
    Remove(u16),
    Clear,
    Ensure(u16),
    Trim,
}

// Few distinct hashes so chains get long and collide across buckets.
fn weak_hash(k: u16) -> u64 {
    (k % 7) as u64 * 0x9E37_79B9
}

fn arb_op() -> impl Strategy<Value = Op> {
    let key = 0u16..48;
    prop_oneof![
        4 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Add(k, v)),
        2 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::TryAdd(k, v)),
        2 => (key.clone(), any::<i32>()).prop_map(|(k, v)| Op::Set(k, v)),
        3 => key.prop_map(Op::Remove),
        1 => Just(Op::Clear),
        1 => (0u16..300).prop_map(Op::Ensure),
        1 => Just(Op::Trim),
    ]
}

fn lookup(t: &RawTable<u16, i32>, k: u16) -> Option<i32> {
    t.find(weak_hash(k), |x| *x == k)
        .and_then(|i| t.get(i))
        .map(|(_, v)| *v)
}

// Property: state-machine equivalence against std::collections::HashMap.
// - add/try_add/set/remove agree with the model's membership and values.
// - Every mutating call changes the version; rejected adds and missing
//   removes do not.
// - Capacity is 0 or a power of two >= max(16, len) and ensure never shrinks.
// - Iteration yields each live entry exactly once.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in proptest::collection::vec(arb_op(), 1..200)) {
        let pools = TablePools::with_options(PoolOptions::diagnostic());
        let mut sut: RawTable<u16, i32> = RawTable::new(pools.clone());
        let mut model: HashMap<u16, i32> = HashMap::new();

        for op in ops {
            let before = sut.version();
            let cap_before = sut.capacity();
            match op {
                Op::Add(k, v) => {
                    let found = sut.find(weak_hash(k), |x| *x == k);
                    let res = sut.place(found, weak_hash(k), || k, v, InsertMode::AddOrFail);
                    if let std::collections::hash_map::Entry::Vacant(e) = model.entry(k) {
                        prop_assert!(matches!(res, Ok(Placed::Added)));
                        e.insert(v);
                        prop_assert_ne!(sut.version(), before);
                    } else {
                        prop_assert!(matches!(res, Err(Error::DuplicateKey)));
                        prop_assert_eq!(sut.version(), before);
                    }
                }
                Op::TryAdd(k, v) => {
                    let found = sut.find(weak_hash(k), |x| *x == k);
                    let res = sut.place(found, weak_hash(k), || k, v, InsertMode::TryAdd);
                    let added = matches!(res, Ok(Placed::Added));
                    prop_assert_eq!(added, !model.contains_key(&k));
                    model.entry(k).or_insert(v);
                }
                Op::Set(k, v) => {
                    let found = sut.find(weak_hash(k), |x| *x == k);
                    let res = sut.place(found, weak_hash(k), || k, v, InsertMode::AddOrOverwrite);
                    match (res, model.insert(k, v)) {
                        (Ok(Placed::Replaced(old)), Some(prev)) => prop_assert_eq!(old, prev),
                        (Ok(Placed::Added), None) => {}
                        _ => prop_assert!(false, "set disagreed with model"),
                    }
                    prop_assert_ne!(sut.version(), before);
                }
                Op::Remove(k) => {
                    let got = sut.remove(weak_hash(k), |x| *x == k);
                    let want = model.remove(&k);
                    prop_assert_eq!(got.map(|(_, v)| v), want);
                    if want.is_none() {
                        prop_assert_eq!(sut.version(), before);
                    }
                }
                Op::Clear => {
                    sut.clear();
                    model.clear();
                    prop_assert_ne!(sut.version(), before);
                }
                Op::Ensure(n) => {
                    let cap = sut.ensure_capacity(n as usize).unwrap();
                    prop_assert!(cap >= cap_before);
                    prop_assert!(cap >= n as usize);
                    prop_assert_ne!(sut.version(), before);
                }
                Op::Trim => {
                    let len = sut.len();
                    sut.trim_excess_to(len).unwrap();
                    prop_assert!(sut.capacity() <= cap_before.max(16));
                    prop_assert_ne!(sut.version(), before);
                }
            }

            prop_assert_eq!(sut.len(), model.len());
            let cap = sut.capacity();
            prop_assert!(cap == 0 || (cap.is_power_of_two() && cap >= 16));
            prop_assert!(cap >= sut.len());
        }

        for (k, v) in &model {
            prop_assert_eq!(lookup(&sut, *k), Some(*v));
        }
        let mut seen: Vec<(u16, i32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
        seen.sort();
        let mut want: Vec<(u16, i32)> = model.into_iter().collect();
        want.sort();
        prop_assert_eq!(seen, want);

        drop(sut);
        let report = pools.entries.audit().unwrap();
        prop_assert!(report.is_clean());
        prop_assert_eq!(report.outstanding, 0);
    }
}

// Property: without removals, iteration order is insertion order, across
// any number of growth steps.
proptest! {
    #[test]
    fn prop_insertion_order_survives_growth(
        keys in proptest::collection::hash_set(any::<u16>(), 0..150)
    ) {
        let mut sut: RawTable<u16, ()> =
            RawTable::new(TablePools::with_options(PoolOptions::default()));
        let order: Vec<u16> = keys.into_iter().collect();
        for &k in &order {
            sut.insert_new(weak_hash(k), k, ()).unwrap();
        }
        let seen: Vec<u16> = sut.iter().map(|(k, _)| *k).collect();
        prop_assert_eq!(seen, order);
    }
}
