use pooled_collections::{
    AlternateComparer, DynComparer, Error, ErrorKind, KeyComparer, PoolOptions, PooledHashSet,
    TablePools,
};

// Native keys are i32; f64 alternates are truncated toward zero.
#[derive(Clone, Copy, Debug, Default)]
struct Truncating;

impl KeyComparer<i32> for Truncating {
    fn hash(&self, key: &i32) -> u64 {
        (*key as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
    fn equals(&self, a: &i32, b: &i32) -> bool {
        a == b
    }
}

impl AlternateComparer<f64, i32> for Truncating {
    fn hash_alternate(&self, alternate: &f64) -> u64 {
        self.hash(&(*alternate as i32))
    }
    fn equals_alternate(&self, alternate: &f64, key: &i32) -> bool {
        *alternate as i32 == *key
    }
    fn materialize(&self, alternate: &f64) -> i32 {
        *alternate as i32
    }
}

fn hundred() -> PooledHashSet<i32, Truncating> {
    let mut set = PooledHashSet::with_comparer(Truncating);
    set.union_with(0..100).unwrap();
    set
}

#[test]
fn alternate_add_materializes_native_key() {
    let mut set = hundred();
    {
        let mut alt = set.alternate_lookup::<f64>().unwrap();
        assert!(alt.add(&150.0).unwrap());
        assert!(!alt.add(&150.9).unwrap());
        assert!(alt.contains(&42.7).unwrap());
        assert_eq!(alt.get_key(&99.2).unwrap(), Some(&99));
        assert!(!alt.contains(&100.0).unwrap());
    }
    assert!(set.contains(&150).unwrap());
    assert_eq!(set.len().unwrap(), 101);
}

#[test]
fn alternate_remove_is_visible_natively() {
    let mut set = hundred();
    let before = set.version().unwrap();
    let mut c = set.cursor().unwrap();
    assert!(c.move_next(&set).unwrap());
    assert_eq!(set.alternate_lookup::<f64>().unwrap().take(&7.5).unwrap(), Some(7));
    assert!(!set.contains(&7).unwrap());
    assert!(set.version().unwrap() > before);
    assert_eq!(c.move_next(&set).unwrap_err().kind(), ErrorKind::InvalidOperation);
}

#[test]
fn dyn_comparer_rejects_unregistered_alternate_at_view_creation() {
    let mut set: PooledHashSet<i32, DynComparer<i32>> =
        PooledHashSet::with_comparer(DynComparer::new(Truncating));
    set.insert(1).unwrap();
    match set.try_alternate_lookup::<f64>() {
        Err(e) => {
            assert_eq!(e, Error::UnsupportedAlternate { type_name: "f64" });
            assert_eq!(e.kind(), ErrorKind::InvalidOperation);
        }
        Ok(_) => panic!("f64 is not registered"),
    }
    assert_eq!(set.len().unwrap(), 1);
}

#[test]
fn dyn_comparer_serves_registered_alternate() {
    let comparer = DynComparer::new(Truncating).with_alternate::<f64, _>(Truncating);
    let mut set = PooledHashSet::with_capacity_in(
        10,
        comparer,
        TablePools::with_options(PoolOptions::diagnostic()),
    )
    .unwrap();
    set.insert(3).unwrap();
    let mut alt = set.try_alternate_lookup::<f64>().unwrap();
    assert!(alt.contains(&3.99).unwrap());
    assert!(alt.add(&-2.5).unwrap());
    assert!(set.contains(&-2).unwrap());
}

#[test]
fn string_set_probes_by_str() {
    let mut set: PooledHashSet<String> = PooledHashSet::new();
    set.insert("red".to_string()).unwrap();
    let mut alt = set.alternate_lookup::<str>().unwrap();
    assert!(alt.contains("red").unwrap());
    assert!(alt.add("green").unwrap());
    assert_eq!(alt.len().unwrap(), 2);
    assert!(set.contains(&"green".to_string()).unwrap());
}

#[test]
fn set_algebra_against_model() {
    use std::collections::HashSet;
    let mut a: PooledHashSet<i32> = PooledHashSet::new();
    let mut b: PooledHashSet<i32> = PooledHashSet::new();
    a.union_with((0..50).map(|x| x * 3)).unwrap();
    b.union_with((0..50).map(|x| x * 5)).unwrap();
    let ma: HashSet<i32> = (0..50).map(|x| x * 3).collect();
    let mb: HashSet<i32> = (0..50).map(|x| x * 5).collect();

    a.intersect_with(&b).unwrap();
    let want: HashSet<i32> = ma.intersection(&mb).copied().collect();
    let got: HashSet<i32> = a.iter().unwrap().copied().collect();
    assert_eq!(got, want);
    assert!(a.is_subset_of(&b).unwrap());
    assert!(!b.is_subset_of(&a).unwrap());
    assert!(b.overlaps(&[15, 1]).unwrap());
}

#[test]
fn every_operation_fails_after_dispose() {
    let mut set = hundred();
    let other = hundred();
    set.dispose();
    set.dispose();
    let d = Err::<(), _>(Error::Disposed);
    assert_eq!(set.len().map(drop), d);
    assert_eq!(set.capacity().map(drop), d);
    assert_eq!(set.insert(1).map(drop), d);
    assert_eq!(set.contains(&1).map(drop), d);
    assert_eq!(set.get(&1).map(drop), d);
    assert_eq!(set.take(&1).map(drop), d);
    assert_eq!(set.remove(&1).map(drop), d);
    assert_eq!(set.clear(), d);
    assert_eq!(set.ensure_capacity(1).map(drop), d);
    assert_eq!(set.trim_excess(), d);
    assert_eq!(set.union_with([1]), d);
    assert_eq!(set.intersect_with(&other), d);
    assert_eq!(set.except_with(&[1]), d);
    assert_eq!(set.is_subset_of(&other).map(drop), d);
    assert_eq!(set.overlaps(&[1]).map(drop), d);
    assert_eq!(set.iter().map(drop), d);
    assert_eq!(set.cursor().map(drop), d);
    assert_eq!(set.alternate_lookup::<f64>().map(drop), d);
}
