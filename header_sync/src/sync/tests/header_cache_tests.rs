use crate::sync::tests::mock::{test_hash, test_header};
use crate::sync::HeaderCache;
use containers::{Bytes32, Header};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn chain(from: u64, to: u64) -> Vec<Header> {
    (from..=to)
        .map(|number| {
            let parent = if number == 0 { Bytes32::ZERO } else { test_hash(number - 1, 0) };
            test_header(number, 0, parent)
        })
        .collect()
}

#[test]
fn test_insert_and_get() {
    let mut cache = HeaderCache::new(100, 10);
    let header = test_header(100, 0, test_hash(99, 0));

    assert!(cache.insert(header.clone()));

    let entry = cache.get(&header.hash).unwrap();
    assert_eq!(entry.header, header);
    assert!(!entry.forwarded);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_initial_window_from_init_height() {
    let cache = HeaderCache::new(100, 10);
    assert_eq!(cache.max_height(), 100);
    assert_eq!(cache.min_height(), 90);
    assert!(cache.is_empty());

    let cache = HeaderCache::new(3, 10);
    assert_eq!(cache.min_height(), 0);
}

#[rstest]
#[case(89, false)]
#[case(90, true)]
#[case(95, true)]
#[case(150, true)]
fn test_insert_respects_window(#[case] number: u64, #[case] accepted: bool) {
    let mut cache = HeaderCache::new(100, 10);
    let header = test_header(number, 0, test_hash(number - 1, 0));

    assert_eq!(cache.insert(header.clone()), accepted);
    assert_eq!(cache.contains(&header.hash), accepted);
}

#[test]
fn test_rejected_insert_leaves_cache_untouched() {
    let mut cache = HeaderCache::new(100, 10);
    for header in chain(95, 100) {
        cache.insert(header);
    }

    assert!(!cache.insert(test_header(50, 1, test_hash(49, 1))));
    assert_eq!(cache.len(), 6);
    assert_eq!(cache.min_height(), 90);
    assert_eq!(cache.max_height(), 100);
}

#[test]
fn test_duplicate_insert_keeps_forwarded_flag() {
    let mut cache = HeaderCache::new(10, 10);
    let header = test_header(10, 0, test_hash(9, 0));

    cache.insert(header.clone());
    assert!(cache.mark_forwarded(&header.hash));
    assert!(cache.insert(header.clone()));

    assert!(cache.get(&header.hash).unwrap().forwarded);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_mark_forwarded_unknown_hash() {
    let mut cache = HeaderCache::new(10, 10);
    assert!(!cache.mark_forwarded(&test_hash(10, 0)));
}

#[test]
fn test_new_max_height_prunes_below_window() {
    let mut cache = HeaderCache::new(0, 5);
    for header in chain(0, 20) {
        cache.insert(header);
    }

    assert_eq!(cache.max_height(), 20);
    assert_eq!(cache.min_height(), 15);
    assert_eq!(cache.len(), 6);
    for number in 0..15 {
        assert!(!cache.contains(&test_hash(number, 0)), "height {number} not pruned");
        assert!(cache.headers_at(number).is_empty());
    }
    for number in 15..=20 {
        assert!(cache.contains(&test_hash(number, 0)));
    }
}

#[test]
fn test_jump_prunes_everything_old() {
    let mut cache = HeaderCache::new(0, 5);
    for header in chain(0, 5) {
        cache.insert(header);
    }

    cache.insert(test_header(1_000, 0, test_hash(999, 0)));

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.min_height(), 995);
}

#[test]
fn test_forks_share_heights() {
    let mut cache = HeaderCache::new(10, 10);
    let canonical = test_header(11, 0, test_hash(10, 0));
    let fork = test_header(11, 1, test_hash(10, 0));

    assert!(cache.insert(canonical.clone()));
    assert!(cache.insert(fork.clone()));

    let mut at_11 = cache.headers_at(11);
    at_11.sort_by_key(|header| header.hash);
    assert_eq!(at_11, vec![&canonical, &fork]);
    assert_eq!(cache.max_height(), 11);
}

#[test]
fn test_lower_insert_does_not_move_window() {
    let mut cache = HeaderCache::new(100, 10);
    cache.insert(test_header(100, 0, test_hash(99, 0)));
    cache.insert(test_header(92, 0, test_hash(91, 0)));

    assert_eq!(cache.max_height(), 100);
    assert_eq!(cache.min_height(), 90);
    assert_eq!(cache.len(), 2);
}
