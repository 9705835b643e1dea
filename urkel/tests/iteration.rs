mod common;

use common::*;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use urkel::TreeIterator;

#[test]
fn visits_every_pair_exactly_once() {
    let mut rng = rng(3000);
    let mut tree = mem_tree();
    let pairs = fill(&mut tree, &mut rng, 10, 10, 10);
    tree.commit().unwrap();

    let mut seen = Vec::new();
    tree.iterate(|key, value| {
        seen.push((key.to_vec(), value.to_vec()));
        false
    })
    .unwrap();

    let expected: BTreeMap<_, _> = pairs.into_iter().collect();
    let collected: BTreeMap<_, _> = seen.iter().cloned().collect();
    assert_eq!(seen.len(), collected.len(), "an entry was visited twice");
    assert_eq!(collected, expected);
}

#[test]
fn dirty_state_iterates_too() {
    let mut rng = rng(3001);
    let mut tree = mem_tree();
    let pairs = fill(&mut tree, &mut rng, 10, 10, 10);

    let mut count = 0;
    tree.iterate(|_, _| {
        count += 1;
        false
    })
    .unwrap();
    assert_eq!(count, pairs.len());
}

#[test]
fn reverse_order_mirrors_forward_order() {
    let mut rng = rng(3002);
    let mut tree = mem_tree();
    fill(&mut tree, &mut rng, 10, 10, 10);

    let mut forward = Vec::new();
    tree.iterate(|key, _| {
        forward.push(key.to_vec());
        false
    })
    .unwrap();

    let mut reverse = Vec::new();
    tree.reverse_iterate(|key, _| {
        reverse.push(key.to_vec());
        false
    })
    .unwrap();

    reverse.reverse();
    assert_eq!(forward, reverse);
}

#[test]
fn the_callback_stops_the_walk() {
    let mut rng = rng(3003);
    let mut tree = mem_tree();
    fill(&mut tree, &mut rng, 10, 10, 10);

    let mut count = 0;
    tree.iterate(|_, _| {
        count += 1;
        count == 3
    })
    .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn iteration_leaves_reads_intact() {
    // The walk evicts clean subtrees it materialised; lookups afterwards
    // reload them.
    let mut rng = rng(3004);
    let dir = tempfile::tempdir().unwrap();
    let mut tree = disk_tree(dir.path());
    let pairs = fill(&mut tree, &mut rng, 100, 10, 10);
    tree.commit().unwrap();

    tree.iterate(|_, _| false).unwrap();
    for (key, value) in &pairs {
        assert_eq!(&tree.get(key).unwrap(), value);
    }
}

#[test]
fn cursor_walks_the_snapshot() {
    let mut rng = rng(3005);
    let mut tree = mem_tree();
    let pairs = fill(&mut tree, &mut rng, 10, 10, 10);
    tree.commit().unwrap();

    let mut expected = Vec::new();
    tree.iterate(|key, value| {
        expected.push((key.to_vec(), value.to_vec()));
        false
    })
    .unwrap();

    let mut iter = TreeIterator::new(tree.snapshot());
    let mut seen = Vec::new();
    while iter.valid() {
        seen.push((iter.key().to_vec(), iter.value().to_vec()));
        iter.next();
    }
    assert_eq!(seen.len(), pairs.len());
    assert_eq!(seen, expected);
    assert!(iter.error().is_none());
}

#[test]
fn reverse_cursor_mirrors_the_forward_cursor() {
    let mut rng = rng(3006);
    let mut tree = mem_tree();
    fill(&mut tree, &mut rng, 10, 10, 10);
    tree.commit().unwrap();

    let mut forward = Vec::new();
    let mut iter = TreeIterator::new(tree.snapshot());
    while iter.valid() {
        forward.push(iter.key().to_vec());
        iter.next();
    }

    let mut reverse = Vec::new();
    let mut iter = TreeIterator::new_reverse(tree.snapshot());
    while iter.valid() {
        reverse.push(iter.key().to_vec());
        iter.next();
    }

    reverse.reverse();
    assert_eq!(forward, reverse);
}

#[test]
fn closed_cursors_are_invalid_and_next_panics() {
    let mut rng = rng(3007);
    let mut tree = mem_tree();
    fill(&mut tree, &mut rng, 10, 10, 10);
    tree.commit().unwrap();

    let mut iter = TreeIterator::new(tree.snapshot());
    let mut count = 0;
    while iter.valid() {
        count += 1;
        if count == 5 {
            break;
        }
        iter.next();
    }
    iter.close();
    assert!(!iter.valid());
    assert!(catch_unwind(AssertUnwindSafe(|| iter.next())).is_err());
}
