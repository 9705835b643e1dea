mod common;

use common::*;
use std::sync::Arc;
use urkel::{Config, FileStore, FlushTree, Tree};

#[test]
fn load_latest_adopts_committed_state() {
    let mut rng = rng(41);
    let dir = tempfile::tempdir().unwrap();
    let mut tree = disk_tree(dir.path());

    let mut rounds = Vec::new();
    for _ in 0..5 {
        let pairs = fill(&mut tree, &mut rng, 5, 10, 400);
        tree.commit().unwrap();
        rounds.push(pairs);
    }

    // A fresh tree over the same store sees everything after load_latest.
    let mut reloaded = Tree::new(tree.store().clone());
    reloaded.load_latest().unwrap();
    assert_eq!(reloaded.version(), 5);

    for pairs in &rounds {
        for (key, value) in pairs {
            assert_eq!(&reloaded.get(key).unwrap(), value);
        }
    }
}

#[test]
fn committed_state_survives_reopen() {
    let mut rng = rng(42);
    let dir = tempfile::tempdir().unwrap();

    let mut pairs = Vec::new();
    {
        let mut tree = disk_tree(dir.path());
        pairs.extend(fill(&mut tree, &mut rng, 10, 10, 10));
        tree.commit().unwrap();
        let root = tree.hash();
        tree.store().close().unwrap();

        // Reopen in the same process lifetime.
        let mut tree = disk_tree(dir.path());
        tree.load_latest().unwrap();
        assert_eq!(tree.version(), 1);
        assert_eq!(tree.hash(), root);
        for (key, value) in &pairs {
            assert_eq!(&tree.get(key).unwrap(), value);
        }

        // And keep writing where the old instance left off.
        pairs.extend(fill(&mut tree, &mut rng, 10, 10, 10));
        tree.commit().unwrap();
        tree.store().close().unwrap();
    }

    let mut tree = disk_tree(dir.path());
    tree.load_latest().unwrap();
    assert_eq!(tree.version(), 2);
    for (key, value) in &pairs {
        assert_eq!(&tree.get(key).unwrap(), value);
    }
}

#[test]
fn load_latest_on_a_fresh_store_is_the_empty_tree() {
    let dir = tempfile::tempdir().unwrap();
    let mut tree = disk_tree(dir.path());
    tree.load_latest().unwrap();
    assert_eq!(tree.version(), 0);
    assert!(tree.get(b"anything").unwrap_err().is_not_found());
}

#[test]
fn flush_tree_amortises_writes() {
    let mut rng = rng(77);
    let dir = tempfile::tempdir().unwrap();
    let mut conf = Config::dev(dir.path());
    conf.max_file_size(4096);
    let tree = Tree::new(Arc::new(FileStore::open(conf).unwrap()));

    let mut flushing = FlushTree::new(tree, 10);
    let mut pairs = Vec::new();
    for _ in 0..100 {
        let key = rand_bytes(&mut rng, 10);
        flushing.put(&key, &key).unwrap();
        pairs.push(key);
    }
    // Flushed state is readable before any commit.
    for key in &pairs {
        assert_eq!(&flushing.get(key).unwrap(), key);
    }

    flushing.commit().unwrap();
    let mut tree = flushing.into_inner();
    for key in &pairs {
        assert_eq!(&tree.get(key).unwrap(), key);
    }
}

#[test]
fn corrupted_node_record_surfaces_on_read() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut tree = disk_tree(dir.path());
        tree.put(b"only-key", b"only-value").unwrap();
        tree.commit().unwrap();
        tree.store().close().unwrap();
    }

    // One root record and one leaf record; flip a byte inside the root.
    let tree_file = dir.path().join("tree-0.udb");
    let mut bytes = std::fs::read(&tree_file).unwrap();
    bytes[10] ^= 0xff;
    std::fs::write(&tree_file, &bytes).unwrap();

    let mut tree = disk_tree(dir.path());
    tree.load_latest().unwrap();
    assert!(tree.get(b"only-key").unwrap_err().is_corrupted());
}

#[test]
fn corrupted_version_record_surfaces_on_load() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut tree = disk_tree(dir.path());
        tree.put(b"k", b"v").unwrap();
        tree.commit().unwrap();
        tree.store().close().unwrap();
    }

    let version_file = dir.path().join("version-0.udb");
    let mut bytes = std::fs::read(&version_file).unwrap();
    assert_eq!(bytes.len(), 56);
    bytes[3] ^= 0xff;
    std::fs::write(&version_file, &bytes).unwrap();

    let mut tree = disk_tree(dir.path());
    assert!(tree.load_latest().unwrap_err().is_corrupted());
}
