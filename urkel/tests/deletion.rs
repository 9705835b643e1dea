mod common;

use common::*;

#[test]
fn deleted_keys_recover_through_an_old_version() {
    let mut rng = rng(1000);
    let dir = tempfile::tempdir().unwrap();
    let mut tree = disk_tree(dir.path());

    let pairs = fill(&mut tree, &mut rng, 1000, 10, 10);
    tree.commit().unwrap();

    for (key, _) in &pairs {
        tree.delete(key).unwrap();
    }
    tree.commit().unwrap();
    assert_eq!(tree.version(), 2);

    for (key, _) in &pairs {
        let err = tree.get(key).unwrap_err();
        assert!(err.is_not_found(), "deleted key returned {:?}", err);
    }

    // The pre-delete version still serves every key.
    let version = tree.version();
    tree.load_version(version - 1).unwrap();
    for (key, value) in &pairs {
        assert_eq!(&tree.get(key).unwrap(), value);
    }
}

#[test]
fn uncommitted_inserts_can_be_deleted() {
    let mut rng = rng(1001);
    let dir = tempfile::tempdir().unwrap();
    let mut tree = disk_tree(dir.path());
    fill(&mut tree, &mut rng, 100, 10, 10);

    let pairs = fill(&mut tree, &mut rng, 10, 10, 10);
    for (key, _) in &pairs {
        tree.delete(key).unwrap();
        assert!(tree.get(key).unwrap_err().is_not_found());
    }
}

#[test]
fn deleting_one_key_leaves_the_rest() {
    let mut rng = rng(1002);
    let mut tree = mem_tree();
    let pairs = fill(&mut tree, &mut rng, 10, 10, 10);
    tree.commit().unwrap();

    tree.delete(&pairs[0].0).unwrap();
    assert!(tree.get(&pairs[0].0).unwrap_err().is_not_found());
    for (key, value) in &pairs[1..] {
        assert_eq!(&tree.get(key).unwrap(), value);
    }
}

#[test]
fn deleting_an_absent_key_is_a_noop() {
    let mut tree = mem_tree();
    tree.delete(b"never-there").unwrap();

    tree.put(b"present", b"v").unwrap();
    let before = tree.hash();
    tree.delete(b"still-not-there").unwrap();
    assert_eq!(tree.hash(), before);
}

#[test]
fn emptied_tree_accepts_new_inserts() {
    let mut rng = rng(1003);
    let mut tree = mem_tree();
    let pairs = fill(&mut tree, &mut rng, 20, 10, 10);
    tree.commit().unwrap();

    for (key, _) in &pairs {
        tree.delete(key).unwrap();
    }
    tree.commit().unwrap();

    tree.put(b"fresh", b"start").unwrap();
    tree.commit().unwrap();
    assert_eq!(tree.get(b"fresh").unwrap(), b"start".to_vec());
    for (key, _) in &pairs {
        assert!(tree.get(key).unwrap_err().is_not_found());
    }
}
