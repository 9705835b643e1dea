use std::path::Path;
use std::sync::Arc;

use rand::{rngs::StdRng, RngCore, SeedableRng};
use urkel::{Config, FileStore, Tree};

#[allow(dead_code)]
pub fn mem_tree() -> Tree {
    Tree::new(Arc::new(FileStore::open(Config::in_memory()).unwrap()))
}

#[allow(dead_code)]
pub fn disk_tree(path: &Path) -> Tree {
    Tree::new(Arc::new(FileStore::open(Config::dev(path)).unwrap()))
}

/// A disk tree whose files roll over quickly, to exercise multi-file state.
#[allow(dead_code)]
pub fn small_file_tree(path: &Path, max_file_size: u32) -> Tree {
    let mut conf = Config::dev(path);
    conf.max_file_size(max_file_size);
    Tree::new(Arc::new(FileStore::open(conf).unwrap()))
}

#[allow(dead_code)]
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

#[allow(dead_code)]
pub fn rand_bytes(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rng.fill_bytes(&mut buf);
    buf
}

/// Insert `count` random pairs without committing; returns them.
#[allow(dead_code)]
pub fn fill(
    tree: &mut Tree,
    rng: &mut StdRng,
    count: usize,
    key_len: usize,
    value_len: usize,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let key = rand_bytes(rng, key_len);
        let value = rand_bytes(rng, value_len);
        tree.put(&key, &value).unwrap();
        pairs.push((key, value));
    }
    pairs
}
