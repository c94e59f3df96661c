//! Integration tests for the B+Tree index.
//!
//! Covers the randomized model comparison against `BTreeMap`, buffer-pool
//! pressure (tree larger than the pool), the file-driven harness, and the
//! concurrency scenarios: disjoint-key parallel inserts with a background
//! reader, deterministic interleaved insert/remove, and overlapping churn.

use arbor_buffer::{BufferPoolConfig, BufferPoolManager, DiskConfig, DiskManager};
use arbor_common::page::PageId;
use arbor_index::{BPlusTree, OrdComparator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

type TestTree = BPlusTree<i64, i64, OrdComparator>;

fn create_tree(
    leaf_max: usize,
    internal_max: usize,
    num_frames: usize,
) -> (tempfile::TempDir, Arc<BufferPoolManager>, TestTree) {
    let dir = tempdir().unwrap();
    let mut config = DiskConfig::new(dir.path().join("index.arb"));
    config.fsync_enabled = false;
    let disk = DiskManager::new(config).unwrap();
    let bpm = Arc::new(BufferPoolManager::new(BufferPoolConfig { num_frames }, disk));

    let (header_id, header_guard) = bpm.new_page_guarded().unwrap();
    drop(header_guard);

    let tree = BPlusTree::new(
        "it_index",
        header_id,
        Arc::clone(&bpm),
        OrdComparator,
        leaf_max,
        internal_max,
    )
    .unwrap();
    (dir, bpm, tree)
}

fn collect_pairs(tree: &TestTree) -> Vec<(i64, i64)> {
    tree.iter().unwrap().map(|entry| entry.unwrap()).collect()
}

#[test]
fn test_randomized_against_model() {
    let (_dir, _bpm, tree) = create_tree(4, 4, 64);
    let mut model: BTreeMap<i64, i64> = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(0xA4B0);

    for step in 0..5_000 {
        let key = rng.gen_range(0..500i64);
        if rng.gen_bool(0.6) {
            let inserted = tree.insert(key, key * 7).unwrap();
            assert_eq!(inserted, !model.contains_key(&key), "step {}", step);
            model.insert(key, key * 7);
        } else {
            tree.remove(&key).unwrap();
            model.remove(&key);
        }

        if step % 500 == 0 {
            tree.check_integrity().unwrap();
            let want: Vec<(i64, i64)> = model.iter().map(|(&k, &v)| (k, v)).collect();
            assert_eq!(collect_pairs(&tree), want, "step {}", step);
        }
    }

    tree.check_integrity().unwrap();
    for key in 0..500 {
        assert_eq!(tree.get(&key).unwrap(), model.get(&key).copied());
    }
}

#[test]
fn test_tree_larger_than_pool() {
    // 16 frames cannot hold the ~200 pages this tree needs; eviction and
    // reload must be transparent to every operation
    let (_dir, bpm, tree) = create_tree(4, 4, 16);

    for k in 0..400 {
        let key = (k * 271) % 400;
        assert!(tree.insert(key, key + 1).unwrap());
    }
    assert!(bpm.page_count() <= 16);

    for key in 0..400 {
        assert_eq!(tree.get(&key).unwrap(), Some(key + 1));
    }
    tree.check_integrity().unwrap();

    for key in (0..400).step_by(2) {
        tree.remove(&key).unwrap();
    }
    tree.check_integrity().unwrap();
    let keys: Vec<i64> = collect_pairs(&tree).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (0..400).filter(|k| k % 2 == 1).collect::<Vec<_>>());
}

#[test]
fn test_insert_and_remove_from_file() {
    let (dir, _bpm, tree) = create_tree(4, 4, 64);

    let insert_path = dir.path().join("inserts.txt");
    std::fs::write(&insert_path, "5 3 8\n1 9\n").unwrap();
    assert_eq!(tree.insert_from_file(&insert_path).unwrap(), 5);

    let pairs = collect_pairs(&tree);
    assert_eq!(pairs, vec![(1, 1), (3, 3), (5, 5), (8, 8), (9, 9)]);

    // Re-inserting the same file inserts nothing (duplicates rejected)
    assert_eq!(tree.insert_from_file(&insert_path).unwrap(), 0);

    let remove_path = dir.path().join("removes.txt");
    std::fs::write(&remove_path, "3 8\n").unwrap();
    assert_eq!(tree.remove_from_file(&remove_path).unwrap(), 2);

    let keys: Vec<i64> = collect_pairs(&tree).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![1, 5, 9]);
}

#[test]
fn test_batch_from_file() {
    let (dir, _bpm, tree) = create_tree(4, 4, 64);

    let batch_path = dir.path().join("batch.txt");
    std::fs::write(&batch_path, "i 10\ni 20\ni 30\nd 20\nd 999\ni 15\n").unwrap();
    assert_eq!(tree.batch_from_file(&batch_path).unwrap(), 6);

    let keys: Vec<i64> = collect_pairs(&tree).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![10, 15, 30]);
    tree.check_integrity().unwrap();
}

#[test]
fn test_concurrent_disjoint_inserts_with_reader() {
    let (_dir, _bpm, tree) = create_tree(8, 8, 128);
    let tree = Arc::new(tree);
    let writers_done = Arc::new(AtomicBool::new(false));

    let reader = {
        let tree = Arc::clone(&tree);
        let writers_done = Arc::clone(&writers_done);
        std::thread::spawn(move || {
            // Readers observe a consistent tree at every instant: a hit
            // must carry the key's one true value
            while !writers_done.load(Ordering::Acquire) {
                for key in (0..1000).step_by(37) {
                    if let Some(value) = tree.get(&key).unwrap() {
                        assert_eq!(value, key * 3);
                    }
                }
            }
        })
    };

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let tree = Arc::clone(&tree);
            std::thread::spawn(move || {
                let base = t as i64 * 250;
                for key in base..base + 250 {
                    assert!(tree.insert(key, key * 3).unwrap());
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }
    writers_done.store(true, Ordering::Release);
    reader.join().unwrap();

    // Every successfully inserted key is found afterwards
    for key in 0..1000 {
        assert_eq!(tree.get(&key).unwrap(), Some(key * 3), "key {}", key);
    }
    let keys: Vec<i64> = collect_pairs(&tree).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (0..1000).collect::<Vec<_>>());
    tree.check_integrity().unwrap();
}

#[test]
fn test_concurrent_interleaved_insert_remove() {
    let (_dir, _bpm, tree) = create_tree(4, 4, 128);
    let tree = Arc::new(tree);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let tree = Arc::clone(&tree);
            std::thread::spawn(move || {
                let base = t as i64 * 200;
                for key in base..base + 200 {
                    assert!(tree.insert(key, key).unwrap());
                }
                for key in (base..base + 200).filter(|k| k % 2 == 0) {
                    tree.remove(&key).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    tree.check_integrity().unwrap();
    let keys: Vec<i64> = collect_pairs(&tree).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (0..800).filter(|k| k % 2 == 1).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_overlapping_churn() {
    let (_dir, _bpm, tree) = create_tree(4, 4, 128);
    let tree = Arc::new(tree);

    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let tree = Arc::clone(&tree);
            std::thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(0xC0FFEE ^ t);
                for _ in 0..1_500 {
                    let key = rng.gen_range(0..200i64);
                    if rng.gen_bool(0.5) {
                        // The value is a function of the key, so whichever
                        // thread wins the insert, lookups stay coherent
                        tree.insert(key, key + 42).unwrap();
                    } else {
                        tree.remove(&key).unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    tree.check_integrity().unwrap();
    let pairs = collect_pairs(&tree);
    for window in pairs.windows(2) {
        assert!(window[0].0 < window[1].0, "iteration out of order");
    }
    for &(key, value) in &pairs {
        assert_eq!(value, key + 42);
        assert_eq!(tree.get(&key).unwrap(), Some(value));
    }
}

#[test]
fn test_construction_resets_existing_header() {
    let (_dir, bpm, tree) = create_tree(4, 4, 64);
    tree.insert(1, 1).unwrap();
    assert!(!tree.is_empty().unwrap());

    // A tree handle always starts from an empty tree: construction resets
    // the header it is given
    let header_id = {
        let (id, guard) = bpm.new_page_guarded().unwrap();
        drop(guard);
        id
    };
    let fresh: TestTree = BPlusTree::new(
        "fresh",
        header_id,
        Arc::clone(&bpm),
        OrdComparator,
        4,
        4,
    )
    .unwrap();
    assert!(fresh.is_empty().unwrap());
    assert_eq!(fresh.root_page_id().unwrap(), PageId::INVALID);
}
