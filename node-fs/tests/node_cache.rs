mod common;

use std::sync::Arc;

use node_fs::{BlockDevice, CacheStats, DeviceError, DiskNode, Error, MAX_NODES, NodeCache, NodeKind, SectorId};

use common::RamDisk;

/// 在盘上放好 `1..=count` 号目录节点
fn disk_with_dirs(count: u32) -> Arc<RamDisk> {
    let disk = RamDisk::new();
    for id in 1..=count {
        put(&disk, &DiskNode::new(id, 1, NodeKind::Directory, &format!("d{id}")));
    }
    disk.reset_counters();
    disk
}

fn put(disk: &RamDisk, node: &DiskNode) {
    disk.write_block(SectorId::of_node(node.id()).block(), node.as_bytes())
        .unwrap();
}

#[test]
fn least_recently_used_is_evicted() {
    let disk = disk_with_dirs(3);
    let mut cache = NodeCache::new(disk.clone(), 2);

    cache.load(1).unwrap();
    cache.load(2).unwrap();
    cache.load(1).unwrap();
    cache.load(3).unwrap();

    assert!(cache.is_cached(1));
    assert!(!cache.is_cached(2));
    assert!(cache.is_cached(3));
}

#[test]
fn dirty_victim_is_written_back_once() {
    const K: usize = 3;
    let disk = disk_with_dirs(K as u32 + 1);
    let mut cache = NodeCache::new(disk.clone(), K);

    cache.map_mut(1, |node| node.push_child(2)).unwrap();
    for id in 2..=K as u32 {
        cache.load(id).unwrap();
    }
    assert_eq!(disk.node_writes(1), 0);

    cache.load(K as u32 + 1).unwrap();
    assert!(!cache.is_cached(1));
    assert_eq!(disk.node_writes(1), 1);
    assert_eq!((2..=K as u32 + 1).map(|id| disk.node_writes(id)).sum::<usize>(), 0);

    // 重新读入时踢走的是干净的 2 号，不产生写入
    assert_eq!(cache.map(1, |node| node.children().to_vec()).unwrap(), [2]);
    assert!(!cache.is_cached(2));
    assert_eq!(disk.node_writes(1), 1);
    assert_eq!(disk.node_writes(2), 0);
}

#[test]
fn mark_dirty_ignores_absent_nodes() {
    let disk = disk_with_dirs(2);
    let mut cache = NodeCache::new(disk.clone(), 4);

    cache.mark_dirty(2);
    assert!(!cache.is_cached(2));
    cache.sync().unwrap();
    assert_eq!(disk.node_writes(2), 0);

    cache.load(2).unwrap();
    cache.mark_dirty(2);
    assert!(cache.is_dirty(2));
}

#[test]
fn save_loads_absent_node_and_writes_it() {
    let disk = disk_with_dirs(2);
    let mut cache = NodeCache::new(disk.clone(), 4);

    cache.save(2).unwrap();
    assert!(cache.is_cached(2));
    assert!(!cache.is_dirty(2));
    assert_eq!(disk.node_writes(2), 1);
}

#[test]
fn sync_writes_every_dirty_slot_and_keeps_them() {
    let disk = disk_with_dirs(3);
    let mut cache = NodeCache::new(disk.clone(), 4);

    cache.map_mut(1, |node| node.push_child(3)).unwrap();
    cache.map_mut(2, |node| node.push_child(3)).unwrap();
    cache.load(3).unwrap();
    assert_eq!(
        cache.stats(),
        CacheStats {
            capacity: 4,
            cached: 3,
            dirty: 2,
        }
    );

    cache.sync().unwrap();
    assert_eq!(cache.stats().dirty, 0);
    assert_eq!(cache.stats().cached, 3);
    assert_eq!(disk.node_writes(1), 1);
    assert_eq!(disk.node_writes(2), 1);
    assert_eq!(disk.node_writes(3), 0);

    let mut on_disk = DiskNode::zeroed();
    disk.read_block(SectorId::of_node(2).block(), on_disk.as_bytes_mut())
        .unwrap();
    assert_eq!(on_disk.children(), [3]);
}

#[test]
fn install_does_not_read_the_device() {
    let disk = RamDisk::new();
    disk.fail_reads(true);
    let mut cache = NodeCache::new(disk.clone(), 2);

    cache
        .install(DiskNode::new(7, 1, NodeKind::File, "fresh"))
        .unwrap();
    assert!(cache.is_dirty(7));
    assert_eq!(cache.map(7, |node| node.name().into_owned()).unwrap(), "fresh");
}

#[test]
fn missing_records_are_not_found() {
    let disk = disk_with_dirs(1);
    let mut cache = NodeCache::new(disk, 4);

    assert_eq!(cache.load(0).err(), Some(Error::NotFound));
    assert_eq!(cache.load(MAX_NODES + 1).err(), Some(Error::NotFound));
    assert_eq!(cache.load(5).err(), Some(Error::NotFound));
    assert_eq!(cache.stats().cached, 0);
}

#[test]
fn mismatched_record_is_corrupted() {
    let disk = RamDisk::new();
    let mut image = [0; 512];
    image.copy_from_slice(DiskNode::new(9, 1, NodeKind::File, "stray").as_bytes());
    disk.poke(SectorId::of_node(5).block(), image);
    let mut cache = NodeCache::new(disk, 4);

    assert_eq!(
        cache.load(5).err(),
        Some(Error::Corrupted {
            expected: 5,
            found: 9,
        })
    );
    assert!(!cache.is_cached(5));
}

#[test]
fn device_failures_are_reported() {
    let disk = disk_with_dirs(2);
    let mut cache = NodeCache::new(disk.clone(), 1);

    disk.fail_reads(true);
    assert_eq!(cache.load(1).err(), Some(Error::Device(DeviceError::Timeout)));
    assert_eq!(cache.stats().cached, 0);
    disk.fail_reads(false);

    // 写回失败的牺牲者保持驻留且仍为脏
    cache.map_mut(1, |node| node.push_child(2)).unwrap();
    disk.fail_writes(true);
    assert_eq!(
        cache.load(2).err(),
        Some(Error::Device(DeviceError::DriveFault))
    );
    assert!(cache.is_cached(1));
    assert!(cache.is_dirty(1));
    assert!(!cache.is_cached(2));

    disk.fail_writes(false);
    cache.load(2).unwrap();
    assert_eq!(disk.node_writes(1), 1);
}
