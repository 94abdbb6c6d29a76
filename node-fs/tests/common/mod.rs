#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use node_fs::{BLOCK_SIZE, BlockDevice, DeviceError, SectorId, Volume};

/// 稀疏的内存盘，记录每个扇区被写入的次数
#[derive(Default)]
pub struct RamDisk {
    sectors: Mutex<HashMap<usize, [u8; BLOCK_SIZE]>>,
    writes: Mutex<HashMap<usize, usize>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl RamDisk {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes_to(&self, block_id: usize) -> usize {
        self.writes.lock().unwrap().get(&block_id).copied().unwrap_or(0)
    }

    pub fn node_writes(&self, id: u32) -> usize {
        self.writes_to(SectorId::of_node(id).block())
    }

    pub fn reset_counters(&self) {
        self.writes.lock().unwrap().clear();
    }

    pub fn sector(&self, block_id: usize) -> [u8; BLOCK_SIZE] {
        self.sectors
            .lock()
            .unwrap()
            .get(&block_id)
            .copied()
            .unwrap_or([0; BLOCK_SIZE])
    }

    pub fn poke(&self, block_id: usize, data: [u8; BLOCK_SIZE]) {
        self.sectors.lock().unwrap().insert(block_id, data);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(DeviceError::Timeout);
        }
        buf.copy_from_slice(&self.sector(block_id));
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DeviceError::DriveFault);
        }
        let mut data = [0; BLOCK_SIZE];
        data.copy_from_slice(buf);
        self.sectors.lock().unwrap().insert(block_id, data);
        *self.writes.lock().unwrap().entry(block_id).or_default() += 1;
        Ok(())
    }
}

/// 在空白内存盘上挂载（即格式化）一个卷
pub fn fresh_volume(cache_capacity: usize) -> (Arc<RamDisk>, Volume) {
    let disk = RamDisk::new();
    let volume = Volume::mount_with(
        disk.clone(),
        node_fs::Config { cache_capacity },
    )
    .unwrap();
    (disk, volume)
}
