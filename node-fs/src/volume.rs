//! # 卷管理层
//!
//! 持有超级块与节点缓存，负责挂载、格式化、节点ID分配与用量统计。

use alloc::sync::Arc;

use block_dev::BlockDevice;
use spin::Mutex;

use crate::layout::{DiskNode, NodeKind, SectorId, SuperBlock};
use crate::node_cache::{CacheStats, NodeCache};
use crate::{BLOCK_SIZE, Error, MAX_NODES, ROOT_ID, Result, TOTAL_SECTORS};

/// 内核中多处共享同一个卷
pub type SharedVolume = Arc<Mutex<Volume>>;

/// 格式化后根目录下的目录
const TOP_LEVEL_DIRS: [&str; 7] = ["bin", "etc", "home", "tmp", "usr", "a", "h"];

const MOTD: &[u8] = b"Welcome to node-fs!\n";
const VERSION: &[u8] = concat!("node-fs ", env!("CARGO_PKG_VERSION"), "\n").as_bytes();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// 节点缓存的槽位数，至少为 1
    pub cache_capacity: usize,
}

impl Config {
    pub const DEFAULT_CACHE_CAPACITY: usize = 16;
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// 以 KiB 计的卷用量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskStats {
    pub total_kb: u32,
    pub used_kb: u32,
    pub free_kb: u32,
}

pub struct Volume {
    pub(crate) cache: NodeCache,
    super_block: SuperBlock,
    block_device: Arc<dyn BlockDevice>,
}

impl Volume {
    /// 以默认配置挂载
    #[inline]
    pub fn mount(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        Self::mount_with(block_device, Config::default())
    }

    /// 读取超级块，魔数不符则就地格式化。
    /// 读超级块失败时卷不可用，直接返回错误。
    pub fn mount_with(block_device: Arc<dyn BlockDevice>, config: Config) -> Result<Self> {
        let mut super_block = SuperBlock::zeroed();
        block_device
            .read_block(SectorId::SUPER_BLOCK.block(), super_block.as_bytes_mut())
            .inspect_err(|err| log::error!("failed to read super block: {err}"))?;

        let mut volume = Self {
            cache: NodeCache::new(block_device.clone(), config.cache_capacity),
            super_block,
            block_device,
        };

        if volume.super_block.is_valid() {
            log::info!(
                "mounted node-fs: {} nodes, next free id {}",
                volume.super_block.total_nodes,
                volume.super_block.next_free_id,
            );
        } else {
            log::warn!("no valid node-fs found, formatting");
            volume.format()?;
        }

        Ok(volume)
    }

    #[inline]
    pub fn share(self) -> SharedVolume {
        Arc::new(Mutex::new(self))
    }

    /// 重建一个只含初始目录与文件的卷，原有节点全部作废
    pub fn format(&mut self) -> Result<()> {
        self.cache.clear();
        self.super_block.init();

        self.cache
            .install(DiskNode::new(ROOT_ID, ROOT_ID, NodeKind::Directory, "/"))?;
        self.cache.save(ROOT_ID)?;

        for dir in TOP_LEVEL_DIRS {
            self.create(ROOT_ID, dir, NodeKind::Directory)?;
        }

        let etc = self.find_local_id(ROOT_ID, "etc")?.ok_or(Error::NotFound)?;
        for (name, content) in [("motd", MOTD), ("version", VERSION)] {
            let id = self.create(etc, name, NodeKind::File)?;
            self.write_at(id, 0, content)?;
        }

        self.persist_super_block()?;
        log::info!(
            "formatted node-fs: {} nodes, {} sectors in use",
            self.super_block.total_nodes,
            self.super_block.used_sectors,
        );

        Ok(())
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        &self.super_block
    }

    #[inline]
    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    /// 取得已分配的节点
    pub fn get(&mut self, id: u32) -> Result<&mut DiskNode> {
        if id == 0 || id >= self.super_block.next_free_id {
            return Err(Error::NotFound);
        }
        self.cache.load(id)
    }

    #[inline]
    pub fn mark_dirty(&mut self, id: u32) {
        self.cache.mark_dirty(id);
    }

    #[inline]
    pub fn save(&mut self, id: u32) -> Result<()> {
        self.cache.save(id)
    }

    /// 写回全部脏节点与超级块
    pub fn sync(&mut self) -> Result<()> {
        let nodes = self.cache.sync();
        let super_block = self.persist_super_block();
        nodes.and(super_block)
    }

    pub fn disk_stats(&self) -> DiskStats {
        let kb = |sectors: u32| (sectors as usize * BLOCK_SIZE / 1024) as u32;
        let total_kb = kb(TOTAL_SECTORS);
        let used_kb = kb(self.super_block.used_sectors);

        DiskStats {
            total_kb,
            used_kb,
            free_kb: total_kb.saturating_sub(used_kb),
        }
    }

    #[inline]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl Volume {
    /// 超级块直接写穿到设备
    pub(crate) fn persist_super_block(&self) -> Result<()> {
        self.block_device
            .write_block(SectorId::SUPER_BLOCK.block(), self.super_block.as_bytes())
            .inspect_err(|err| log::error!("failed to write super block: {err}"))?;
        Ok(())
    }

    #[inline]
    pub(crate) fn is_exhausted(&self) -> bool {
        self.super_block.next_free_id > MAX_NODES
    }

    /// 分配一个新的节点ID，并计入用量
    pub(crate) fn alloc_id(&mut self) -> Result<u32> {
        if self.is_exhausted() {
            return Err(Error::DiskFull);
        }

        let sb = &mut self.super_block;
        let id = sb.next_free_id;
        sb.next_free_id += 1;
        sb.total_nodes += 1;
        sb.used_sectors += 1;

        Ok(id)
    }

    /// 撤销尚未生效的分配
    pub(crate) fn restore_super_block(&mut self, super_block: SuperBlock) {
        self.super_block = super_block;
    }

    /// 节点被删除后归还用量；ID 不回收
    pub(crate) fn release_id(&mut self) {
        let sb = &mut self.super_block;
        sb.total_nodes = sb.total_nodes.saturating_sub(1);
        sb.used_sectors = sb.used_sectors.saturating_sub(1);
    }

    #[inline]
    pub(crate) fn block_device(&self) -> &Arc<dyn BlockDevice> {
        &self.block_device
    }
}

impl core::fmt::Debug for Volume {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Volume")
            .field("super_block", &self.super_block)
            .field("cache", &self.cache)
            .finish()
    }
}
