//! # 节点缓存层
//!
//! 块设备读写速度远慢于内存，因此在内存中保留最近使用的节点记录。
//! 槽位数量固定：未命中时优先使用空槽，否则踢走最久未访问的槽，
//! 被踢走的槽若为脏则先写回。
//!
//! 缓存本身从不主动落盘，持久化由 [`NodeCache::save`] 与
//! [`NodeCache::sync`] 显式完成。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::layout::{DiskNode, SectorId};
use crate::{Error, MAX_NODES, Result};

/// 内存中的节点记录
#[derive(Debug)]
struct Slot {
    /// 缓存的节点ID，0 为空槽
    id: u32,
    /// 最近一次访问的时刻，越小越久未用
    last_access: u64,
    /// 是否为脏槽
    dirty: bool,
    node: DiskNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub cached: usize,
    pub dirty: usize,
}

pub struct NodeCache {
    slots: Vec<Slot>,
    /// 单调递增的访问计数
    clock: u64,
    /// 底层块设备的引用
    block_device: Arc<dyn BlockDevice>,
}

impl Slot {
    const EMPTY: Self = Self {
        id: 0,
        last_access: 0,
        dirty: false,
        node: DiskNode::zeroed(),
    };
}

impl NodeCache {
    /// 容量至少为 1
    pub fn new(block_device: Arc<dyn BlockDevice>, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity.max(1));
        slots.resize_with(capacity.max(1), || Slot::EMPTY);

        Self {
            slots,
            clock: 0,
            block_device,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// 取得节点记录，未命中则从磁盘读入
    pub fn load(&mut self, id: u32) -> Result<&mut DiskNode> {
        let index = self.slot_of(id)?;
        Ok(&mut self.slots[index].node)
    }

    #[inline]
    pub fn map<V>(&mut self, id: u32, f: impl FnOnce(&DiskNode) -> V) -> Result<V> {
        self.load(id).map(|node| f(node))
    }

    /// 修改节点记录并标记为脏
    pub fn map_mut<V>(&mut self, id: u32, f: impl FnOnce(&mut DiskNode) -> V) -> Result<V> {
        let index = self.slot_of(id)?;
        let slot = &mut self.slots[index];
        slot.dirty = true;
        Ok(f(&mut slot.node))
    }

    /// 节点不在缓存中时什么也不做
    pub fn mark_dirty(&mut self, id: u32) {
        if let Some(slot) = self.resident_mut(id) {
            slot.dirty = true;
        }
    }

    /// 把节点写回磁盘；不在缓存中的节点先读入
    pub fn save(&mut self, id: u32) -> Result<()> {
        let index = self.slot_of(id)?;
        self.write_back(index)
    }

    /// 写回全部脏槽，不踢走任何槽。
    /// 某个槽写回失败时继续处理其余的槽，并返回第一个错误。
    pub fn sync(&mut self) -> Result<()> {
        let mut result = Ok(());
        for index in 0..self.slots.len() {
            if self.slots[index].dirty {
                if let Err(err) = self.write_back(index) {
                    result = result.and(Err(err));
                }
            }
        }
        result
    }

    /// 放入一条全新的记录（不读磁盘），并标记为脏
    pub fn install(&mut self, node: DiskNode) -> Result<()> {
        let id = node.id();
        if !(1..=MAX_NODES).contains(&id) {
            return Err(Error::NotFound);
        }

        let index = match self.position(id) {
            Some(index) => index,
            None => self.evict()?,
        };
        let last_access = self.tick();
        self.slots[index] = Slot {
            id,
            last_access,
            dirty: true,
            node,
        };

        Ok(())
    }

    /// 丢弃节点的缓存，脏数据也一并丢弃
    pub fn invalidate(&mut self, id: u32) {
        if let Some(slot) = self.resident_mut(id) {
            *slot = Slot::EMPTY;
        }
    }

    /// 丢弃全部缓存，仅供格式化使用
    pub fn clear(&mut self) {
        self.slots.fill_with(|| Slot::EMPTY);
    }

    #[inline]
    pub fn is_cached(&self, id: u32) -> bool {
        self.position(id).is_some()
    }

    #[inline]
    pub fn is_dirty(&self, id: u32) -> bool {
        self.position(id).is_some_and(|index| self.slots[index].dirty)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            capacity: self.slots.len(),
            cached: self.slots.iter().filter(|slot| slot.id != 0).count(),
            dirty: self.slots.iter().filter(|slot| slot.id != 0 && slot.dirty).count(),
        }
    }
}

impl NodeCache {
    #[inline]
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    #[inline]
    fn position(&self, id: u32) -> Option<usize> {
        (id != 0)
            .then(|| self.slots.iter().position(|slot| slot.id == id))
            .flatten()
    }

    fn resident_mut(&mut self, id: u32) -> Option<&mut Slot> {
        let index = self.position(id)?;
        Some(&mut self.slots[index])
    }

    /// 命中则刷新访问时刻，否则读入空出的槽位
    fn slot_of(&mut self, id: u32) -> Result<usize> {
        if !(1..=MAX_NODES).contains(&id) {
            return Err(Error::NotFound);
        }

        if let Some(index) = self.position(id) {
            log::trace!("node cache hit: {id}");
            let last_access = self.tick();
            self.slots[index].last_access = last_access;
            return Ok(index);
        }

        log::trace!("node cache miss: {id}");
        let index = self.evict()?;
        let last_access = self.tick();
        let slot = &mut self.slots[index];
        if let Err(err) = self
            .block_device
            .read_block(SectorId::of_node(id).block(), slot.node.as_bytes_mut())
        {
            log::error!("failed to read node {id}: {err}");
            slot.node = DiskNode::zeroed();
            return Err(err.into());
        }

        let found = slot.node.id();
        if found != id {
            slot.node = DiskNode::zeroed();
            if found == 0 {
                return Err(Error::NotFound);
            }
            log::warn!("node {id} is corrupted: record carries id {found}");
            return Err(Error::Corrupted {
                expected: id,
                found,
            });
        }

        slot.id = id;
        slot.dirty = false;
        slot.last_access = last_access;
        Ok(index)
    }

    /// 腾出一个槽位：优先取空槽，否则取最久未访问者（并列取靠前者），
    /// 脏槽先写回。返回的槽位已清空。
    fn evict(&mut self) -> Result<usize> {
        let (index, _) = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, slot)| (slot.id != 0, slot.last_access))
            .expect("node cache has at least one slot");

        if self.slots[index].id != 0 {
            if self.slots[index].dirty {
                log::debug!("evicting dirty node {}", self.slots[index].id);
                self.write_back(index)?;
            }
            self.slots[index] = Slot::EMPTY;
        }

        Ok(index)
    }

    fn write_back(&mut self, index: usize) -> Result<()> {
        let slot = &mut self.slots[index];
        self.block_device
            .write_block(SectorId::of_node(slot.id).block(), slot.node.as_bytes())
            .inspect_err(|err| log::error!("failed to write node {}: {err}", slot.id))?;
        slot.dirty = false;
        Ok(())
    }
}

impl core::fmt::Debug for NodeCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NodeCache")
            .field("stats", &self.stats())
            .field("clock", &self.clock)
            .finish()
    }
}
