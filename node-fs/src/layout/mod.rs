//! # 磁盘数据结构层
//!
//! node-fs 的磁盘布局：
//! 引导扇区与内核映像 | 超级块 | 节点表（每个节点一个扇区）
//!
//! 记录都是`#[repr(C)]`的扇区映像，任意位模式都是合法值，
//! 因此可以直接以字节切片的形式与设备交换。

mod super_block;
pub use super_block::SuperBlock;

mod disk_node;
pub use disk_node::{DiskNode, NodeKind, truncate_name};

use core::ops::Add;

use derive_more::{Add, From, Into};

use crate::{MAX_NODES, NODE_TABLE_START, SUPERBLOCK_SECTOR};

/// 设备上的扇区号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Add, From, Into)]
#[repr(transparent)]
pub struct SectorId(usize);

impl Add<usize> for SectorId {
    type Output = Self;

    fn add(self, rhs: usize) -> Self::Output {
        self + Self(rhs)
    }
}

impl SectorId {
    pub const SUPER_BLOCK: Self = Self(SUPERBLOCK_SECTOR as usize);
    pub const NODE_TABLE: Self = Self(NODE_TABLE_START as usize);

    /// 节点ID到扇区号的仿射映射，ID须在 `1..=MAX_NODES` 之内
    #[inline]
    pub fn of_node(id: u32) -> Self {
        debug_assert!((1..=MAX_NODES).contains(&id));
        Self::NODE_TABLE + (id - 1) as usize
    }

    #[inline]
    pub fn block(self) -> usize {
        self.0
    }
}

/// 以字节切片的形式看待扇区映像
///
/// # Safety
///
/// 实现者须为`#[repr(C)]`、恰为一个扇区大小、无填充且任意位模式皆合法。
pub(crate) unsafe trait SectorImage: Sized {
    fn as_bytes(&self) -> &[u8] {
        unsafe {
            core::slice::from_raw_parts(core::ptr::from_ref(self).cast(), core::mem::size_of::<Self>())
        }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe {
            core::slice::from_raw_parts_mut(
                core::ptr::from_mut(self).cast(),
                core::mem::size_of::<Self>(),
            )
        }
    }
}
