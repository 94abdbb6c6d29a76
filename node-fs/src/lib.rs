#![no_std]

extern crate alloc;

/* node-fs 的整体架构，自上而下 */

// 路径解析与增删改：把路径翻译成节点ID，维护父子关系
mod vfs;

// 卷：挂载、格式化、超级块与统计
mod volume;

// 磁盘数据结构层：超级块与节点记录，一条记录恰占一个扇区
mod layout;

// 节点缓存层：内存中最近使用的节点记录
mod node_cache;

mod error;

pub use block_dev::{BLOCK_SIZE, BlockDevice, DeviceError};

pub use self::{
    error::Error,
    layout::{DiskNode, NodeKind, SectorId, SuperBlock},
    node_cache::{CacheStats, NodeCache},
    vfs::{DirEntry, Stat},
    volume::{Config, DiskStats, SharedVolume, Volume},
};

pub const MAGIC: u32 = 0x4E46_5331;

/// 超级块所在扇区；此前的扇区属于引导扇区与内核映像，本层从不写入
pub const SUPERBLOCK_SECTOR: u32 = 2048;
/// 节点表起始扇区，存放 1 号节点
pub const NODE_TABLE_START: u32 = SUPERBLOCK_SECTOR + 1;
/// 节点表容量，合法ID为 `1..=MAX_NODES`
pub const MAX_NODES: u32 = 1024;
/// 卷的总扇区数，仅用于统计
pub const TOTAL_SECTORS: u32 = 8192;
/// 格式化后即计入已用的扇区：引导区、内核映像与超级块
pub const RESERVED_SECTORS: u32 = SUPERBLOCK_SECTOR + 1;

/// 根节点ID，根的父节点是它自己
pub const ROOT_ID: u32 = 1;

/// 节点名缓冲区长度，最后一字节留给 \0
pub const NAME_CAP: usize = 40;
/// 目录可容纳的子节点数
pub const MAX_CHILDREN: usize = 16;
/// 记录内存放文件内容的字节数
pub const PAYLOAD_CAP: usize = 388;

/// 路径分隔符
pub const SEPARATOR: char = '/';

pub type Result<T> = core::result::Result<T, Error>;
