use crate::layout::SectorImage;
use crate::{BLOCK_SIZE, MAGIC, RESERVED_SECTORS, ROOT_ID};

/// 超级块：
/// - 提供卷合法性校验；
/// - 记录节点分配状态与用量
#[derive(Debug, Clone)]
#[repr(C)]
pub struct SuperBlock {
    /// 魔数：用于校验卷合法性
    magic: u32,
    pub root_id: u32,
    /// 下一个可分配的节点ID，只增不减
    pub next_free_id: u32,
    /// 现存节点数
    pub total_nodes: u32,
    /// 已用扇区数，含保留区
    pub used_sectors: u32,
    _reserved: [u8; BLOCK_SIZE - 20],
}

const _: () = assert!(core::mem::size_of::<SuperBlock>() == BLOCK_SIZE);

unsafe impl SectorImage for SuperBlock {}

impl SuperBlock {
    pub const fn zeroed() -> Self {
        Self {
            magic: 0,
            root_id: 0,
            next_free_id: 0,
            total_nodes: 0,
            used_sectors: 0,
            _reserved: [0; BLOCK_SIZE - 20],
        }
    }

    /// 刚格式化的卷：只有根节点
    #[inline]
    pub fn init(&mut self) {
        *self = Self {
            magic: MAGIC,
            root_id: ROOT_ID,
            next_free_id: ROOT_ID + 1,
            total_nodes: 1,
            used_sectors: RESERVED_SECTORS + 1,
            ..Self::zeroed()
        };
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        SectorImage::as_bytes(self)
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        SectorImage::as_bytes_mut(self)
    }
}
