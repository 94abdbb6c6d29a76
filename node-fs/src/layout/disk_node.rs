use alloc::borrow::Cow;
use alloc::string::String;

use crate::layout::SectorImage;
use crate::{BLOCK_SIZE, MAX_CHILDREN, NAME_CAP, PAYLOAD_CAP};

/// 节点记录，一个节点独占一个扇区
///
/// 目录的子节点ID按创建顺序排列；
/// 文件内容直接存放在记录末尾的载荷区。
#[derive(Clone)]
#[repr(C)]
pub struct DiskNode {
    /// ID，0 表示空记录
    id: u32,
    parent_id: u32,
    /// 类型标签，见 [`NodeKind`]
    kind: u8,
    _reserved: [u8; 3],
    // 最后一字节留给 \0
    name: [u8; NAME_CAP],
    /// 文件内容的字节数
    size: u32,
    child_count: u32,
    children: [u32; MAX_CHILDREN],
    payload: [u8; PAYLOAD_CAP],
}

const _: () = assert!(core::mem::size_of::<DiskNode>() == BLOCK_SIZE);

unsafe impl SectorImage for DiskNode {}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum NodeKind {
    #[default]
    File = 0,
    Directory = 1,
}

impl DiskNode {
    pub const fn zeroed() -> Self {
        Self {
            id: 0,
            parent_id: 0,
            kind: 0,
            _reserved: [0; 3],
            name: [0; NAME_CAP],
            size: 0,
            child_count: 0,
            children: [0; MAX_CHILDREN],
            payload: [0; PAYLOAD_CAP],
        }
    }

    /// 一个全新的空节点，过长的名字被截断
    pub fn new(id: u32, parent_id: u32, kind: NodeKind, name: &str) -> Self {
        let mut node = Self {
            id,
            parent_id,
            kind: kind as u8,
            ..Self::zeroed()
        };
        node.set_name(name);
        node
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn parent_id(&self) -> u32 {
        self.parent_id
    }

    /// 未知的类型标签按文件处理
    #[inline]
    pub fn kind(&self) -> NodeKind {
        match self.kind {
            1 => NodeKind::Directory,
            _ => NodeKind::File,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == NodeKind::Directory
    }

    pub fn name(&self) -> Cow<'_, str> {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_CAP);
        String::from_utf8_lossy(&self.name[..len])
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size as usize
    }

    #[inline]
    pub fn children(&self) -> &[u32] {
        &self.children[..(self.child_count as usize).min(MAX_CHILDREN)]
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.child_count as usize >= MAX_CHILDREN
    }

    /// 文件内容
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload[..self.size().min(PAYLOAD_CAP)]
    }

    /// 从指定位置(字节偏移)读出内容填充`buf`
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let payload = self.payload();
        if offset >= payload.len() {
            return 0;
        }
        let len = buf.len().min(payload.len() - offset);
        buf[..len].copy_from_slice(&payload[offset..offset + len]);
        len
    }

    /// 写入载荷区，超出 [`PAYLOAD_CAP`] 的部分被丢弃；
    /// 写到内容末尾之后时文件随之变长，中间的空洞读作 0
    pub fn write_at(&mut self, offset: usize, buf: &[u8]) -> usize {
        if offset >= PAYLOAD_CAP {
            return 0;
        }
        let len = buf.len().min(PAYLOAD_CAP - offset);
        let end = offset + len;
        let size = self.size();
        if offset > size {
            self.payload[size..offset].fill(0);
        }
        self.payload[offset..end].copy_from_slice(&buf[..len]);
        if end > size {
            self.size = end as u32;
        }
        len
    }

    /// 清空文件内容
    pub fn truncate(&mut self) {
        self.payload.fill(0);
        self.size = 0;
    }

    /// 在子节点数组末尾追加，数组已满则失败
    pub fn push_child(&mut self, id: u32) -> bool {
        if self.is_full() {
            return false;
        }
        self.children[self.child_count as usize] = id;
        self.child_count += 1;
        true
    }

    /// 移除子节点，其后的ID依次左移以保持顺序
    pub fn remove_child(&mut self, id: u32) -> bool {
        let count = self.children().len();
        let Some(index) = self.children().iter().position(|&child| child == id) else {
            return false;
        };
        self.children.copy_within(index + 1..count, index);
        self.children[count - 1] = 0;
        self.child_count = count as u32 - 1;
        true
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

impl DiskNode {
    fn set_name(&mut self, name: &str) {
        let name = truncate_name(name);
        self.name = [0; NAME_CAP];
        self.name[..name.len()].copy_from_slice(name.as_bytes());
    }
}

/// 截断至 `NAME_CAP - 1` 字节，且不拆开 UTF-8 字符
pub fn truncate_name(name: &str) -> &str {
    let mut len = name.len().min(NAME_CAP - 1);
    while !name.is_char_boundary(len) {
        len -= 1;
    }
    &name[..len]
}

impl core::fmt::Debug for DiskNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DiskNode")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("size", &self.size)
            .field("children", &self.children())
            .finish()
    }
}
