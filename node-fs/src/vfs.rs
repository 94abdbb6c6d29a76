//! # 路径与节点操作层
//!
//! 把路径翻译成节点ID，并在维持父子关系的前提下增删节点、读写内容。
//! 节点之间只以ID互相引用，所有访问都经过节点缓存。

use alloc::string::String;
use alloc::vec::Vec;

use crate::layout::{DiskNode, NodeKind, SectorId, truncate_name};
use crate::{Error, MAX_NODES, ROOT_ID, Result, SEPARATOR, Volume};

/// 目录项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub id: u32,
    pub kind: NodeKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub id: u32,
    pub parent_id: u32,
    pub kind: NodeKind,
    /// 文件内容的字节数
    pub size: usize,
    /// 子节点数
    pub children: usize,
}

impl Volume {
    /// 按路径查找节点，相对路径从`start`开始
    pub fn find(&mut self, path: &str, start: u32) -> Result<&mut DiskNode> {
        let id = self.resolve(path, start)?;
        self.cache.load(id)
    }

    /// 按路径查找节点ID
    ///
    /// - 以`/`开头时从根目录出发；
    /// - 空分量忽略，`.`不移动，`..`移到父目录（根的父目录是根）；
    /// - 后面还有非空分量的节点必须是目录，末尾的`/`不算。
    pub fn resolve(&mut self, path: &str, start: u32) -> Result<u32> {
        let (mut current, path) = match path.strip_prefix(SEPARATOR) {
            Some(rest) => (ROOT_ID, rest),
            None => (start, path),
        };
        self.get(current)?;

        for cmp in path.split(SEPARATOR).filter(|cmp| !cmp.is_empty()) {
            if !self.cache.map(current, DiskNode::is_dir)? {
                return Err(Error::NotADirectory);
            }
            match cmp {
                "." => (),
                ".." => current = self.cache.map(current, DiskNode::parent_id)?,
                name => current = self.find_local_id(current, name)?.ok_or(Error::NotFound)?,
            }
        }

        Ok(current)
    }

    /// 在目录下按名字查找子节点，`parent_id`不是目录时返回`None`
    pub fn find_local_id(&mut self, parent_id: u32, name: &str) -> Result<Option<u32>> {
        let parent = self.get(parent_id)?;
        if !parent.is_dir() {
            return Ok(None);
        }

        let name = truncate_name(name);
        let children = parent.children().to_vec();
        for child in children {
            if self.cache.map(child, |node| node.name() == name)? {
                return Ok(Some(child));
            }
        }

        Ok(None)
    }

    /// 在目录下创建节点，返回新节点的ID
    ///
    /// 所有检查都先于状态修改：节点表已满、父节点不存在或非目录、
    /// 目录已满、名字非法、重名，任一成立即失败且卷保持不变。
    pub fn create(&mut self, parent_id: u32, name: &str, kind: NodeKind) -> Result<u32> {
        if self.is_exhausted() {
            return Err(Error::DiskFull);
        }
        let parent = self.get(parent_id)?;
        if !parent.is_dir() {
            return Err(Error::NotADirectory);
        }
        if parent.is_full() {
            return Err(Error::DirectoryFull);
        }
        if !is_valid_name(name) {
            return Err(Error::InvalidName);
        }
        if self.find_local_id(parent_id, name)?.is_some() {
            return Err(Error::AlreadyExists);
        }

        // 超级块落盘且记录进入缓存之后，分配才算生效
        let committed = self.super_block().clone();
        let id = self.alloc_id()?;
        if let Err(err) = self.persist_super_block() {
            self.restore_super_block(committed);
            return Err(err);
        }
        if let Err(err) = self.cache.install(DiskNode::new(id, parent_id, kind, name)) {
            self.restore_super_block(committed);
            let _ = self.persist_super_block();
            return Err(err);
        }

        self.cache.map_mut(parent_id, |parent| parent.push_child(id))?;
        self.cache.save(id)?;
        self.cache.save(parent_id)?;

        log::debug!("created {kind:?} {name:?} as node {id} under {parent_id}");
        Ok(id)
    }

    /// 按路径创建节点，路径的最后一个分量为新节点的名字
    pub fn create_at(&mut self, path: &str, start: u32, kind: NodeKind) -> Result<u32> {
        let trimmed = path.trim_end_matches(SEPARATOR);
        let (parent_id, name) = match trimmed.rsplit_once(SEPARATOR) {
            Some(("", name)) => (ROOT_ID, name),
            Some((parent, name)) => (self.resolve(parent, start)?, name),
            None if path.starts_with(SEPARATOR) => (ROOT_ID, trimmed),
            None => (start, trimmed),
        };

        self.create(parent_id, name, kind)
    }

    /// 删除节点，目录须为空
    pub fn delete(&mut self, id: u32) -> Result<()> {
        if id == ROOT_ID {
            return Err(Error::IsRoot);
        }
        let node = self.get(id)?;
        if node.is_dir() && !node.children().is_empty() {
            return Err(Error::DirectoryNotEmpty);
        }
        let parent_id = node.parent_id();
        self.get(parent_id)?;

        // 记录清零后该ID即视为不存在；清零失败则卷保持不变
        self.block_device()
            .write_block(SectorId::of_node(id).block(), DiskNode::zeroed().as_bytes())
            .inspect_err(|err| log::error!("failed to clear node {id}: {err}"))?;
        self.cache.invalidate(id);

        // 先改内存，落盘失败时由下一次 sync 补写
        let removed = self.cache.map_mut(parent_id, |parent| parent.remove_child(id))?;
        if !removed {
            log::warn!("node {id} is missing from its parent {parent_id}");
        }
        self.release_id();

        self.cache.save(parent_id)?;
        self.persist_super_block()?;

        log::debug!("deleted node {id} from {parent_id}");
        Ok(())
    }

    /// 标记为脏并立即写回
    pub fn update(&mut self, id: u32) -> Result<()> {
        self.cache.mark_dirty(id);
        self.cache.save(id)
    }

    pub fn read_at(&mut self, id: u32, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let node = self.get(id)?;
        if node.is_dir() {
            return Err(Error::IsADirectory);
        }
        Ok(node.read_at(offset, buf))
    }

    /// 写入文件内容并落盘，返回实际写入的字节数
    pub fn write_at(&mut self, id: u32, offset: usize, buf: &[u8]) -> Result<usize> {
        let node = self.get(id)?;
        if node.is_dir() {
            return Err(Error::IsADirectory);
        }
        let written = node.write_at(offset, buf);
        self.update(id)?;

        Ok(written)
    }

    pub fn truncate(&mut self, id: u32) -> Result<()> {
        let node = self.get(id)?;
        if node.is_dir() {
            return Err(Error::IsADirectory);
        }
        node.truncate();
        self.update(id)
    }

    /// 按创建顺序列出目录项
    pub fn read_dir(&mut self, id: u32) -> Result<Vec<DirEntry>> {
        let node = self.get(id)?;
        if !node.is_dir() {
            return Err(Error::NotADirectory);
        }

        let children = node.children().to_vec();
        children
            .into_iter()
            .map(|child| {
                self.cache.map(child, |node| DirEntry {
                    id: child,
                    kind: node.kind(),
                    name: node.name().into_owned(),
                })
            })
            .collect()
    }

    /// 沿父节点链拼出绝对路径
    pub fn path_of(&mut self, id: u32) -> Result<String> {
        let mut names = Vec::new();
        let mut current = id;

        while current != ROOT_ID {
            if names.len() >= MAX_NODES as usize {
                log::warn!("parent chain of node {id} does not reach the root");
                return Err(Error::Corrupted {
                    expected: ROOT_ID,
                    found: current,
                });
            }
            let node = self.get(current)?;
            names.push(node.name().into_owned());
            current = node.parent_id();
        }

        if names.is_empty() {
            return Ok(String::from("/"));
        }

        let mut path = String::new();
        for name in names.iter().rev() {
            path.push(SEPARATOR);
            path.push_str(name);
        }
        Ok(path)
    }

    pub fn stat(&mut self, id: u32) -> Result<Stat> {
        let node = self.get(id)?;
        Ok(Stat {
            id,
            parent_id: node.parent_id(),
            kind: node.kind(),
            size: node.size(),
            children: node.children().len(),
        })
    }
}

/// 名字不能为空、`.`、`..`，也不能含有分隔符
fn is_valid_name(name: &str) -> bool {
    !matches!(name, "" | "." | "..") && !name.contains(SEPARATOR)
}
