use core::fmt;

use block_dev::DeviceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 设备读写失败
    Device(DeviceError),
    /// 节点不存在：ID 越界，或记录已清零
    NotFound,
    /// 读回的记录ID与请求的不符
    Corrupted { expected: u32, found: u32 },
    /// 节点表已满
    DiskFull,
    /// 目录的子节点数组已满
    DirectoryFull,
    NotADirectory,
    IsADirectory,
    DirectoryNotEmpty,
    AlreadyExists,
    /// 名字为空、为`.`或`..`，或含有分隔符
    InvalidName,
    /// 根节点不可删除
    IsRoot,
}

impl From<DeviceError> for Error {
    #[inline]
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(err) => write!(f, "disk error: {err}"),
            Self::NotFound => f.write_str("no such file or directory"),
            Self::Corrupted { expected, found } => {
                write!(f, "corrupted node record: expected id {expected}, found {found}")
            }
            Self::DiskFull => f.write_str("node table is full"),
            Self::DirectoryFull => f.write_str("directory is full"),
            Self::NotADirectory => f.write_str("not a directory"),
            Self::IsADirectory => f.write_str("is a directory"),
            Self::DirectoryNotEmpty => f.write_str("directory not empty"),
            Self::AlreadyExists => f.write_str("name already exists in directory"),
            Self::InvalidName => f.write_str("invalid name (cannot be '.', '..', or contain '/')"),
            Self::IsRoot => f.write_str("cannot delete the root directory"),
        }
    }
}
