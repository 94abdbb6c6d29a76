//! # 块设备接口层
//!
//! 块设备是以**扇区**为单位存储数据的设备，例如硬盘、U盘等；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 文件系统只通过块设备驱动读写块设备，驱动失败时如实上报，不做重试。

#![no_std]

use core::any::Any;
use core::fmt;

/// 扇区大小，设备读写的最小单位
pub const BLOCK_SIZE: usize = 512;

/// 块设备驱动特质
///
/// `buf` 恰为一个扇区（[`BLOCK_SIZE`] 字节）。
pub trait BlockDevice: Send + Sync + Any {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError>;
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError>;
}

/// 设备层错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// 限定轮询次数内设备仍未就绪
    Timeout,
    /// 控制器置位 ERR，附带错误寄存器的值
    Controller(u8),
    /// 驱动器写故障（DF）
    DriveFault,
    /// 扇区号超出设备的可寻址范围
    OutOfRange,
    /// 缓冲区长度与请求的扇区数不符
    BadBuffer,
    /// 宿主机后端读写失败
    Io,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("device timed out"),
            Self::Controller(err) => write!(f, "controller error (error register {err:#04x})"),
            Self::DriveFault => f.write_str("drive fault"),
            Self::OutOfRange => f.write_str("sector out of range"),
            Self::BadBuffer => f.write_str("buffer does not match sector count"),
            Self::Io => f.write_str("backing store i/o failure"),
        }
    }
}
