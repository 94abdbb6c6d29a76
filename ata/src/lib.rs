//! # ATA 磁盘驱动
//!
//! 主通道主盘的 PIO 轮询驱动，LBA28 寻址。
//! 每条命令都是“等待就绪 → 写寄存器 → 发命令 → 逐扇区传输”，
//! 写命令最后还要冲刷驱动器缓存。失败只上报，不重试。

#![cfg_attr(not(test), no_std)]

mod drive;
mod port;
mod status;

pub use self::{
    drive::{AtaDrive, Channel, DEFAULT_SPIN_LIMIT},
    port::PortIo,
    status::Status,
};

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use self::port::Pio;
