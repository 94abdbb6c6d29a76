use enumflags2::bitflags;

/// 状态寄存器
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 出错，详情见错误寄存器
    Err = 0x01,
    /// 数据请求：可以传输一个扇区
    Drq = 0x08,
    /// 驱动器写故障
    Df = 0x20,
    /// 驱动器就绪
    Drdy = 0x40,
    /// 忙
    Bsy = 0x80,
}
