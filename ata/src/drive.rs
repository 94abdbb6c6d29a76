use block_dev::{BLOCK_SIZE, BlockDevice, DeviceError};
use enumflags2::BitFlags;
use spin::Mutex;

use crate::{PortIo, Status};

/// 轮询状态寄存器的默认次数上限
pub const DEFAULT_SPIN_LIMIT: usize = 10_000_000;

/// LBA28 可寻址的扇区数
const LBA28_SECTORS: u32 = 1 << 28;

/// 寄存器相对命令块基址的偏移
mod reg {
    pub const DATA: u16 = 0x00;
    pub const ERROR: u16 = 0x01;
    pub const SECTOR_COUNT: u16 = 0x02;
    pub const LBA_LOW: u16 = 0x03;
    pub const LBA_MID: u16 = 0x04;
    pub const LBA_HIGH: u16 = 0x05;
    pub const DRIVE_SELECT: u16 = 0x06;
    pub const STATUS: u16 = 0x07;
    pub const COMMAND: u16 = 0x07;
}

mod cmd {
    pub const READ_PIO: u8 = 0x20;
    pub const WRITE_PIO: u8 = 0x30;
    pub const CACHE_FLUSH: u8 = 0xE7;
}

/// 设备控制寄存器：软复位位
const CONTROL_SRST: u8 = 0x04;
/// 驱动器选择：LBA 模式 + 主盘
const SELECT_LBA_MASTER: u8 = 0xE0;

/// ATA 通道的端口位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    /// 命令块基址
    pub base: u16,
    /// 设备控制寄存器（读为备用状态）
    pub control: u16,
}

impl Channel {
    pub const PRIMARY: Self = Self {
        base: 0x1F0,
        control: 0x3F6,
    };
}

/// 通道上的主盘
///
/// 端口集合由自旋锁保护，命令的准备、传输与收尾不会交错。
#[derive(Debug)]
pub struct AtaDrive<P> {
    io: Mutex<P>,
    channel: Channel,
    spin_limit: usize,
}

impl<P: PortIo> AtaDrive<P> {
    pub fn new(io: P, channel: Channel) -> Self {
        Self::with_spin_limit(io, channel, DEFAULT_SPIN_LIMIT)
    }

    pub fn with_spin_limit(io: P, channel: Channel, spin_limit: usize) -> Self {
        Self {
            io: Mutex::new(io),
            channel,
            spin_limit,
        }
    }

    /// 软复位通道并等待主盘就绪
    pub fn init(&self) -> Result<(), DeviceError> {
        let mut io = self.io.lock();
        io.write_u8(self.channel.control, CONTROL_SRST);
        io.write_u8(self.channel.control, 0);

        match self.wait(&mut *io, Status::Drdy.into()) {
            Ok(()) => {
                log::info!("ATA: primary master drive initialized");
                Ok(())
            }
            Err(err) => {
                log::error!("ATA: initialization failed, drive not ready: {err}");
                Err(err)
            }
        }
    }

    /// 从`lba`起读取`count`个扇区到`buf`
    pub fn read_sectors(&self, lba: u32, count: u8, buf: &mut [u8]) -> Result<(), DeviceError> {
        Self::check_request(lba, count, buf.len())?;

        let mut io = self.io.lock();
        self.setup_command(&mut *io, lba, count, cmd::READ_PIO)?;

        for sector in buf.chunks_exact_mut(BLOCK_SIZE).take(count as usize) {
            self.wait(&mut *io, Status::Drq.into()).inspect_err(|err| {
                log::error!("ATA: read of sector {lba} failed, drive not ready: {err}");
            })?;
            for word in sector.chunks_exact_mut(2) {
                word.copy_from_slice(&io.read_u16(self.channel.base + reg::DATA).to_le_bytes());
            }
        }

        self.wait(&mut *io, Status::Drdy.into())
    }

    /// 把`buf`写入从`lba`起的`count`个扇区，并冲刷驱动器缓存
    pub fn write_sectors(&self, lba: u32, count: u8, buf: &[u8]) -> Result<(), DeviceError> {
        Self::check_request(lba, count, buf.len())?;

        let mut io = self.io.lock();
        self.setup_command(&mut *io, lba, count, cmd::WRITE_PIO)?;

        for sector in buf.chunks_exact(BLOCK_SIZE).take(count as usize) {
            self.wait(&mut *io, Status::Drq.into()).inspect_err(|err| {
                log::error!("ATA: write of sector {lba} failed, drive not ready: {err}");
            })?;
            for word in sector.chunks_exact(2) {
                io.write_u16(
                    self.channel.base + reg::DATA,
                    u16::from_le_bytes([word[0], word[1]]),
                );
            }
        }

        io.write_u8(self.channel.base + reg::COMMAND, cmd::CACHE_FLUSH);
        self.wait(&mut *io, Status::Drdy.into()).inspect_err(|err| {
            log::error!("ATA: cache flush failed: {err}");
        })
    }
}

impl<P: PortIo> AtaDrive<P> {
    fn check_request(lba: u32, count: u8, buf_len: usize) -> Result<(), DeviceError> {
        if count == 0 || buf_len < count as usize * BLOCK_SIZE {
            return Err(DeviceError::BadBuffer);
        }
        if lba >= LBA28_SECTORS || LBA28_SECTORS - lba < count as u32 {
            return Err(DeviceError::OutOfRange);
        }
        Ok(())
    }

    fn setup_command(&self, io: &mut P, lba: u32, count: u8, command: u8) -> Result<(), DeviceError> {
        self.wait(io, Status::Drdy.into()).inspect_err(|err| {
            log::error!("ATA: drive not ready before command {command:#04x}: {err}");
        })?;

        let base = self.channel.base;
        let [lba0, lba1, lba2, lba3] = lba.to_le_bytes();
        io.write_u8(base + reg::SECTOR_COUNT, count);
        io.write_u8(base + reg::LBA_LOW, lba0);
        io.write_u8(base + reg::LBA_MID, lba1);
        io.write_u8(base + reg::LBA_HIGH, lba2);
        io.write_u8(base + reg::DRIVE_SELECT, SELECT_LBA_MASTER | (lba3 & 0x0F));
        io.write_u8(base + reg::COMMAND, command);

        Ok(())
    }

    /// 轮询至 BSY 清零且`want`全部置位
    fn wait(&self, io: &mut P, want: BitFlags<Status>) -> Result<(), DeviceError> {
        let status_port = self.channel.base + reg::STATUS;

        // 连读四次状态寄存器，约 400ns
        for _ in 0..4 {
            io.read_u8(status_port);
        }

        for _ in 0..self.spin_limit {
            let status = BitFlags::<Status>::from_bits_truncate(io.read_u8(status_port));

            // BSY 置位时其余位无意义
            if status.contains(Status::Bsy) {
                continue;
            }
            if status.contains(Status::Err) {
                return Err(DeviceError::Controller(
                    io.read_u8(self.channel.base + reg::ERROR),
                ));
            }
            if status.contains(Status::Df) {
                return Err(DeviceError::DriveFault);
            }
            if status.contains(want) {
                return Ok(());
            }
        }

        log::error!("ATA: timeout waiting for drive");
        Err(DeviceError::Timeout)
    }
}

impl<P: PortIo + Send + 'static> BlockDevice for AtaDrive<P> {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        let lba = u32::try_from(block_id).map_err(|_| DeviceError::OutOfRange)?;
        self.read_sectors(lba, 1, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        let lba = u32::try_from(block_id).map_err(|_| DeviceError::OutOfRange)?;
        self.write_sectors(lba, 1, buf)
    }
}
