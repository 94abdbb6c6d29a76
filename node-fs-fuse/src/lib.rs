
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::sync::Mutex;

use block_dev::{BLOCK_SIZE, BlockDevice, DeviceError};

/// 以宿主机文件作为块设备，文件的第 n 个 512 字节即第 n 个扇区
#[derive(Debug)]
pub struct BlockFile(pub Mutex<File>);

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self(Mutex::new(fd))
    }

    fn transfer(
        &self,
        block_id: usize,
        f: impl FnOnce(&mut File) -> io::Result<()>,
    ) -> Result<(), DeviceError> {
        let mut file = self.0.lock().map_err(|_| DeviceError::Io)?;
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .and_then(|_| f(&mut *file))
            .map_err(|err| {
                log::error!("image i/o failed at sector {block_id}: {err}");
                DeviceError::Io
            })
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        if buf.len() != BLOCK_SIZE {
            return Err(DeviceError::BadBuffer);
        }
        // 不完整的扇区视为读失败
        self.transfer(block_id, |file| file.read_exact(buf))
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        if buf.len() != BLOCK_SIZE {
            return Err(DeviceError::BadBuffer);
        }
        self.transfer(block_id, |file| file.write_all(buf))
    }
}

/// 定长的内存盘
#[derive(Debug)]
pub struct RamDisk(Mutex<Vec<u8>>);

impl RamDisk {
    pub fn new(sectors: usize) -> Self {
        Self(Mutex::new(vec![0; sectors * BLOCK_SIZE]))
    }

    pub fn sectors(&self) -> usize {
        self.0.lock().map_or(0, |data| data.len() / BLOCK_SIZE)
    }

    fn range(block_id: usize, len: usize, disk_len: usize) -> Result<Range<usize>, DeviceError> {
        if len != BLOCK_SIZE {
            return Err(DeviceError::BadBuffer);
        }
        let start = block_id * BLOCK_SIZE;
        if start + BLOCK_SIZE > disk_len {
            return Err(DeviceError::OutOfRange);
        }
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        let data = self.0.lock().map_err(|_| DeviceError::Io)?;
        let range = Self::range(block_id, buf.len(), data.len())?;
        buf.copy_from_slice(&data[range]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        let mut data = self.0.lock().map_err(|_| DeviceError::Io)?;
        let range = Self::range(block_id, buf.len(), data.len())?;
        data[range].copy_from_slice(buf);
        Ok(())
    }
}
