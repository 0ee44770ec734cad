//! 以宿主机上的普通文件充当扇区设备

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Mutex;

use block_dev::BlockDevice;
use sector_fs::SECTOR_SIZE;

pub struct BlockFile(pub Mutex<File>);

impl BlockFile {
    pub fn new(fd: File) -> Self {
        Self(Mutex::new(fd))
    }

    /// 镜像文件能容纳的扇区数
    pub fn sectors(&self) -> std::io::Result<usize> {
        let len = self.0.lock().unwrap().metadata()?.len();
        Ok(len as usize / SECTOR_SIZE)
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .expect("seeking error");
        assert_eq!(buf.len(), SECTOR_SIZE, "not a complete sector!");
        file.read_exact(buf).expect("not a complete sector!");
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        let mut file = self.0.lock().unwrap();
        file.seek(SeekFrom::Start((block_id * SECTOR_SIZE) as u64))
            .expect("seeking error");
        assert_eq!(buf.len(), SECTOR_SIZE, "not a complete sector!");
        file.write_all(buf).expect("not a complete sector!");
    }
}
