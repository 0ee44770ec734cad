#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sector_fs::{BlockDevice, FreeMap, SectorFs, SectorId, SECTOR_SIZE};

/// 内存中的块设备，统计设备读写次数
pub struct MemDisk {
    sectors: Mutex<Vec<[u8; SECTOR_SIZE]>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemDisk {
    pub fn new(sectors: usize) -> Arc<Self> {
        Self::filled(sectors, 0)
    }

    /// 每个字节都是 `byte` 的磁盘，用来冒充设备上的陈旧数据
    pub fn filled(sectors: usize, byte: u8) -> Arc<Self> {
        Arc::new(Self {
            sectors: Mutex::new(vec![[byte; SECTOR_SIZE]; sectors]),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 绕过缓存直接查看设备上的扇区
    pub fn raw(&self, sector: u32) -> [u8; SECTOR_SIZE] {
        self.sectors.lock().unwrap()[sector as usize]
    }
}

impl BlockDevice for MemDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) {
        assert_eq!(SECTOR_SIZE, buf.len(), "not a complete block!");
        buf.copy_from_slice(&self.sectors.lock().unwrap()[block_id]);
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) {
        assert_eq!(SECTOR_SIZE, buf.len(), "not a complete block!");
        self.sectors.lock().unwrap()[block_id].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Setup {
    pub disk: Arc<MemDisk>,
    pub free_map: Arc<FreeMap>,
    pub fs: Arc<SectorFs>,
}

/// 扇区 0 保留，其余扇区交给分配器；磁盘预先填满垃圾数据
pub fn setup(total_sectors: usize) -> Setup {
    setup_with(MemDisk::filled(total_sectors, 0xab), total_sectors - 1)
}

/// 在 `disk` 上建文件系统，分配器管理从扇区 1 开始的 `capacity` 个扇区
pub fn setup_with(disk: Arc<MemDisk>, capacity: usize) -> Setup {
    let free_map = Arc::new(FreeMap::new(SectorId::new(1), capacity));
    let fs = SectorFs::new(disk.clone(), free_map.clone());
    Setup { disk, free_map, fs }
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}
