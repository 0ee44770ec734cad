//! # 扇区缓存层
//!
//! 块设备读写速度远慢于内存，因此在内存中开辟固定数量的槽位，
//! 把即将操作的扇区复制到槽位里，所有对扇区的访问都经过本层。
//!
//! ## 锁的约定
//!
//! - 目录锁只保护“槽位 ↔ 扇区”的映射、引用位和时钟指针，
//!   仅在查找或安装映射时持有；
//! - 每个槽位有自己的锁，数据拷贝以及装载该槽位的设备读都在槽位锁下进行；
//! - 目录交出槽位前先钉住它（`pins` 加一），拷贝结束后解除，被钉住的槽位不会被换出；
//! - 持有槽位锁时绝不再去获取目录锁。
//!
//! 换出采用时钟（二次机会）算法：指针循环扫描，跳过引用位为真的槽位并清除其引用位，
//! 遇到无效或引用位为假的槽位即为牺牲者；脏的牺牲者在复用前写回设备。

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::mem;
use core::sync::atomic::{AtomicUsize, Ordering};

use block_dev::BlockDevice;
use log::trace;
use spin::Mutex;

use crate::layout::Pod;
use crate::{SectorId, CACHE_SLOTS, SECTOR_SIZE};

pub struct SectorCache {
    /// 底层块设备的引用
    device: Arc<dyn BlockDevice>,
    directory: Mutex<Directory>,
    /// 槽位池，创建后不再增减
    slots: Box<[Slot]>,
}

/// 槽位目录
struct Directory {
    tags: [Tag; CACHE_SLOTS],
    /// 时钟指针
    hand: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tag {
    /// 槽位映射的扇区，`None` 表示槽位无效
    sector: Option<SectorId>,
    referenced: bool,
}

struct Slot {
    pins: AtomicUsize,
    frame: Mutex<Frame>,
}

/// 槽位里的数据
struct Frame {
    data: SectorBuf,
    /// 缓冲区实际装载的扇区
    resident: Option<SectorId>,
    /// 是否为脏块
    dirty: bool,
}

/// 对齐到 8 字节，使磁盘数据结构可以直接映射在缓冲区上
#[repr(C, align(8))]
struct SectorBuf([u8; SECTOR_SIZE]);

impl SectorCache {
    pub fn new(device: Arc<dyn BlockDevice>) -> Self {
        Self {
            device,
            directory: Mutex::new(Directory {
                tags: [Tag::default(); CACHE_SLOTS],
                hand: 0,
            }),
            slots: (0..CACHE_SLOTS).map(|_| Slot::new()).collect(),
        }
    }

    /// 把扇区内 `[offset, offset + dst.len())` 的数据读到 `dst`
    pub fn read(&self, sector: SectorId, offset: usize, dst: &mut [u8]) {
        self.access(sector, |frame| {
            dst.copy_from_slice(&frame.data.0[offset..offset + dst.len()]);
        })
    }

    /// 把 `src` 写到扇区内 `[offset, offset + src.len())`
    pub fn write(&self, sector: SectorId, offset: usize, src: &[u8]) {
        self.access(sector, |frame| {
            frame.data.0[offset..offset + src.len()].copy_from_slice(src);
            frame.dirty = true;
        })
    }

    /// 把整个扇区清零
    pub fn zero(&self, sector: SectorId) {
        self.access(sector, |frame| {
            frame.data.0.fill(0);
            frame.dirty = true;
        })
    }

    /// 读取扇区 `offset` 处的磁盘数据结构并处理
    pub(crate) fn map<T: Pod, V>(
        &self,
        sector: SectorId,
        offset: usize,
        f: impl FnOnce(&T) -> V,
    ) -> V {
        self.access(sector, |frame| f(frame.get(offset)))
    }

    /// 以某种方式修改扇区 `offset` 处的磁盘数据结构
    pub(crate) fn map_mut<T: Pod, V>(
        &self,
        sector: SectorId,
        offset: usize,
        f: impl FnOnce(&mut T) -> V,
    ) -> V {
        self.access(sector, |frame| f(frame.get_mut(offset)))
    }

    /// 把所有脏槽位写回设备
    pub fn flush_all(&self) {
        for slot in self.slots.iter() {
            slot.frame.lock().write_back(self.device.as_ref());
        }
    }

    /// 扇区当前是否驻留在缓存中
    pub fn contains(&self, sector: SectorId) -> bool {
        self.directory.lock().lookup(sector).is_some()
    }
}

impl SectorCache {
    fn access<V>(&self, sector: SectorId, f: impl FnOnce(&mut Frame) -> V) -> V {
        let index = self.pin(sector);
        let slot = &self.slots[index];

        let value = {
            let mut frame = slot.frame.lock();
            frame.load(sector, self.device.as_ref());
            f(&mut frame)
        };

        slot.pins.fetch_sub(1, Ordering::Release);
        value
    }

    /// 在目录锁下找到或安装扇区的槽位，并钉住它
    fn pin(&self, sector: SectorId) -> usize {
        let mut directory = self.directory.lock();

        let index = match directory.lookup(sector) {
            Some(index) => index,
            None => {
                let index = directory.select_victim(&self.slots);
                // 脏数据须在映射改变前落盘，否则别的槽位会从设备读到旧内容
                self.slots[index]
                    .frame
                    .lock()
                    .write_back(self.device.as_ref());
                trace!(
                    "sector cache: slot {index} {:?} -> {sector:?}",
                    directory.tags[index].sector
                );
                directory.tags[index].sector = Some(sector);
                index
            }
        };

        directory.tags[index].referenced = true;
        self.slots[index].pins.fetch_add(1, Ordering::Acquire);
        index
    }
}

impl Drop for SectorCache {
    fn drop(&mut self) {
        self.flush_all();
    }
}

impl Directory {
    fn lookup(&self, sector: SectorId) -> Option<usize> {
        self.tags.iter().position(|tag| tag.sector == Some(sector))
    }

    fn select_victim(&mut self, slots: &[Slot]) -> usize {
        loop {
            let index = self.hand;
            self.hand = (self.hand + 1) % CACHE_SLOTS;

            if slots[index].pins.load(Ordering::Acquire) > 0 {
                continue;
            }

            let tag = &mut self.tags[index];
            if tag.sector.is_none() || !tag.referenced {
                return index;
            }
            tag.referenced = false;
        }
    }
}

impl Slot {
    fn new() -> Self {
        Self {
            pins: AtomicUsize::new(0),
            frame: Mutex::new(Frame {
                data: SectorBuf([0; SECTOR_SIZE]),
                resident: None,
                dirty: false,
            }),
        }
    }
}

impl Frame {
    /// 确保缓冲区里装的是 `sector`
    fn load(&mut self, sector: SectorId, device: &dyn BlockDevice) {
        if self.resident == Some(sector) {
            return;
        }

        self.write_back(device);
        device.read_block(sector.block(), &mut self.data.0);
        self.resident = Some(sector);
        self.dirty = false;
    }

    fn write_back(&mut self, device: &dyn BlockDevice) {
        if let (Some(sector), true) = (self.resident, self.dirty) {
            self.dirty = false;
            device.write_block(sector.block(), &self.data.0);
        }
    }

    fn get<T: Pod>(&self, offset: usize) -> &T {
        let type_size = mem::size_of::<T>();
        assert!(type_size + offset <= SECTOR_SIZE);
        assert_eq!(0, offset % mem::align_of::<T>());
        let addr = self.data.0[offset..].as_ptr().cast::<T>();
        // SAFETY: `T: Pod` 接受任意位模式，范围与对齐在上面已检查
        unsafe { &*addr }
    }

    fn get_mut<T: Pod>(&mut self, offset: usize) -> &mut T {
        let type_size = mem::size_of::<T>();
        assert!(type_size + offset <= SECTOR_SIZE);
        assert_eq!(0, offset % mem::align_of::<T>());
        self.dirty = true;
        let addr = self.data.0[offset..].as_mut_ptr().cast::<T>();
        // SAFETY: 同 `get`
        unsafe { &mut *addr }
    }
}
