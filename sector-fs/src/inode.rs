//! # 索引节点层
//!
//! 每个磁盘索引节点在内存中至多有一个 [`Inode`]，由 [`SectorFs`] 的打开表去重；
//! 使用者拿到的是 [`InodeHandle`]，克隆即重新打开，丢弃即关闭。
//!
//! 索引节点锁串行化改变长度的元数据操作：一次扩展从读取索引节点到写回新长度都在锁内，
//! 按扇区读写数据时只在解析扇区号期间持有，拷贝数据前释放。

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use enumflags2::bitflags;
use log::debug;
use spin::Mutex;

use crate::extend;
use crate::layout::DiskInode;
use crate::locate;
use crate::{SectorFs, SectorId, SECTOR_SIZE};

/// 内存中的索引节点
pub(crate) struct Inode {
    /// 索引节点所在扇区，也是它的身份
    sector: SectorId,
    open_count: AtomicUsize,
    removed: AtomicBool,
    deny_write_count: AtomicUsize,
    lock: Mutex<()>,
}

/// 已打开索引节点的句柄
pub struct InodeHandle {
    fs: Arc<SectorFs>,
    inode: Arc<Inode>,
}

#[repr(C)]
#[derive(Debug, Default)]
pub struct Stat {
    pub inode: u64,
    pub kind: StatKind,
    pub size: u64,
}

#[allow(clippy::upper_case_acronyms)]
#[bitflags]
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatKind {
    DIR = 0o040000,
    #[default]
    FILE = 0o100000,
}

impl Inode {
    pub(crate) fn new(sector: SectorId) -> Self {
        Self {
            sector,
            open_count: AtomicUsize::new(0),
            removed: AtomicBool::new(false),
            deny_write_count: AtomicUsize::new(0),
            lock: Mutex::new(()),
        }
    }

    #[inline]
    pub(crate) fn sector(&self) -> SectorId {
        self.sector
    }

    #[inline]
    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    /// 打开计数加一，调用者持有打开表的锁
    #[inline]
    pub(crate) fn acquire(&self) {
        self.open_count.fetch_add(1, Ordering::AcqRel);
    }

    /// 打开计数减一，返回是否已归零；调用者持有打开表的锁
    #[inline]
    pub(crate) fn release(&self) -> bool {
        self.open_count.fetch_sub(1, Ordering::AcqRel) == 1
    }
}

impl InodeHandle {
    pub(crate) fn new(fs: Arc<SectorFs>, inode: Arc<Inode>) -> Self {
        Self { fs, inode }
    }

    /// 再次打开同一个索引节点
    #[inline]
    pub fn reopen(&self) -> Self {
        self.clone()
    }

    /// 关闭句柄，等价于丢弃它
    #[inline]
    pub fn close(self) {}

    /// 索引节点号，即它所在的扇区
    #[inline]
    pub fn inumber(&self) -> SectorId {
        self.inode.sector
    }

    /// 标记删除，扇区在最后一个句柄关闭时回收
    pub fn remove(&self) {
        self.inode.removed.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_removed(&self) -> bool {
        self.inode.is_removed()
    }

    #[inline]
    pub fn open_count(&self) -> usize {
        self.inode.open_count.load(Ordering::Acquire)
    }

    /// 禁止写入，每个打开者至多调用一次
    pub fn deny_write(&self) {
        let denied = self.inode.deny_write_count.fetch_add(1, Ordering::AcqRel) + 1;
        assert!(denied <= self.open_count());
    }

    /// 撤销一次 [`deny_write`](Self::deny_write)
    pub fn allow_write(&self) {
        let denied = self.inode.deny_write_count.fetch_sub(1, Ordering::AcqRel);
        assert!(denied > 0 && denied <= self.open_count());
    }

    /// 文件长度（字节）
    pub fn length(&self) -> usize {
        self.on_disk(|disk_inode| disk_inode.length() as usize)
    }

    pub fn is_directory(&self) -> bool {
        !self.is_removed() && self.on_disk(DiskInode::is_dir)
    }

    pub fn stat(&self) -> Stat {
        self.on_disk(|disk_inode| Stat {
            inode: u32::from(self.inode.sector) as u64,
            kind: if disk_inode.is_dir() {
                StatKind::DIR
            } else {
                StatKind::FILE
            },
            size: disk_inode.length() as u64,
        })
    }

    /// 从指定位置(字节偏移)读出数据填充 `buf`，返回读到的字节数。
    ///
    /// 读到文件末尾或未映射的扇区即停止。
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> usize {
        let cache = self.fs.cache();
        let disk_inode = {
            let _lock = self.inode.lock.lock();
            self.disk_inode()
        };
        let length = disk_inode.length() as usize;

        let mut read_size = 0;
        while read_size < buf.len() {
            let start = offset + read_size;
            let sector = {
                let _lock = self.inode.lock.lock();
                locate::resolve(cache, &disk_inode, start)
            };
            let Some(sector) = sector else {
                break;
            };

            // 请求剩余、扇区剩余、文件剩余三者取最小
            let sector_offset = start % SECTOR_SIZE;
            let chunk = (buf.len() - read_size)
                .min(SECTOR_SIZE - sector_offset)
                .min(length - start);

            cache.read(sector, sector_offset, &mut buf[read_size..read_size + chunk]);
            read_size += chunk;
        }

        read_size
    }

    /// 把 `buf` 写到指定位置，必要时先扩展文件，返回写入的字节数。
    ///
    /// 禁止写入期间不写任何数据；扩展失败时只写到已映射的范围为止。
    pub fn write_at(&self, offset: usize, buf: &[u8]) -> usize {
        if self.inode.deny_write_count.load(Ordering::Acquire) > 0 {
            return 0;
        }
        // 末端溢出的写入必然越过最大文件长度
        let Some(end) = offset.checked_add(buf.len()) else {
            return 0;
        };

        let cache = self.fs.cache();
        let disk_inode = {
            let _lock = self.inode.lock.lock();
            let mut disk_inode = self.disk_inode();

            if !buf.is_empty() && end > disk_inode.length() as usize {
                let new_length = u32::try_from(end).unwrap_or(u32::MAX);
                if let Err(err) =
                    extend::extend(cache, self.fs.allocator(), &mut disk_inode, new_length)
                {
                    debug!("write_at: {:?} cannot grow to {end}: {err}", self.inode.sector);
                }
                // 新长度与指针先于数据落到索引节点上
                cache.map_mut(self.inode.sector, 0, |slot: &mut DiskInode| {
                    *slot = disk_inode.clone()
                });
            }

            disk_inode
        };
        let length = disk_inode.length() as usize;

        let mut written_size = 0;
        while written_size < buf.len() {
            let start = offset + written_size;
            let sector = {
                let _lock = self.inode.lock.lock();
                locate::resolve(cache, &disk_inode, start)
            };
            let Some(sector) = sector else {
                break;
            };

            let sector_offset = start % SECTOR_SIZE;
            let chunk = (buf.len() - written_size)
                .min(SECTOR_SIZE - sector_offset)
                .min(length - start);

            cache.write(sector, sector_offset, &buf[written_size..written_size + chunk]);
            written_size += chunk;
        }

        written_size
    }
}

impl InodeHandle {
    /// 读取磁盘上的索引节点并处理
    fn on_disk<V>(&self, f: impl FnOnce(&DiskInode) -> V) -> V {
        self.fs.cache().map(self.inode.sector, 0, f)
    }

    fn disk_inode(&self) -> DiskInode {
        self.on_disk(DiskInode::clone)
    }
}

impl Clone for InodeHandle {
    fn clone(&self) -> Self {
        self.fs.reopen(&self.inode);
        Self::new(Arc::clone(&self.fs), Arc::clone(&self.inode))
    }
}

impl Drop for InodeHandle {
    fn drop(&mut self) {
        self.fs.close(&self.inode);
    }
}
