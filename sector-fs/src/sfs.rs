//! # 文件系统层
//!
//! 把扇区缓存、空闲扇区分配器和已打开索引节点表组装在一起。
//! 目录与命名不归本层管，调用者直接以索引节点所在的扇区号指称文件。

use alloc::sync::Arc;

use block_dev::BlockDevice;
use hashbrown::HashMap;
use log::debug;
use spin::Mutex;

use crate::extend;
use crate::inode::Inode;
use crate::layout::{DiskInode, InodeKind};
use crate::{Error, InodeHandle, SectorAllocator, SectorCache, SectorId};

pub struct SectorFs {
    cache: SectorCache,
    allocator: Arc<dyn SectorAllocator>,
    /// 已打开的索引节点，同一扇区只对应一个 `Inode`
    open_inodes: Mutex<HashMap<SectorId, Arc<Inode>>>,
}

impl SectorFs {
    pub fn new(device: Arc<dyn BlockDevice>, allocator: Arc<dyn SectorAllocator>) -> Arc<Self> {
        Arc::new(Self {
            cache: SectorCache::new(device),
            allocator,
            open_inodes: Mutex::new(HashMap::new()),
        })
    }

    /// 在 `sector` 上写入一个长度为 `length` 的新索引节点，数据全部为 0。
    ///
    /// 失败时归还本次分配的数据扇区，`sector` 本身仍归调用者处理。
    pub fn create(&self, sector: SectorId, length: u32, kind: InodeKind) -> Result<(), Error> {
        let mut disk_inode = DiskInode::new(kind);

        // 新索引节点还没有落盘，部分扩展出的扇区只能由这里回收
        if let Err(err) = extend::extend(&self.cache, self.allocator(), &mut disk_inode, length) {
            extend::free_all(&self.cache, self.allocator(), &disk_inode);
            return Err(err);
        }

        self.cache.map_mut(sector, 0, |slot: &mut DiskInode| *slot = disk_inode);
        debug!("create: {kind:?} inode at {sector:?}, length {length}");
        Ok(())
    }

    /// 分配一个扇区并在上面创建索引节点，失败时归还该扇区
    pub fn create_inode(&self, length: u32, kind: InodeKind) -> Result<SectorId, Error> {
        let sector = self
            .allocator
            .allocate()
            .ok_or(Error::AllocationExhausted)?;

        match self.create(sector, length, kind) {
            Ok(()) => Ok(sector),
            Err(err) => {
                self.allocator.release(sector);
                Err(err)
            }
        }
    }

    /// 打开 `sector` 上的索引节点；已打开的直接复用并增加计数
    pub fn open(self: &Arc<Self>, sector: SectorId) -> InodeHandle {
        let inode = {
            let mut open_inodes = self.open_inodes.lock();
            let inode = open_inodes
                .entry(sector)
                .or_insert_with(|| Arc::new(Inode::new(sector)));
            inode.acquire();
            Arc::clone(inode)
        };

        InodeHandle::new(Arc::clone(self), inode)
    }

    /// 当前是否有 `sector` 上索引节点的句柄
    pub fn is_open(&self, sector: SectorId) -> bool {
        self.open_inodes.lock().contains_key(&sector)
    }

    /// 把缓存中的脏扇区全部写回设备
    pub fn flush(&self) {
        self.cache.flush_all();
    }

    #[inline]
    pub fn cache(&self) -> &SectorCache {
        &self.cache
    }

    #[inline]
    pub fn allocator(&self) -> &dyn SectorAllocator {
        self.allocator.as_ref()
    }

    pub(crate) fn reopen(&self, inode: &Inode) {
        let _open_inodes = self.open_inodes.lock();
        inode.acquire();
    }

    /// 最后一个句柄关闭时移出打开表；若已被删除，回收它的全部扇区
    pub(crate) fn close(&self, inode: &Inode) {
        {
            let mut open_inodes = self.open_inodes.lock();
            if !inode.release() {
                return;
            }
            open_inodes.remove(&inode.sector());
        }

        if inode.is_removed() {
            let disk_inode = self.cache.map(inode.sector(), 0, DiskInode::clone);
            debug_assert!(disk_inode.is_valid(), "{:?} is not an inode", inode.sector());
            let released = extend::free_all(&self.cache, self.allocator(), &disk_inode);
            self.allocator.release(inode.sector());
            debug!(
                "close: reclaimed {:?} and {released} sectors it mapped",
                inode.sector()
            );
        }
    }
}
