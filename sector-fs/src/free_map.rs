//! 空闲扇区分配器
//!
//! 文件系统只通过 [`SectorAllocator`] 申请与归还单个扇区；
//! [`FreeMap`] 是一个常驻内存的位图实现，位图自身的持久化不归本库管。

use alloc::vec;
use alloc::vec::Vec;

use spin::Mutex;

use crate::SectorId;

/// 扇区分配器特质
pub trait SectorAllocator: Send + Sync {
    /// 分配一个空闲扇区；没有空闲扇区时返回空
    fn allocate(&self) -> Option<SectorId>;
    /// 归还一个已分配的扇区
    fn release(&self, sector: SectorId);
}

/// 位图分配器，管理从 `start` 开始连续的 `capacity` 个扇区
#[derive(Debug)]
pub struct FreeMap {
    start: u32,
    capacity: usize,
    /// 每一位对应一个扇区，1 表示已分配
    groups: Mutex<Vec<u64>>,
}

impl FreeMap {
    pub fn new(start: SectorId, capacity: usize) -> Self {
        let mut groups = vec![0u64; capacity.div_ceil(64)];
        // 末组中超出容量的位视作已分配
        if capacity % 64 != 0 {
            if let Some(last) = groups.last_mut() {
                *last = !0 << (capacity % 64);
            }
        }

        Self {
            start: start.into(),
            capacity,
            groups: Mutex::new(groups),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 剩余的空闲扇区数
    pub fn free_count(&self) -> usize {
        self.groups
            .lock()
            .iter()
            .map(|bits| bits.count_zeros() as usize)
            .sum()
    }

    /// 把位图内的序号编码为扇区号
    #[inline]
    fn encode(&self, group_index: usize, ingroup_index: usize) -> SectorId {
        SectorId::new(self.start + (group_index * 64 + ingroup_index) as u32)
    }

    fn decode(&self, sector: SectorId) -> (usize, usize) {
        let raw: u32 = sector.into();
        assert!(
            raw >= self.start && ((raw - self.start) as usize) < self.capacity,
            "{sector:?} is not managed by this free map"
        );
        let index = (raw - self.start) as usize;
        (index / 64, index % 64)
    }
}

impl SectorAllocator for FreeMap {
    fn allocate(&self) -> Option<SectorId> {
        let mut groups = self.groups.lock();

        // 寻找组内还有 0 的位组
        let (group_index, ingroup_index) = groups
            .iter()
            .enumerate()
            .find_map(|(group_index, &bits)| {
                (bits != u64::MAX).then_some((group_index, bits.trailing_ones() as usize))
            })?;

        groups[group_index] |= 1 << ingroup_index;
        Some(self.encode(group_index, ingroup_index))
    }

    fn release(&self, sector: SectorId) {
        let (group_index, ingroup_index) = self.decode(sector);
        let mut groups = self.groups.lock();

        // 编号一定得有对应的位
        assert_ne!(
            groups[group_index] & (1 << ingroup_index),
            0,
            "double release of {sector:?}"
        );

        groups[group_index] &= !(1 << ingroup_index);
    }
}
