//! # 定位层
//!
//! 文件的第 p 个扇区（p = 字节偏移 / SECTOR_SIZE）按序落在三级指针里：
//!
//! - `p < 124`：直接指针 `direct[p]`；
//! - `124 <= p < 252`：一级索引块的第 `p - 124` 项；
//! - `252 <= p < 252 + 128 * 128`：二级索引块的第 `(p - 252) / 128` 项所指一级索引块的
//!   第 `(p - 252) % 128` 项。
//!
//! 索引块只在首次用到时分配，新索引块的每一项都是哨兵值。

use log::warn;

use crate::layout::{DiskInode, IndexBlock, DIRECT_COUNT, INDIRECT_COUNT, MAX_FILE_SECTORS};
use crate::{Error, SectorAllocator, SectorCache, SectorId, SECTOR_SIZE};

/// 文件内扇区在三级指针中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Direct(usize),
    Indirect(usize),
    DoubleIndirect { outer: usize, inner: usize },
    OutOfRange,
}

/// 把字节偏移翻译为它所在扇区的位置
pub fn locate(offset: usize) -> Location {
    let position = offset / SECTOR_SIZE;

    if position < DIRECT_COUNT {
        Location::Direct(position)
    } else if position < DIRECT_COUNT + INDIRECT_COUNT {
        Location::Indirect(position - DIRECT_COUNT)
    } else if position < MAX_FILE_SECTORS {
        // 剔去直接指针与一级索引的部分
        let index = position - DIRECT_COUNT - INDIRECT_COUNT;
        Location::DoubleIndirect {
            outer: index / INDIRECT_COUNT,
            inner: index % INDIRECT_COUNT,
        }
    } else {
        Location::OutOfRange
    }
}

/// 返回文件内 `offset` 处字节所在的扇区；超出文件长度或未分配时返回空
pub fn resolve(cache: &SectorCache, disk_inode: &DiskInode, offset: usize) -> Option<SectorId> {
    if offset >= disk_inode.length() as usize {
        return None;
    }
    lookup(cache, disk_inode, locate(offset))
}

/// 沿指针链查找 `location` 处登记的扇区，不考虑文件长度
pub fn lookup(cache: &SectorCache, disk_inode: &DiskInode, location: Location) -> Option<SectorId> {
    match location {
        Location::Direct(index) => disk_inode.direct(index),
        Location::Indirect(index) => {
            let indirect = disk_inode.indirect()?;
            cache.map(indirect, 0, |block: &IndexBlock| block.get(index))
        }
        Location::DoubleIndirect { outer, inner } => {
            let double_indirect = disk_inode.double_indirect()?;
            let indirect = cache.map(double_indirect, 0, |block: &IndexBlock| block.get(outer))?;
            cache.map(indirect, 0, |block: &IndexBlock| block.get(inner))
        }
        Location::OutOfRange => None,
    }
}

/// 把 `sector` 登记到 `location`。
///
/// 需要的索引块会即时分配并落到缓存里，指向它们的指针写进 `disk_inode`，
/// 由调用者负责把 `disk_inode` 写回。目标位置已有扇区时拒绝覆盖。
pub fn register(
    cache: &SectorCache,
    allocator: &dyn SectorAllocator,
    disk_inode: &mut DiskInode,
    sector: SectorId,
    location: Location,
) -> Result<(), Error> {
    match location {
        Location::Direct(index) => {
            if let Some(existing) = disk_inode.direct(index) {
                return Err(duplicate(location, existing));
            }
            disk_inode.set_direct(index, Some(sector));
            Ok(())
        }
        Location::Indirect(index) => {
            let indirect = match disk_inode.indirect() {
                Some(indirect) => indirect,
                None => {
                    let indirect = alloc_index_block(cache, allocator)?;
                    disk_inode.set_indirect(Some(indirect));
                    indirect
                }
            };
            bind(cache, indirect, index, sector, location)
        }
        Location::DoubleIndirect { outer, inner } => {
            let double_indirect = match disk_inode.double_indirect() {
                Some(double_indirect) => double_indirect,
                None => {
                    let double_indirect = alloc_index_block(cache, allocator)?;
                    disk_inode.set_double_indirect(Some(double_indirect));
                    double_indirect
                }
            };

            let entry = cache.map(double_indirect, 0, |block: &IndexBlock| block.get(outer));
            let indirect = match entry {
                Some(indirect) => indirect,
                None => {
                    let indirect = alloc_index_block(cache, allocator)?;
                    cache.map_mut(double_indirect, 0, |block: &mut IndexBlock| {
                        block.set(outer, Some(indirect))
                    });
                    indirect
                }
            };
            bind(cache, indirect, inner, sector, location)
        }
        Location::OutOfRange => Err(Error::OutOfRange),
    }
}

/// 分配一个索引块并把所有项置为未分配
fn alloc_index_block(
    cache: &SectorCache,
    allocator: &dyn SectorAllocator,
) -> Result<SectorId, Error> {
    let sector = allocator.allocate().ok_or(Error::AllocationExhausted)?;
    cache.map_mut(sector, 0, |block: &mut IndexBlock| *block = IndexBlock::EMPTY);
    Ok(sector)
}

fn bind(
    cache: &SectorCache,
    index_block: SectorId,
    index: usize,
    sector: SectorId,
    location: Location,
) -> Result<(), Error> {
    cache.map_mut(index_block, 0, |block: &mut IndexBlock| match block.get(index) {
        Some(existing) => Err(duplicate(location, existing)),
        None => {
            block.set(index, Some(sector));
            Ok(())
        }
    })
}

#[cold]
fn duplicate(location: Location, existing: SectorId) -> Error {
    warn!("register: {location:?} already maps {existing:?}");
    Error::DuplicatePointer
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(position: usize) -> Location {
        locate(position * SECTOR_SIZE)
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(Location::Direct(0), at(0));
        assert_eq!(Location::Direct(123), at(123));
        assert_eq!(Location::Indirect(0), at(124));
        assert_eq!(Location::Indirect(127), at(251));
        assert_eq!(Location::DoubleIndirect { outer: 0, inner: 0 }, at(252));
        assert_eq!(Location::DoubleIndirect { outer: 0, inner: 127 }, at(379));
        assert_eq!(Location::DoubleIndirect { outer: 1, inner: 0 }, at(380));
        assert_eq!(
            Location::DoubleIndirect {
                outer: 127,
                inner: 127
            },
            at(252 + 128 * 128 - 1)
        );
        assert_eq!(Location::OutOfRange, at(252 + 128 * 128));
    }

    #[test]
    fn offsets_within_a_sector_share_a_location() {
        assert_eq!(Location::Direct(0), locate(SECTOR_SIZE - 1));
        assert_eq!(Location::Direct(1), locate(SECTOR_SIZE));
        assert_eq!(Location::Indirect(0), locate(124 * SECTOR_SIZE + 300));
    }
}
