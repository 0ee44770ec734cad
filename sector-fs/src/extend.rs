//! # 扩展层
//!
//! 文件增长时逐个扇区分配、登记并清零，之后才让新长度可见，
//! 因此无论何时读文件都不会读到设备上的陈旧数据。
//! 删除文件时按层级回收它映射的全部扇区和索引块。

use log::{debug, warn};

use crate::layout::{DiskInode, IndexBlock};
use crate::locate::{self, Location};
use crate::{Error, SectorAllocator, SectorCache, SectorId, SECTOR_SIZE};

/// 把文件长度扩展到 `new_length`，新映射的扇区全部清零。
///
/// 中途失败时不回滚：已经登记并清零的扇区保持映射，
/// 长度只推进到已清零的前缀为止，不会超过 `new_length`。
pub fn extend(
    cache: &SectorCache,
    allocator: &dyn SectorAllocator,
    disk_inode: &mut DiskInode,
    new_length: u32,
) -> Result<(), Error> {
    let old_length = disk_inode.length();
    if new_length <= old_length {
        return Ok(());
    }

    let first = old_length as usize / SECTOR_SIZE;
    let last = (new_length as usize - 1) / SECTOR_SIZE;

    for position in first..=last {
        if let Err(err) = map_zeroed(cache, allocator, disk_inode, position) {
            let reached = ((position * SECTOR_SIZE) as u32).max(old_length);
            warn!(
                "extend: stopped at sector #{position} ({err}), length {old_length} -> {reached}"
            );
            disk_inode.set_length(reached);
            return Err(err);
        }
    }

    debug!("extend: length {old_length} -> {new_length}");
    disk_inode.set_length(new_length);
    Ok(())
}

/// 确保文件第 `position` 个扇区已映射；新分配的扇区在登记后立刻清零
fn map_zeroed(
    cache: &SectorCache,
    allocator: &dyn SectorAllocator,
    disk_inode: &mut DiskInode,
    position: usize,
) -> Result<(), Error> {
    let location = locate::locate(position * SECTOR_SIZE);
    if location == Location::OutOfRange {
        return Err(Error::OutOfRange);
    }
    if locate::lookup(cache, disk_inode, location).is_some() {
        return Ok(());
    }

    let sector = allocator.allocate().ok_or(Error::AllocationExhausted)?;
    if let Err(err) = locate::register(cache, allocator, disk_inode, sector, location) {
        allocator.release(sector);
        return Err(err);
    }
    cache.zero(sector);

    Ok(())
}

/// 归还文件映射的所有数据扇区与索引块，返回归还的扇区数。
///
/// 每一层内的分配总是从头连续的，遇到第一个未分配项即停止该层的扫描。
pub fn free_all(
    cache: &SectorCache,
    allocator: &dyn SectorAllocator,
    disk_inode: &DiskInode,
) -> usize {
    let mut released = 0;
    let mut release = |sector: SectorId| {
        allocator.release(sector);
        released += 1;
    };

    disk_inode.directs().for_each(&mut release);

    if let Some(indirect) = disk_inode.indirect() {
        release_index_block(cache, indirect, &mut release);
    }

    if let Some(double_indirect) = disk_inode.double_indirect() {
        let outer = cache.map(double_indirect, 0, IndexBlock::clone);
        for indirect in outer.iter() {
            release_index_block(cache, indirect, &mut release);
        }
        release(double_indirect);
    }

    debug!("free_all: released {released} sectors");
    released
}

/// 归还一级索引块中的数据扇区以及索引块本身
fn release_index_block(
    cache: &SectorCache,
    index_block: SectorId,
    release: &mut impl FnMut(SectorId),
) {
    let block = cache.map(index_block, 0, IndexBlock::clone);
    block.iter().for_each(&mut *release);
    release(index_block);
}
