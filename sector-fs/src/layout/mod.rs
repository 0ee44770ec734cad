//! # 磁盘数据结构层
//!
//! 每个索引节点独占一个扇区：
//! 长度 | 魔数 | 类型 | 124 个直接指针 | 一级索引块指针 | 二级索引块指针
//!
//! 索引块同样独占一个扇区，连续存放 128 个扇区指针。
//! 所有指针都以全 1 表示未分配。

mod index_block;
mod inode;

pub use self::{
    index_block::IndexBlock,
    inode::{DiskInode, InodeKind},
};

use crate::SECTOR_SIZE;

/// 直接指针个数
pub const DIRECT_COUNT: usize = 124;
/// 索引块的指针容量
pub const INDIRECT_COUNT: usize = SECTOR_SIZE / 4;
/// 二级索引能编号的扇区数
pub const DOUBLE_INDIRECT_COUNT: usize = INDIRECT_COUNT * INDIRECT_COUNT;
/// 单个文件最多能映射的数据扇区数
pub const MAX_FILE_SECTORS: usize = DIRECT_COUNT + INDIRECT_COUNT + DOUBLE_INDIRECT_COUNT;

/// 能够直接映射到扇区缓冲区上的数据结构。
///
/// # Safety
///
/// 实现者须为 `repr(C)`，大小不超过一个扇区，对齐不超过扇区缓冲区的对齐，
/// 且任意位模式都是合法值。
pub(crate) unsafe trait Pod: Sized {}

unsafe impl Pod for DiskInode {}
unsafe impl Pod for IndexBlock {}

#[cfg(test)]
mod tests {
    use core::mem;

    use super::*;

    #[test]
    fn records_fill_one_sector() {
        assert_eq!(SECTOR_SIZE, mem::size_of::<DiskInode>());
        assert_eq!(SECTOR_SIZE, mem::size_of::<IndexBlock>());
        assert_eq!(16_636, MAX_FILE_SECTORS);
    }
}
