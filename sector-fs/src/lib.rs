#![cfg_attr(not(test), no_std)]

extern crate alloc;

/* sector-fs 的整体架构，自上而下 */

// 索引节点层：打开、关闭、删除以及按字节读写文件
mod inode;

// 文件系统层：持有缓存、分配器和已打开的索引节点表
mod sfs;

// 扩展层：按需为文件分配扇区并清零，删除时回收全部扇区
pub mod extend;

// 定位层：字节偏移到扇区号的翻译
pub mod locate;

// 磁盘数据结构层：索引节点与索引块
pub mod layout;

// 空闲扇区分配器
mod free_map;

// 扇区缓存层：内存上的扇区数据缓存
mod block_cache;

mod error;
mod sector;

pub use block_dev::BlockDevice;

pub use self::{
    block_cache::SectorCache,
    error::Error,
    free_map::{FreeMap, SectorAllocator},
    inode::{InodeHandle, Stat, StatKind},
    layout::InodeKind,
    sector::SectorId,
    sfs::SectorFs,
};

/// 标识合法的磁盘索引节点
pub const INODE_MAGIC: u16 = 0x494e;
pub const SECTOR_SIZE: usize = 512;
/// 扇区缓存的槽位数
pub const CACHE_SLOTS: usize = 64;
