use core::mem;

use super::DIRECT_COUNT;
use crate::{SectorId, INODE_MAGIC, SECTOR_SIZE};

/// 磁盘上的索引节点，恰好占满一个扇区
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct DiskInode {
    /// 文件长度（字节）
    length: u32,
    magic: u16,
    /// 0 为普通文件，其余为目录
    kind: u16,
    /// 直接指针，依次映射文件的前 DIRECT_COUNT 个扇区
    direct: [u32; DIRECT_COUNT],
    /// 指向一级索引块
    indirect: u32,
    /// 指向二级索引块，其中每项再指向一个一级索引块
    double_indirect: u32,
}

const _: () = assert!(mem::size_of::<DiskInode>() == SECTOR_SIZE);

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum InodeKind {
    #[default]
    File,
    Directory,
}

impl DiskInode {
    /// 长度为 0、所有指针都未分配的新索引节点
    pub fn new(kind: InodeKind) -> Self {
        Self {
            length: 0,
            magic: INODE_MAGIC,
            kind: match kind {
                InodeKind::File => 0,
                InodeKind::Directory => 1,
            },
            direct: [SectorId::SENTINEL; DIRECT_COUNT],
            indirect: SectorId::SENTINEL,
            double_indirect: SectorId::SENTINEL,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == INODE_MAGIC
    }

    #[inline]
    pub fn kind(&self) -> InodeKind {
        if self.kind == 0 {
            InodeKind::File
        } else {
            InodeKind::Directory
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind() == InodeKind::Directory
    }

    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    #[inline]
    pub fn set_length(&mut self, length: u32) {
        self.length = length;
    }

    #[inline]
    pub fn direct(&self, index: usize) -> Option<SectorId> {
        SectorId::decode(self.direct[index])
    }

    #[inline]
    pub fn set_direct(&mut self, index: usize, sector: Option<SectorId>) {
        self.direct[index] = SectorId::encode(sector);
    }

    #[inline]
    pub fn indirect(&self) -> Option<SectorId> {
        SectorId::decode(self.indirect)
    }

    #[inline]
    pub fn set_indirect(&mut self, sector: Option<SectorId>) {
        self.indirect = SectorId::encode(sector);
    }

    #[inline]
    pub fn double_indirect(&self) -> Option<SectorId> {
        SectorId::decode(self.double_indirect)
    }

    #[inline]
    pub fn set_double_indirect(&mut self, sector: Option<SectorId>) {
        self.double_indirect = SectorId::encode(sector);
    }

    /// 从头开始连续分配的直接指针
    pub fn directs(&self) -> impl Iterator<Item = SectorId> + '_ {
        self.direct.iter().map_while(|&raw| SectorId::decode(raw))
    }
}
