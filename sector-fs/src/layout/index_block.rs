use super::INDIRECT_COUNT;
use crate::SectorId;

/// 索引块：整个扇区连续存放扇区指针
#[derive(Debug, Clone, PartialEq, Eq)]
#[repr(C)]
pub struct IndexBlock {
    entries: [u32; INDIRECT_COUNT],
}

impl IndexBlock {
    /// 所有项都未分配的索引块
    pub const EMPTY: Self = Self {
        entries: [SectorId::SENTINEL; INDIRECT_COUNT],
    };

    #[inline]
    pub fn get(&self, index: usize) -> Option<SectorId> {
        SectorId::decode(self.entries[index])
    }

    #[inline]
    pub fn set(&mut self, index: usize, sector: Option<SectorId>) {
        self.entries[index] = SectorId::encode(sector);
    }

    /// 从头开始连续分配的项
    pub fn iter(&self) -> impl Iterator<Item = SectorId> + '_ {
        self.entries.iter().map_while(|&raw| SectorId::decode(raw))
    }
}
