//! 扇区号的抽象

use derive_more::Into;

/// 磁盘上的扇区号。
///
/// 磁盘布局里“未分配”用全 1 的哨兵值表示，
/// 内存中一律以 `Option<SectorId>` 表达，哨兵值不会成为一个 `SectorId`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Into)]
#[repr(transparent)]
pub struct SectorId(u32);

impl SectorId {
    /// 磁盘上表示“未分配”的指针值
    pub(crate) const SENTINEL: u32 = u32::MAX;

    #[inline]
    pub const fn new(raw: u32) -> Self {
        assert!(raw != Self::SENTINEL);
        Self(raw)
    }

    /// 解码磁盘上的指针
    #[inline]
    pub(crate) fn decode(raw: u32) -> Option<Self> {
        (raw != Self::SENTINEL).then_some(Self(raw))
    }

    /// 编码为磁盘上的指针
    #[inline]
    pub(crate) fn encode(sector: Option<Self>) -> u32 {
        sector.map_or(Self::SENTINEL, |sector| sector.0)
    }

    /// 块设备层使用的编号
    #[inline]
    pub fn block(self) -> usize {
        self.0 as usize
    }
}
