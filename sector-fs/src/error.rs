use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// 分配器已无空闲扇区
    AllocationExhausted,
    /// 目标位置已经登记过扇区
    DuplicatePointer,
    /// 偏移超出了二级间接索引能表示的范围
    OutOfRange,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::AllocationExhausted => "no free sector left",
            Self::DuplicatePointer => "location is already mapped",
            Self::OutOfRange => "offset beyond the largest file size",
        };
        f.write_str(msg)
    }
}
