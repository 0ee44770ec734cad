mod common;

use common::{setup, Setup};
use sector_fs::extend::free_all;
use sector_fs::layout::{DiskInode, InodeKind};
use sector_fs::locate::{locate, lookup, register, resolve, Location};
use sector_fs::{Error, SectorAllocator, SectorId, SECTOR_SIZE};

fn at(position: usize) -> Location {
    locate(position * SECTOR_SIZE)
}

#[test]
fn register_then_resolve_in_every_tier() {
    let Setup { fs, free_map, .. } = setup(64);
    let cache = fs.cache();
    let mut disk_inode = DiskInode::new(InodeKind::File);

    let direct = free_map.allocate().unwrap();
    let indirect = free_map.allocate().unwrap();
    let double = free_map.allocate().unwrap();
    register(cache, fs.allocator(), &mut disk_inode, direct, at(3)).unwrap();
    register(cache, fs.allocator(), &mut disk_inode, indirect, at(124)).unwrap();
    register(cache, fs.allocator(), &mut disk_inode, double, at(252 + 128 + 5)).unwrap();

    // 一级索引块 1 个，二级索引 2 个
    assert!(disk_inode.indirect().is_some());
    assert!(disk_inode.double_indirect().is_some());
    assert_eq!(63 - 3 - 3, free_map.free_count());

    assert_eq!(Some(direct), lookup(cache, &disk_inode, at(3)));
    assert_eq!(Some(indirect), lookup(cache, &disk_inode, at(124)));
    assert_eq!(Some(double), lookup(cache, &disk_inode, at(385)));
    assert_eq!(None, lookup(cache, &disk_inode, at(125)));
    assert_eq!(None, lookup(cache, &disk_inode, at(252)));

    // 超出长度的偏移一律未映射
    assert_eq!(None, resolve(cache, &disk_inode, 3 * SECTOR_SIZE));
    disk_inode.set_length((386 * SECTOR_SIZE) as u32);
    assert_eq!(Some(direct), resolve(cache, &disk_inode, 3 * SECTOR_SIZE + 17));
    assert_eq!(Some(indirect), resolve(cache, &disk_inode, 124 * SECTOR_SIZE));
    assert_eq!(Some(double), resolve(cache, &disk_inode, 385 * SECTOR_SIZE + 511));
    assert_eq!(None, resolve(cache, &disk_inode, 4 * SECTOR_SIZE));
    assert_eq!(None, resolve(cache, &disk_inode, 386 * SECTOR_SIZE));
}

#[test]
fn register_rejects_mapped_locations() {
    let Setup { fs, free_map, .. } = setup(64);
    let cache = fs.cache();
    let mut disk_inode = DiskInode::new(InodeKind::File);

    for location in [at(0), at(200), at(300)] {
        let first = free_map.allocate().unwrap();
        let second = free_map.allocate().unwrap();
        register(cache, fs.allocator(), &mut disk_inode, first, location).unwrap();
        assert_eq!(
            Err(Error::DuplicatePointer),
            register(cache, fs.allocator(), &mut disk_inode, second, location)
        );
        assert_eq!(Some(first), lookup(cache, &disk_inode, location));
    }
}

#[test]
fn register_out_of_range() {
    let Setup { fs, .. } = setup(8);
    let mut disk_inode = DiskInode::new(InodeKind::File);
    assert_eq!(
        Err(Error::OutOfRange),
        register(
            fs.cache(),
            fs.allocator(),
            &mut disk_inode,
            SectorId::new(3),
            Location::OutOfRange
        )
    );
}

#[test]
fn index_block_allocation_failure_leaves_entry_unmapped() {
    let Setup { fs, free_map, .. } = setup(3);
    let cache = fs.cache();
    let mut disk_inode = DiskInode::new(InodeKind::File);

    let a = free_map.allocate().unwrap();
    let b = free_map.allocate().unwrap();
    assert_eq!(None, free_map.allocate());

    register(cache, fs.allocator(), &mut disk_inode, a, at(0)).unwrap();
    assert_eq!(
        Err(Error::AllocationExhausted),
        register(cache, fs.allocator(), &mut disk_inode, b, at(130))
    );
    assert_eq!(None, disk_inode.indirect());
    assert_eq!(None, lookup(cache, &disk_inode, at(130)));
}

#[test]
fn inner_index_block_failure_keeps_outer_reclaimable() {
    let Setup { fs, free_map, .. } = setup(3);
    let cache = fs.cache();
    let mut disk_inode = DiskInode::new(InodeKind::File);

    // 只剩一个空闲扇区：二级索引块分配成功，其下的一级索引块分配失败
    let data = free_map.allocate().unwrap();
    assert_eq!(1, free_map.free_count());
    assert_eq!(
        Err(Error::AllocationExhausted),
        register(cache, fs.allocator(), &mut disk_inode, data, at(252))
    );
    assert_eq!(0, free_map.free_count());
    assert!(disk_inode.double_indirect().is_some());
    assert_eq!(None, lookup(cache, &disk_inode, at(252)));

    assert_eq!(1, free_all(cache, fs.allocator(), &disk_inode));
    assert_eq!(1, free_map.free_count());
}
