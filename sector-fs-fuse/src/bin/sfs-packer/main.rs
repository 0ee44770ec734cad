mod cli;

use std::fs;
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use clap::Parser;
use cli::Cli;
use sector_fs::{FreeMap, InodeKind, SectorFs, SectorId, SECTOR_SIZE};
use sector_fs_fuse::BlockFile;

fn main() -> io::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}\nsectors={}", cli.source, cli.sectors);

    let block_file = Arc::new(BlockFile::new({
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(cli.out_dir.join("fs.img"))?;
        fd.set_len((cli.sectors * SECTOR_SIZE) as u64)?;

        fd
    }));

    // 0 号扇区留给镜像头，其余交给位图
    let sectors = block_file.sectors()?;
    let free_map = Arc::new(FreeMap::new(SectorId::new(1), sectors.saturating_sub(1)));
    let fs = SectorFs::new(block_file, free_map.clone());

    for entry in fs::read_dir(&cli.source)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let data = fs::read(entry.path())?;
        let too_large = || io::Error::new(io::ErrorKind::InvalidInput, "file too large");
        let length = u32::try_from(data.len()).map_err(|_| too_large())?;

        let sector = fs
            .create_inode(length, InodeKind::File)
            .map_err(|err| io::Error::other(err.to_string()))?;
        let inode = fs.open(sector);
        if inode.write_at(0, &data) != data.len() {
            return Err(too_large());
        }

        let mut readback = vec![0; data.len()];
        inode.read_at(0, &mut readback);
        assert_eq!(data, readback, "{:?} did not survive packing", entry.path());

        println!("file: {:?} -> inode {}", entry.file_name(), u32::from(sector));
        log::info!("packed {:?} into {sector:?}", entry.path());
    }

    fs.flush();
    log::info!(
        "{} of {} sectors left free",
        free_map.free_count(),
        free_map.capacity()
    );
    Ok(())
}
