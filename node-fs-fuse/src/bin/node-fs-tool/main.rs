mod cli;

use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use block_dev::BlockDevice;
use clap::Parser;
use node_fs::{BLOCK_SIZE, Config, NodeKind, ROOT_ID, TOTAL_SECTORS, Volume};
use node_fs_fuse::BlockFile;
use typed_bytesize::ByteSizeIec;

use self::cli::{Cli, Command};

fn main() -> io::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = Config {
        cache_capacity: cli.cache,
    };

    let mut options = OpenOptions::new();
    options.read(true).write(true);
    let fd = if let Command::Format { size_mib } = cli.command {
        // 空白镜像在挂载时被格式化
        let min_size = TOTAL_SECTORS as u64 * BLOCK_SIZE as u64;
        let disk_size = ByteSizeIec::mib(size_mib).0.max(min_size);
        let fd = options.create(true).truncate(true).open(&cli.image)?;
        fd.set_len(disk_size)?;
        fd
    } else {
        options.open(&cli.image)?
    };

    let block_dev: Arc<dyn BlockDevice> = Arc::new(BlockFile::new(fd));
    let mut volume = Volume::mount_with(block_dev, config).map_err(fs_err)?;

    run(&mut volume, cli.command).map_err(fs_err)
}

fn run(volume: &mut Volume, command: Command) -> node_fs::Result<()> {
    match command {
        Command::Format { .. } => {
            volume.sync()?;
            let disk = volume.disk_stats();
            println!("formatted: {} KiB used of {} KiB", disk.used_kb, disk.total_kb);
        }
        Command::Ls { path } => {
            let id = volume.resolve(&path, ROOT_ID)?;
            if volume.stat(id)?.kind == NodeKind::Directory {
                for entry in volume.read_dir(id)? {
                    print_entry(volume, entry.id, &entry.name)?;
                }
            } else {
                print_entry(volume, id, &path)?;
            }
        }
        Command::Tree => {
            println!("/");
            print_tree(volume, ROOT_ID, 1)?;
        }
        Command::Mkdir { path } => {
            volume.create_at(&path, ROOT_ID, NodeKind::Directory)?;
            volume.sync()?;
        }
        Command::Touch { path } => {
            if let Err(node_fs::Error::NotFound) = volume.resolve(&path, ROOT_ID) {
                volume.create_at(&path, ROOT_ID, NodeKind::File)?;
            }
            volume.sync()?;
        }
        Command::Write { path, text } => {
            let id = match volume.resolve(&path, ROOT_ID) {
                Ok(id) => id,
                Err(node_fs::Error::NotFound) => volume.create_at(&path, ROOT_ID, NodeKind::File)?,
                Err(err) => return Err(err),
            };
            volume.truncate(id)?;
            let written = volume.write_at(id, 0, text.as_bytes())?;
            if written < text.len() {
                log::warn!("{path}: only the first {written} of {} bytes fit", text.len());
            }
            volume.sync()?;
        }
        Command::Cat { path } => {
            let id = volume.resolve(&path, ROOT_ID)?;
            let mut buf = vec![0; volume.stat(id)?.size];
            let len = volume.read_at(id, 0, &mut buf)?;
            println!("{}", String::from_utf8_lossy(&buf[..len]));
        }
        Command::Rm { path } => {
            let id = volume.resolve(&path, ROOT_ID)?;
            volume.delete(id)?;
            volume.sync()?;
        }
        Command::Df => {
            let disk = volume.disk_stats();
            let cache = volume.cache_stats();
            let sb = volume.super_block();
            println!(
                "disk:  {} KiB total, {} KiB used, {} KiB free",
                disk.total_kb, disk.used_kb, disk.free_kb
            );
            println!("nodes: {} in use, next id {}", sb.total_nodes, sb.next_free_id);
            println!(
                "cache: {}/{} slots, {} dirty",
                cache.cached, cache.capacity, cache.dirty
            );
        }
    }

    Ok(())
}

fn print_entry(volume: &mut Volume, id: u32, name: &str) -> node_fs::Result<()> {
    let stat = volume.stat(id)?;
    match stat.kind {
        NodeKind::Directory => println!("d {:>5} {name}/", stat.children),
        NodeKind::File => println!("- {:>5} {name}", stat.size),
    }
    Ok(())
}

fn print_tree(volume: &mut Volume, dir: u32, depth: usize) -> node_fs::Result<()> {
    for entry in volume.read_dir(dir)? {
        let indent = "  ".repeat(depth);
        match entry.kind {
            NodeKind::Directory => {
                println!("{indent}{}/", entry.name);
                print_tree(volume, entry.id, depth + 1)?;
            }
            NodeKind::File => println!("{indent}{}", entry.name),
        }
    }
    Ok(())
}

fn fs_err(err: node_fs::Error) -> io::Error {
    io::Error::other(err.to_string())
}
