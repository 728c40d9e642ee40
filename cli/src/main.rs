use anyhow::Context;
use clap::{Parser, Subcommand};
use log::debug;
use minix_core::Device;
use minix_filesystems::{FamilyOperations, FileType, MinixFamily, MinixReader, StatRecord};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Reads are served one block at a time, so `cat` walks the file in
/// block-aligned chunks of this size.
const CHUNK_SIZE: usize = 1024;

#[derive(Parser)]
#[command(name = "minix")]
#[command(about = "Read-only explorer for Minix v1 file system images", long_about = None)]
struct Cli {
    /// Path to the image file or block device
    image: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show superblock geometry and allocation counts
    Info {
        #[arg(long)]
        json: bool,
    },
    /// Identify the Minix variant without loading the image
    Detect,
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
        /// Show type, permissions, links, owner, size and inode
        #[arg(short, long)]
        long: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show metadata for a path
    Stat {
        path: String,
        #[arg(long)]
        json: bool,
    },
    /// Write a file's contents to stdout
    Cat { path: String },
    /// Walk a tree top-down
    Walk {
        #[arg(default_value = "/")]
        path: String,
        /// Do not descend into directories with this name
        #[arg(long)]
        skip: Vec<String>,
    },
    /// Total size of the files below a path
    Du {
        #[arg(default_value = "/")]
        path: String,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let device = Device::from_image_path(&cli.image)
        .with_context(|| format!("Cannot open image {}", cli.image.display()))?;
    debug!("Using device {} ({} bytes)", device.name, device.size);

    if let Commands::Detect = cli.command {
        let mut file = File::open(&cli.image)?;
        let variant = MinixFamily
            .detect_variant(&mut file)
            .with_context(|| format!("{} is not a Minix file system", device.name))?;
        println!("{}", variant);
        return Ok(());
    }

    let reader = MinixReader::from_device(&device)
        .with_context(|| format!("Cannot load Minix file system from {}", device.name))?;

    match cli.command {
        Commands::Detect => {}
        Commands::Info { json } => {
            let info = reader.info();
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Type:            {}", info.filesystem_type);
                println!("Block size:      {}", info.block_size);
                println!("Zone size:       {}", info.zone_size);
                println!("Inodes:          {} ({} free)", info.total_inodes, info.free_inodes);
                println!("Zones:           {} ({} free)", info.total_zones, info.free_zones);
                println!("First data zone: {}", info.first_data_zone);
                println!("Max file size:   {}", info.max_file_size);
                println!(
                    "State:           {}",
                    if info.cleanly_unmounted { "clean" } else { "not cleanly unmounted" }
                );
            }
        }
        Commands::Ls { path, long, json } => {
            let mut rows = Vec::new();
            for entry in reader.scandir(&path).with_context(|| format!("Cannot list {}", path))? {
                let stat = entry
                    .stat()
                    .with_context(|| format!("Cannot stat {}", entry.path()))?
                    .clone();
                rows.push((entry.name().to_string(), stat));
            }
            rows.sort_by(|a, b| a.0.cmp(&b.0));

            if json {
                let listing: Vec<_> = rows
                    .iter()
                    .map(|(name, stat)| serde_json::json!({ "name": name, "stat": stat }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else if long {
                for (name, stat) in &rows {
                    println!("{} {}", format_long(stat), name);
                }
            } else {
                for (name, _) in &rows {
                    println!("{}", name);
                }
            }
        }
        Commands::Stat { path, json } => {
            let stat = reader.stat(&path).with_context(|| format!("Cannot stat {}", path))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stat)?);
            } else {
                println!("  File: {}", path);
                println!("  Type: {}", stat.file_type.name());
                println!("  Size: {}", stat.size);
                println!(" Inode: {}", stat.inode);
                println!(" Links: {}", stat.links);
                println!("Access: ({:04o}/{})", stat.permissions(), mode_string(&stat));
                println!("   Uid: {}  Gid: {}", stat.uid, stat.gid);
                println!("Modify: {}", stat.modified);
            }
        }
        Commands::Cat { path } => {
            let mut file = reader.open(&path, "rb").with_context(|| format!("Cannot open {}", path))?;
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            loop {
                let chunk = file.read(CHUNK_SIZE).with_context(|| format!("Cannot read {}", path))?;
                if chunk.is_empty() {
                    break;
                }
                out.write_all(&chunk)?;
            }
            file.close();
        }
        Commands::Walk { path, skip } => {
            let mut walk = reader.walk(&path);
            while let Some(step) = walk.next() {
                match step {
                    Ok(entry) => {
                        println!("{}", entry.path);
                        println!("  dirs:  {}", entry.dirs.join(" "));
                        println!("  files: {}", entry.files.join(" "));
                        walk.retain_dirs(|name| !skip.iter().any(|s| s == name));
                    }
                    Err(e) => eprintln!("warning: {}", e),
                }
            }
        }
        Commands::Du { path } => {
            let total = reader
                .disk_usage(&path)
                .with_context(|| format!("Cannot measure {}", path))?;
            println!("{}\t{}", total, path);
        }
    }

    Ok(())
}

/// `ls -l` style columns without the name.
fn format_long(stat: &StatRecord) -> String {
    format!(
        "{} {:>3} {:>5} {:>5} {:>10} {:>6}",
        mode_string(stat),
        stat.links,
        stat.uid,
        stat.gid,
        stat.size,
        stat.inode
    )
}

fn mode_string(stat: &StatRecord) -> String {
    let kind = match stat.file_type {
        FileType::Directory => 'd',
        FileType::Regular => '-',
        FileType::CharDevice => 'c',
        FileType::BlockDevice => 'b',
        FileType::Fifo => 'p',
        FileType::Symlink => 'l',
        FileType::Socket => 's',
        FileType::Unknown => '?',
    };

    let perms = stat.permissions();
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (perms >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}
