use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use squashfs::scan::scan_superblocks;
use squashfs::tree::Node;
use squashfs::Squashfs;

#[derive(Parser, Debug)]
#[command(version, about = "Inspect and extract SquashFS 4.0 images")]
struct Cli {
    /// Byte offset of the image within the file, for images embedded in a larger blob.
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Format timestamps in UTC rather than local time.
    #[arg(long)]
    utc: bool,

    /// Show the timestamp's time zone alongside the formatted time.
    #[arg(long)]
    showtz: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the directory tree.
    List { path: PathBuf },
    /// Extract regular files and symlinks under `dest`.
    Extract { path: PathBuf, dest: PathBuf },
    /// Scan for embedded superblocks.
    Scan {
        path: PathBuf,
        #[arg(long)]
        chunk_size: Option<usize>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("squashfs: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Command::List { path } => list(path, cli.offset),
        Command::Extract { path, dest } => extract(path, cli.offset, dest),
        Command::Scan { path, chunk_size } => scan(path, *chunk_size),
    }
}

fn open_image(path: &PathBuf, offset: u64) -> Result<Squashfs<BufReader<File>>, Box<dyn std::error::Error>> {
    let file = File::open(path)?;
    Ok(Squashfs::open(BufReader::new(file), offset)?)
}

fn list(path: &PathBuf, offset: u64) -> Result<(), Box<dyn std::error::Error>> {
    let fs = open_image(path, offset)?;
    println!("/");
    for (name, _) in fs.riter(&fs.root()) {
        println!("/{}", String::from_utf8_lossy(&name));
    }
    Ok(())
}

fn extract(path: &PathBuf, offset: u64, dest: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let fs = open_image(path, offset)?;
    fs::create_dir_all(dest)?;
    for (name, node) in fs.riter(&fs.root()) {
        let out_path = dest.join(String::from_utf8_lossy(&name).as_ref());
        match node {
            Node::Directory(_) => {
                fs::create_dir_all(&out_path)?;
            }
            Node::Leaf { inode, .. } => {
                if let Some(parent) = out_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                match &inode.variant {
                    squashfs::inode::InodeVariant::Symlink { target, .. }
                    | squashfs::inode::InodeVariant::LSymlink { target, .. } => {
                        #[cfg(unix)]
                        std::os::unix::fs::symlink(String::from_utf8_lossy(target).as_ref(), &out_path)?;
                        #[cfg(not(unix))]
                        fs::write(&out_path, target)?;
                    }
                    squashfs::inode::InodeVariant::Regular { .. }
                    | squashfs::inode::InodeVariant::LRegular { .. } => {
                        let content = fs.read_file(&inode)?;
                        fs::write(&out_path, content)?;
                    }
                    _ => {
                        // device nodes, fifos, sockets: the core exposes their metadata but this
                        // CLI does not materialize them on the host filesystem.
                    }
                }
            }
        }
    }
    Ok(())
}

fn scan(path: &PathBuf, chunk_size: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = BufReader::new(File::open(path)?);
    let chunk_size = chunk_size.unwrap_or(squashfs::scan::DEFAULT_CHUNK_SIZE);
    let hits = scan_superblocks(&mut file, chunk_size)?;
    for (offset, sb) in hits {
        println!("{offset:#x}: {sb:?}");
    }
    Ok(())
}
