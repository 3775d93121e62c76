//! Mount a WAD archive as a FUSE filesystem.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use fuser::MountOption;
use tracing::info;
use tracing_subscriber::EnvFilter;

use archive::Archive;
use vfs::WadFs;

#[derive(Debug, Parser)]
#[command(
    name = "wadfs",
    version,
    about = "Mount a legacy WAD game archive as a read/write filesystem"
)]
struct Args {
    /// Archive file to mount.
    archive: PathBuf,

    /// Directory to mount the filesystem on.
    mountpoint: PathBuf,

    /// Allow other users to access the mounted filesystem.
    #[arg(long)]
    allow_other: bool,

    /// Unmount automatically when the process exits.
    #[arg(long)]
    auto_unmount: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let wad = match Archive::load(&args.archive) {
        Ok(wad) => wad,
        Err(err) => {
            eprintln!("wadfs: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!(archive = %args.archive.display(), "archive loaded");

    let mut options = vec![MountOption::RW, MountOption::FSName("wadfs".to_owned())];
    if args.allow_other {
        options.push(MountOption::AllowOther);
    }
    if args.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }

    if let Err(err) = fuser::mount2(WadFs::new(wad), &args.mountpoint, &options) {
        eprintln!("wadfs: mount failed: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
