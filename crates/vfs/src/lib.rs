#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! FUSE adaptor for the archive engine.
//!
//! [`WadFs`] owns the single [`Archive`] instance for the mount session and
//! translates kernel VFS callbacks into engine calls. The engine itself is
//! path-addressed, so the adaptor keeps an [`inode::InodeTable`] mapping
//! FUSE inode numbers to canonical archive paths; numbers are handed out
//! lazily and never reused, which is sound because the engine supports no
//! unlink or rename.
//!
//! Engine results map onto errno values as follows: a missing path becomes
//! `ENOENT`, a directory where content was expected becomes `EISDIR` (and
//! `ENOTDIR` for the converse), validation failures become `EINVAL`,
//! existing targets become `EEXIST`, and everything the engine cannot
//! represent on disk becomes `EIO`.

use std::ffi::OsStr;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEntry,
    ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use tracing::debug;

use archive::{Archive, ArchiveError};

pub mod inode;

use inode::{InodeTable, ROOT_INO, child_path};

const TTL: Duration = Duration::from_secs(1);

/// Translates an engine error into the errno delivered to the kernel.
#[must_use]
pub fn errno(err: &ArchiveError) -> c_int {
    match err {
        ArchiveError::NotFound(_) => libc::ENOENT,
        ArchiveError::NotContent(_) => libc::EISDIR,
        ArchiveError::NotDirectory(_) => libc::ENOTDIR,
        ArchiveError::AlreadyExists(_) => libc::EEXIST,
        ArchiveError::InvalidName(_) => libc::EINVAL,
        ArchiveError::MarkerMissing(_) | ArchiveError::Io(_) => libc::EIO,
    }
}

/// The mounted filesystem: one engine instance plus the inode table.
#[derive(Debug)]
pub struct WadFs {
    archive: Archive,
    inodes: InodeTable,
}

impl WadFs {
    /// Wraps a loaded archive for mounting.
    #[must_use]
    pub fn new(archive: Archive) -> Self {
        Self {
            archive,
            inodes: InodeTable::new(),
        }
    }

    /// Builds the attribute record for a resolved path, or `None` when the
    /// engine no longer resolves it.
    fn attr_for(&self, ino: u64, path: &str, uid: u32, gid: u32) -> Option<FileAttr> {
        if self.archive.is_directory(path) {
            Some(make_attr(ino, FileType::Directory, 0, 2, uid, gid))
        } else if self.archive.is_content(path) {
            let size = self.archive.size(path).unwrap_or(0);
            Some(make_attr(
                ino,
                FileType::RegularFile,
                u64::from(size),
                1,
                uid,
                gid,
            ))
        } else {
            None
        }
    }

    /// Resolves an inode to its path, or replies `ENOENT` semantics via
    /// the returned `None`.
    fn path_of(&self, ino: u64) -> Option<String> {
        self.inodes.path(ino).map(str::to_owned)
    }

    fn entry_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent_path = self.path_of(parent)?;
        let name = name.to_str()?;
        Some(child_path(&parent_path, name))
    }
}

fn make_attr(ino: u64, kind: FileType, size: u64, nlink: u32, uid: u32, gid: u32) -> FileAttr {
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(512),
        atime: UNIX_EPOCH,
        mtime: UNIX_EPOCH,
        ctime: UNIX_EPOCH,
        crtime: UNIX_EPOCH,
        kind,
        perm: 0o777,
        nlink,
        uid,
        gid,
        rdev: 0,
        blksize: 512,
        flags: 0,
    }
}

impl Filesystem for WadFs {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(path) = self.entry_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        let ino = self.inodes.assign(&path);
        match self.attr_for(ino, &path, req.uid(), req.gid()) {
            Some(attr) => reply.entry(&TTL, &attr, 0),
            None => reply.error(libc::ENOENT),
        }
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.attr_for(ino, &path, req.uid(), req.gid()) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<std::time::SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<std::time::SystemTime>,
        _chgtime: Option<std::time::SystemTime>,
        _bkuptime: Option<std::time::SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        // Timestamps and modes are acknowledged, never stored.
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.attr_for(ino, &path, req.uid(), req.gid()) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
        }
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        if mode & u32::from(libc::S_IFMT) != u32::from(libc::S_IFREG) {
            reply.error(libc::EINVAL);
            return;
        }
        let Some(path) = self.entry_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        if let Err(err) = self.archive.create_file(&path) {
            reply.error(errno(&err));
            return;
        }
        let ino = self.inodes.assign(&path);
        match self.attr_for(ino, &path, req.uid(), req.gid()) {
            Some(attr) => reply.entry(&TTL, &attr, 0),
            // The engine accepted the mutation but no longer resolves the
            // path: surface the inconsistency.
            None => reply.error(libc::EIO),
        }
    }

    fn mkdir(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let Some(path) = self.entry_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        if let Err(err) = self.archive.create_directory(&path) {
            reply.error(errno(&err));
            return;
        }
        let ino = self.inodes.assign(&path);
        match self.attr_for(ino, &path, req.uid(), req.gid()) {
            Some(attr) => reply.entry(&TTL, &attr, 0),
            None => reply.error(libc::EIO),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if self.archive.is_content(&path) {
            reply.opened(0, 0);
        } else if self.archive.is_directory(&path) {
            reply.error(libc::EISDIR);
        } else {
            reply.error(libc::ENOENT);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let mut buf = vec![0u8; size as usize];
        let offset = u64::try_from(offset).unwrap_or(0);
        match self.archive.read(&path, &mut buf, offset) {
            Ok(copied) => reply.data(&buf[..copied]),
            Err(err) => reply.error(errno(&err)),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        debug!(path = %path, bytes = data.len(), offset, "write request");
        let offset = u64::try_from(offset).unwrap_or(0);
        match self.archive.write(&path, data, offset) {
            Ok(written) => reply.written(written as u32),
            Err(err) => reply.error(errno(&err)),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(path) = self.entry_path(parent, name) else {
            reply.error(libc::ENOENT);
            return;
        };
        if let Err(err) = self.archive.create_file(&path) {
            reply.error(errno(&err));
            return;
        }
        let ino = self.inodes.assign(&path);
        match self.attr_for(ino, &path, req.uid(), req.gid()) {
            Some(attr) => reply.created(&TTL, &attr, 0, 0, 0),
            None => reply.error(libc::EIO),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.path_of(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let children = match self.archive.list(&path) {
            Ok(children) => children,
            Err(err) => {
                reply.error(errno(&err));
                return;
            }
        };

        let parent_ino = archive::tree::split_parent(&path)
            .map_or(ROOT_INO, |(parent, _)| self.inodes.assign(parent));

        let mut entries = vec![
            (ino, FileType::Directory, ".".to_owned()),
            (parent_ino, FileType::Directory, "..".to_owned()),
        ];
        for name in children {
            let child = child_path(&path, &name);
            let kind = if self.archive.is_directory(&child) {
                FileType::Directory
            } else {
                FileType::RegularFile
            };
            let child_ino = self.inodes.assign(&child);
            entries.push((child_ino, kind, name));
        }

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(skip) {
            if reply.add(entry_ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }
        reply.ok();
    }
}
