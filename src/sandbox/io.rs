use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};

#[cfg(unix)]
fn is_symlink_open_error(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_symlink_open_error(_err: &std::io::Error) -> bool {
    false
}

#[cfg(unix)]
fn open_readonly_nofollow(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = fs::OpenOptions::new();
    options
        .read(true)
        .custom_flags(libc::O_NOFOLLOW | libc::O_NONBLOCK);
    options.open(path)
}

#[cfg(windows)]
fn open_readonly_nofollow(path: &Path) -> std::io::Result<fs::File> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_FLAG_OPEN_REPARSE_POINT: u32 = 0x0020_0000;

    let mut options = fs::OpenOptions::new();
    options
        .read(true)
        .custom_flags(FILE_FLAG_OPEN_REPARSE_POINT);
    options.open(path)
}

#[cfg(all(not(unix), not(windows)))]
fn open_readonly_nofollow(path: &Path) -> std::io::Result<fs::File> {
    fs::File::open(path)
}

/// Opens a regular file without following a final symlink.
///
/// `path` is expected to be canonical already; `relative` is what error messages show.
pub(crate) fn open_regular_file_for_read(
    path: &Path,
    relative: &Path,
) -> Result<(fs::File, fs::Metadata)> {
    let file = open_readonly_nofollow(path).map_err(|err| {
        if is_symlink_open_error(&err) {
            return Error::InvalidPath(format!("path {} is a symlink", relative.display()));
        }
        if err.kind() == std::io::ErrorKind::NotFound {
            return Error::NotFound {
                path: relative.to_path_buf(),
            };
        }
        Error::io_path("open", relative, err)
    })?;
    let meta = file
        .metadata()
        .map_err(|err| Error::io_path("metadata", relative, err))?;
    if !meta.is_file() {
        return Err(Error::NotFound {
            path: relative.to_path_buf(),
        });
    }
    Ok((file, meta))
}

/// Text read under a byte cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedText {
    pub text: String,
    /// `true` when the file held more than `max_bytes` bytes.
    pub truncated: bool,
    pub bytes_read: u64,
}

/// Reads at most `max_bytes` bytes and decodes them as UTF-8, replacing invalid sequences.
///
/// Never fails on encoding; a multi-byte character cut by the cap becomes `U+FFFD`.
pub fn read_bounded(path: &Path, relative: &Path, max_bytes: u64) -> Result<BoundedText> {
    let (file, _meta) = open_regular_file_for_read(path, relative)?;
    let limit = max_bytes.saturating_add(1);
    let mut bytes = Vec::<u8>::new();
    file.take(limit)
        .read_to_end(&mut bytes)
        .map_err(|err| Error::io_path("read", relative, err))?;

    let cap = usize::try_from(max_bytes).unwrap_or(usize::MAX);
    let truncated = bytes.len() > cap;
    if truncated {
        bytes.truncate(cap);
    }
    let bytes_read = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    Ok(BoundedText {
        text,
        truncated,
        bytes_read,
    })
}

/// Replaces `path` with `bytes` through a synced temp file in the same directory.
pub(crate) fn write_bytes_atomic(path: &Path, display: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| Error::io_path("create_dir", display, err))?;

    let mut tmp_file = tempfile::Builder::new()
        .prefix(".privacy-guard.")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|err| Error::io_path("create_temp", display, err))?;
    tmp_file
        .as_file_mut()
        .write_all(bytes)
        .map_err(|err| Error::io_path("write", display, err))?;
    tmp_file
        .as_file_mut()
        .sync_all()
        .map_err(|err| Error::io_path("sync", display, err))?;
    tmp_file
        .persist(path)
        .map_err(|err| Error::io_path("replace_file", display, err.error))?;
    sync_parent_directory(path).map_err(|err| Error::io_path("sync_dir", display, err))?;
    Ok(())
}

#[cfg(unix)]
fn sync_parent_directory(path: &Path) -> std::io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    let parent_dir = fs::File::open(parent)?;
    parent_dir.sync_all()
}

#[cfg(not(unix))]
fn sync_parent_directory(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_file_is_not_truncated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello").expect("write");

        let out = read_bounded(&path, Path::new("a.txt"), 10).expect("read");
        assert_eq!(out.text, "hello");
        assert!(!out.truncated);
        assert_eq!(out.bytes_read, 5);
    }

    #[test]
    fn exact_size_file_is_not_truncated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "0123456789").expect("write");

        let out = read_bounded(&path, Path::new("a.txt"), 10).expect("read");
        assert_eq!(out.text, "0123456789");
        assert!(!out.truncated);
    }

    #[test]
    fn long_file_is_truncated_to_cap() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "x".repeat(100)).expect("write");

        let out = read_bounded(&path, Path::new("a.txt"), 10).expect("read");
        assert_eq!(out.text, "x".repeat(10));
        assert!(out.truncated);
        assert_eq!(out.bytes_read, 10);
    }

    #[test]
    fn split_multibyte_character_is_replaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        // "é" is two bytes; the cap lands between them.
        std::fs::write(&path, "abé").expect("write");

        let out = read_bounded(&path, Path::new("a.txt"), 3).expect("read");
        assert_eq!(out.text, "ab\u{FFFD}");
        assert!(out.truncated);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.bin");
        std::fs::write(&path, [b'o', b'k', 0xff, b'!']).expect("write");

        let out = read_bounded(&path, Path::new("a.bin"), 1024).expect("read");
        assert_eq!(out.text, "ok\u{FFFD}!");
    }

    #[test]
    fn directory_is_not_a_readable_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        match read_bounded(dir.path(), Path::new("."), 10).expect_err("dir") {
            Error::NotFound { .. } | Error::IoPath { .. } => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/out.txt");
        write_bytes_atomic(&path, Path::new("out.txt"), b"first").expect("write");
        write_bytes_atomic(&path, Path::new("out.txt"), b"second").expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "second");

        let leftovers = std::fs::read_dir(dir.path().join("nested"))
            .expect("read_dir")
            .count();
        assert_eq!(leftovers, 1);
    }
}
