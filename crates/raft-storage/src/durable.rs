//! # durable
//!
//! why: a write that silently lands short corrupts the only copy of consensus state
//! relations: used by term_store.rs and log_store.rs
//! what: write_checked, AppendFile, temp_path_for, sync_parent_dir

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use raft_core::{Error, Result};

/// Hand `buf` to a single `write` call and fail unless every byte was taken.
///
/// Deliberately not `write_all`: a partial write is reported, never retried.
pub(crate) fn write_checked<W: Write>(writer: &mut W, buf: &[u8], path: &Path) -> Result<()> {
    let written = writer
        .write(buf)
        .map_err(|e| Error::io("write", path, e))?;
    if written != buf.len() {
        return Err(Error::WriteIntegrity {
            path: path.to_path_buf(),
            written,
            expected: buf.len(),
        });
    }
    Ok(())
}

/// A file that an append can be rolled back on
pub(crate) trait AppendFile: Write {
    fn current_len(&self) -> io::Result<u64>;

    fn truncate_to(&mut self, len: u64) -> io::Result<()>;

    fn sync(&mut self) -> io::Result<()>;
}

impl AppendFile for File {
    fn current_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Sibling file used to stage a replacement, e.g. `term.bin` -> `term.bin.tmp`
pub(crate) fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Make a rename inside `path`'s directory durable.
#[cfg(unix)]
pub(crate) fn sync_parent_dir(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| Error::io("sync directory", dir, e))
}

#[cfg(not(unix))]
pub(crate) fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// accepts at most `limit` bytes per call
    struct ShortWriter {
        limit: usize,
        taken: Vec<u8>,
    }

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(self.limit);
            self.taken.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "device gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn full_write_succeeds() {
        let mut sink = Vec::new();
        write_checked(&mut sink, b"abcdef", Path::new("log")).unwrap();
        assert_eq!(sink, b"abcdef");
    }

    #[test]
    fn short_write_is_an_integrity_error() {
        let mut writer = ShortWriter {
            limit: 4,
            taken: Vec::new(),
        };
        let err = write_checked(&mut writer, b"abcdef", Path::new("log")).unwrap_err();
        match err {
            Error::WriteIntegrity {
                written, expected, ..
            } => {
                assert_eq!(written, 4);
                assert_eq!(expected, 6);
            }
            other => panic!("expected WriteIntegrity, got {other:?}"),
        }
        // no retry of the remainder
        assert_eq!(writer.taken, b"abcd");
    }

    #[test]
    fn failed_write_is_io_error_with_path() {
        let err = write_checked(&mut BrokenWriter, b"x", Path::new("/data/log")).unwrap_err();
        assert!(matches!(err, Error::Io { operation: "write", .. }));
        assert!(err.to_string().contains("/data/log"));
    }

    #[test]
    fn temp_path_is_a_sibling() {
        assert_eq!(
            temp_path_for(Path::new("/data/term.bin")),
            PathBuf::from("/data/term.bin.tmp")
        );
    }
}
