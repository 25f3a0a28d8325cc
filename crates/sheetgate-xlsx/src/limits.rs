//! Archive limits enforced before and while inflating parts
//!
//! Sizes declared in the ZIP central directory are checked up front. The
//! [`LimitedReader`] then counts the bytes actually inflated, so an entry that
//! lies about its size is stopped at the limit instead of filling memory.

use std::io::{self, Read, Seek};

use zip::ZipArchive;

use crate::error::{XlsxError, XlsxResult};

/// Bounds applied to every archive opened by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    /// Maximum number of entries in the archive
    pub max_entries: usize,
    /// Maximum uncompressed size of a single entry, in bytes
    pub max_entry_size: u64,
    /// Maximum uncompressed size of all entries together, in bytes
    pub max_total_size: u64,
    /// Maximum ratio of uncompressed to compressed size for any entry
    pub max_compression_ratio: u64,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_entry_size: 512 * 1024 * 1024,
            max_total_size: 1024 * 1024 * 1024,
            max_compression_ratio: 100,
        }
    }
}

/// Entries smaller than this are exempt from the ratio check; tiny XML parts compress very well.
const RATIO_EXEMPT_BYTES: u64 = 64 * 1024;

impl ReadLimits {
    /// Limits that accept anything; for trusted, self-produced files
    pub fn unlimited() -> Self {
        Self {
            max_entries: usize::MAX,
            max_entry_size: u64::MAX,
            max_total_size: u64::MAX,
            max_compression_ratio: u64::MAX,
        }
    }

    /// Check the central directory of an archive against these limits
    pub fn check_archive<R: Read + Seek>(&self, archive: &mut ZipArchive<R>) -> XlsxResult<()> {
        if archive.len() > self.max_entries {
            return Err(XlsxError::LimitExceeded(format!(
                "{} entries (max {})",
                archive.len(),
                self.max_entries
            )));
        }

        let mut total: u64 = 0;
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            let size = entry.size();
            let compressed = entry.compressed_size();

            if size > self.max_entry_size {
                return Err(XlsxError::LimitExceeded(format!(
                    "entry '{}' is {} bytes (max {})",
                    entry.name(),
                    size,
                    self.max_entry_size
                )));
            }
            if size > RATIO_EXEMPT_BYTES && size / compressed.max(1) > self.max_compression_ratio {
                return Err(XlsxError::LimitExceeded(format!(
                    "entry '{}' has compression ratio {} (max {})",
                    entry.name(),
                    size / compressed.max(1),
                    self.max_compression_ratio
                )));
            }

            total = total.saturating_add(size);
            if total > self.max_total_size {
                return Err(XlsxError::LimitExceeded(format!(
                    "total uncompressed size exceeds {} bytes",
                    self.max_total_size
                )));
            }
        }

        log::debug!(
            "archive accepted: {} entries, {} bytes uncompressed",
            archive.len(),
            total
        );
        Ok(())
    }
}

/// Reader that fails once more than `limit` bytes have been read
pub struct LimitedReader<R> {
    inner: R,
    remaining: u64,
    limit: u64,
}

impl<R: Read> LimitedReader<R> {
    /// Wrap a reader with a byte limit
    pub fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
            limit,
        }
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            // An entry of exactly `limit` bytes is fine; one more byte is not.
            let mut extra = [0u8; 1];
            return match self.inner.read(&mut extra)? {
                0 => Ok(0),
                _ => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("part inflates beyond {} bytes", self.limit),
                )),
            };
        }

        let max = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn archive_with(name: &str, data: &[u8]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
            zip.finish().unwrap();
        }
        ZipArchive::new(Cursor::new(buf)).unwrap()
    }

    #[test]
    fn test_limited_reader_stops_at_limit() {
        let mut exact = LimitedReader::new(Cursor::new(vec![1u8; 16]), 16);
        let mut out = Vec::new();
        assert_eq!(exact.read_to_end(&mut out).unwrap(), 16);

        let mut over = LimitedReader::new(Cursor::new(vec![1u8; 17]), 16);
        let err = over.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_check_archive_rejects_high_ratio() {
        let mut archive = archive_with("xl/worksheets/sheet1.xml", &vec![b'a'; 4 * 1024 * 1024]);
        let err = ReadLimits::default().check_archive(&mut archive).unwrap_err();
        assert!(matches!(err, XlsxError::LimitExceeded(_)));

        assert!(ReadLimits::unlimited().check_archive(&mut archive).is_ok());
    }

    #[test]
    fn test_check_archive_rejects_entry_count_and_size() {
        let mut archive = archive_with("a.xml", b"<a/>");
        let few = ReadLimits {
            max_entries: 0,
            ..ReadLimits::default()
        };
        assert!(few.check_archive(&mut archive).is_err());

        let small = ReadLimits {
            max_entry_size: 2,
            ..ReadLimits::default()
        };
        assert!(small.check_archive(&mut archive).is_err());
        assert!(ReadLimits::default().check_archive(&mut archive).is_ok());
    }
}
