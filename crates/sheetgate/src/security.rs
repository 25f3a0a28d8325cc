//! Upload checks and text sanitizing
//!
//! The guard runs before any parsing: the file must be a ZIP package of
//! acceptable size, and the archive must satisfy the configured limits. XML
//! hardening (DOCTYPE rejection, inflate limits) lives in the XLSX reader and
//! applies to every part it opens.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{ImportError, Result};
use sheetgate_core::Workbook;
use sheetgate_xlsx::{ReadLimits, SheetEntry, XlsxError, XlsxReader};

/// Local file header signature of a ZIP archive
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
/// OLE compound file signature (legacy or encrypted workbooks)
const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

const MAX_FILENAME_CHARS: usize = 255;
const FALLBACK_FILENAME: &str = "upload.xlsx";

/// Characters that start a formula when typed into a cell
const FORMULA_TRIGGERS: [char; 7] = ['=', '+', '-', '@', '\t', '\r', '\n'];

/// Gatekeeper for uploaded workbooks
#[derive(Debug, Clone)]
pub struct SecurityGuard {
    max_file_bytes: u64,
    limits: ReadLimits,
}

impl SecurityGuard {
    pub fn new(max_file_bytes: u64, limits: ReadLimits) -> Self {
        Self {
            max_file_bytes,
            limits,
        }
    }

    /// Archive limits applied when opening files
    pub fn limits(&self) -> &ReadLimits {
        &self.limits
    }

    /// Check the leading bytes of an upload
    pub fn check_magic(header: &[u8]) -> Result<()> {
        if header.starts_with(&ZIP_MAGIC) {
            return Ok(());
        }
        if header.starts_with(&OLE_MAGIC) {
            return Err(ImportError::Security(
                "workbook is encrypted or in the legacy binary format".into(),
            ));
        }
        Err(ImportError::Security("not an XLSX workbook".into()))
    }

    /// Full pre-parse check of a file: size, signature and archive structure
    pub fn check_file(&self, path: &Path) -> Result<Vec<SheetEntry>> {
        let size = std::fs::metadata(path)?.len();
        self.check_size(size)?;

        let mut file = File::open(path)?;
        let mut header = [0u8; 4];
        let read = read_up_to(&mut file, &mut header)?;
        Self::check_magic(&header[..read])?;

        file.seek(SeekFrom::Start(0))?;
        self.check_package(BufReader::new(file), size)
    }

    /// Full pre-parse check of an upload held in memory
    pub fn check_bytes(&self, bytes: &[u8]) -> Result<Vec<SheetEntry>> {
        self.check_size(bytes.len() as u64)?;
        Self::check_magic(bytes)?;
        self.check_package(Cursor::new(bytes), bytes.len() as u64)
    }

    /// Read a workbook file that passed [`check_file`](Self::check_file)
    pub fn open_workbook(&self, path: &Path) -> Result<Workbook> {
        let file = File::open(path)?;
        self.read_workbook(BufReader::new(file))
    }

    /// Read a workbook under the configured archive limits
    pub fn read_workbook<R: Read + Seek>(&self, reader: R) -> Result<Workbook> {
        XlsxReader::read_with_limits(reader, &self.limits).map_err(hardening_error)
    }

    fn check_size(&self, size: u64) -> Result<()> {
        if size > self.max_file_bytes {
            return Err(ImportError::Security(format!(
                "file is {} bytes; the limit is {}",
                size, self.max_file_bytes
            )));
        }
        Ok(())
    }

    fn check_package<R: Read + Seek>(&self, reader: R, size: u64) -> Result<Vec<SheetEntry>> {
        let sheets = XlsxReader::sheet_entries(reader, &self.limits).map_err(hardening_error)?;
        log::debug!("security check passed: {} bytes, {} sheets", size, sheets.len());
        Ok(sheets)
    }

    /// Reduce a caller-supplied filename to a safe base name
    pub fn sanitize_filename(name: &str) -> String {
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        let cleaned: String = base
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| match c {
                '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
                c => c,
            })
            .take(MAX_FILENAME_CHARS)
            .collect();
        let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());

        if cleaned.is_empty() {
            FALLBACK_FILENAME.to_string()
        } else {
            cleaned.to_string()
        }
    }

    /// Make a value safe to use as one directory name
    pub fn sanitize_path_segment(segment: &str) -> String {
        let mut cleaned: String = segment
            .chars()
            .filter(|c| !c.is_control() && *c != '/' && *c != '\\' && *c != ':')
            .collect();
        while cleaned.contains("..") {
            cleaned = cleaned.replace("..", "");
        }
        let cleaned = cleaned.trim().trim_start_matches('.');

        if cleaned.is_empty() {
            "_".to_string()
        } else {
            cleaned.to_string()
        }
    }

    /// Strip control characters (line breaks and tabs survive) from text bound for storage
    pub fn sanitize_cell_text(text: &str) -> Cow<'_, str> {
        if !text.chars().any(is_stripped_control) {
            return Cow::Borrowed(text);
        }
        Cow::Owned(text.chars().filter(|c| !is_stripped_control(*c)).collect())
    }

    /// Quote text that a spreadsheet application would run as a formula
    pub fn escape_formula(text: &str) -> Cow<'_, str> {
        match text.chars().next() {
            Some(first) if FORMULA_TRIGGERS.contains(&first) => Cow::Owned(format!("'{}", text)),
            _ => Cow::Borrowed(text),
        }
    }
}

fn is_stripped_control(c: char) -> bool {
    c.is_control() && !matches!(c, '\n' | '\t')
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Hostile-input failures become security rejections; the rest pass through
pub(crate) fn hardening_error(err: XlsxError) -> ImportError {
    match err {
        XlsxError::Encrypted
        | XlsxError::LimitExceeded(_)
        | XlsxError::ForbiddenXml(_)
        | XlsxError::InvalidFormat(_)
        | XlsxError::Zip(_) => ImportError::Security(err.to_string()),
        other => ImportError::Xlsx(other),
    }
}
