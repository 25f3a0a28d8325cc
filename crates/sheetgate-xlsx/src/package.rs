//! Opening an XLSX package and locating its parts

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};

use quick_xml::events::Event;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{XlsxError, XlsxResult};
use crate::limits::{LimitedReader, ReadLimits};
use crate::xml::{attr_bool, attr_string, part_reader};

/// Signature of an OLE compound file, the container of encrypted workbooks
const OLE_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";

/// A sheet as listed in workbook.xml
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    /// Sheet name
    pub name: String,
    /// Archive path of the worksheet part
    pub path: String,
    /// `false` for hidden and very hidden sheets
    pub visible: bool,
}

/// Workbook-level facts needed before reading any sheet
#[derive(Debug, Clone, Default)]
pub(crate) struct WorkbookInfo {
    pub sheets: Vec<SheetEntry>,
    pub date1904: bool,
}

/// Open an archive after rejecting OLE containers and checking limits
pub(crate) fn open_archive<R: Read + Seek>(
    mut reader: R,
    limits: &ReadLimits,
) -> XlsxResult<ZipArchive<R>> {
    let mut magic = [0u8; 4];
    let n = read_prefix(&mut reader, &mut magic)?;
    if n == magic.len() && magic == OLE_MAGIC {
        return Err(XlsxError::Encrypted);
    }
    reader.seek(SeekFrom::Start(0))?;

    let mut archive = ZipArchive::new(reader).map_err(|e| match e {
        ZipError::InvalidArchive(msg) | ZipError::UnsupportedArchive(msg) => {
            XlsxError::InvalidFormat(msg.to_string())
        }
        other => XlsxError::Zip(other),
    })?;
    limits.check_archive(&mut archive)?;
    Ok(archive)
}

fn read_prefix<R: Read>(reader: &mut R, buf: &mut [u8]) -> XlsxResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Open a part for streaming, bounded by the per-entry limit
pub(crate) fn open_part<'a, R: Read + Seek>(
    archive: &'a mut ZipArchive<R>,
    name: &str,
    limits: &ReadLimits,
) -> XlsxResult<Option<BufReader<LimitedReader<ZipFile<'a>>>>> {
    match archive.by_name(name) {
        Ok(file) => Ok(Some(BufReader::new(LimitedReader::new(
            file,
            limits.max_entry_size,
        )))),
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read workbook.xml and its relationships
pub(crate) fn read_workbook_info<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    limits: &ReadLimits,
) -> XlsxResult<WorkbookInfo> {
    let rels = match open_part(archive, WORKBOOK_RELS_PART, limits)? {
        Some(reader) => read_worksheet_rels(reader)?,
        None => HashMap::new(),
    };

    let reader = open_part(archive, WORKBOOK_PART, limits)?
        .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.into()))?;
    let mut xml = part_reader(reader, true);
    let mut buf = Vec::new();
    let mut info = WorkbookInfo::default();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::DocType(_)) => return Err(XlsxError::ForbiddenXml(WORKBOOK_PART.into())),
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"workbookPr" => info.date1904 = attr_bool(&e, b"date1904"),
                b"sheet" => {
                    let index = info.sheets.len();
                    let name = attr_string(&e, b"name")
                        .unwrap_or_else(|| format!("Sheet{}", index + 1));
                    let path = attr_string(&e, b"r:id")
                        .and_then(|id| rels.get(&id).cloned())
                        .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));
                    let visible = !matches!(
                        attr_string(&e, b"state").as_deref(),
                        Some("hidden") | Some("veryHidden")
                    );
                    info.sheets.push(SheetEntry {
                        name,
                        path,
                        visible,
                    });
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(info)
}

/// Map relationship ids to worksheet part paths
fn read_worksheet_rels<B: BufRead>(reader: B) -> XlsxResult<HashMap<String, String>> {
    let mut xml = part_reader(reader, true);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match xml.read_event_into(&mut buf) {
            Ok(Event::DocType(_)) => {
                return Err(XlsxError::ForbiddenXml(WORKBOOK_RELS_PART.into()))
            }
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                let is_sheet = attr_string(&e, b"Type")
                    .map_or(false, |t| t.ends_with("/worksheet"));
                if let (true, Some(id), Some(target)) =
                    (is_sheet, attr_string(&e, b"Id"), attr_string(&e, b"Target"))
                {
                    rels.insert(id, resolve_target(&target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(XlsxError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(rels)
}

/// Turn a relationship target relative to `xl/` into an archive path
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target.trim_start_matches("./")),
    }
}
