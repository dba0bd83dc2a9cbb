//! Content extraction for uploaded files.
//!
//! Turns the bytes of an upload into [`ExtractedContent`]: plain text for
//! documents (TXT, PDF) or a [`Table`] for tabular files (CSV, XLSX). The
//! kind is chosen from the file extension, case-insensitively.
//!
//! Failures are [`ExtractError`]s whose `Display` text is meant to be shown
//! to the user as-is; callers do not interpret them.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::models::ExtractedContent;
use crate::table::Table;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum cells to read from a worksheet.
const XLSX_MAX_CELLS: usize = 1_000_000;
/// Columns in a worksheet (`A` through `XFD`).
const XLSX_MAX_COLUMNS: usize = 16_384;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported file type")]
    UnsupportedFileType,

    #[error("File is not valid UTF-8 text: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("No readable text found in PDF")]
    EmptyPdf,

    #[error("XLSX extraction failed: {0}")]
    Ooxml(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Upload kinds recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Csv,
    Xlsx,
    Pdf,
}

impl FileKind {
    /// Kind for `file_name`, or `None` when unsupported.
    pub fn from_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::Text),
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Extract content from the bytes of an upload named `file_name`.
pub fn ingest_bytes(file_name: &str, bytes: &[u8]) -> Result<ExtractedContent, ExtractError> {
    let kind = FileKind::from_name(file_name).ok_or(ExtractError::UnsupportedFileType)?;
    match kind {
        FileKind::Text => Ok(ExtractedContent::Document {
            text: String::from_utf8(bytes.to_vec())?,
        }),
        FileKind::Csv => Ok(ExtractedContent::Table(parse_csv(bytes)?)),
        FileKind::Xlsx => Ok(ExtractedContent::Table(parse_xlsx(bytes)?)),
        FileKind::Pdf => Ok(ExtractedContent::Document {
            text: extract_pdf(bytes)?,
        }),
    }
}

/// Read `path` and extract it, using its file name for kind detection.
pub fn ingest_path(path: &Path) -> Result<ExtractedContent, ExtractError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(ExtractError::UnsupportedFileType)?;
    let bytes = std::fs::read(path)?;
    ingest_bytes(name, &bytes)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::EmptyPdf);
    }
    Ok(text.to_string())
}

fn parse_csv(bytes: &[u8]) -> Result<Table, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::new(columns, rows))
}

// ============ XLSX ============

type XlsxArchive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn ooxml<E: std::fmt::Display>(e: E) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

fn parse_xlsx(bytes: &[u8]) -> Result<Table, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(ooxml)?;

    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        read_shared_strings(&mut archive)?
    } else {
        Vec::new()
    };

    let sheet = first_worksheet_name(&archive)
        .ok_or_else(|| ExtractError::Ooxml("workbook has no worksheets".to_string()))?;
    let sheet_xml = read_zip_entry_bounded(&mut archive, &sheet, MAX_XML_ENTRY_BYTES)?;
    let mut grid = read_sheet_rows(&sheet_xml, &shared_strings)?;

    if grid.is_empty() {
        return Ok(Table::default());
    }
    let columns = grid.remove(0);
    Ok(Table::new(columns, grid))
}

fn read_zip_entry_bounded(
    archive: &mut XlsxArchive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(ooxml)?;
    let mut out = Vec::new();
    entry.take(max_bytes).read_to_end(&mut out)?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

/// Lowest-numbered `xl/worksheets/sheetN.xml`.
fn first_worksheet_name(archive: &XlsxArchive<'_>) -> Option<String> {
    archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .min_by_key(|name| {
            name.trim_start_matches("xl/worksheets/sheet")
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        })
        .map(str::to_string)
}

/// Each `<si>` becomes one string; rich-text runs (`<r><t>`) are concatenated.
fn read_shared_strings(archive: &mut XlsxArchive<'_>) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Event::Text(te) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().map_err(ooxml)?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// Zero-based column index from a cell reference such as `"AB12"`.
///
/// `Ok(None)` when the reference has no column letters. Columns past `XFD`
/// are rejected.
fn column_index(cell_ref: &str) -> Result<Option<usize>, ExtractError> {
    let letters = cell_ref.bytes().take_while(|b| b.is_ascii_alphabetic());
    let mut n = 0usize;
    let mut any = false;
    for b in letters {
        any = true;
        let digit = (b.to_ascii_uppercase() - b'A' + 1) as usize;
        n = n
            .checked_mul(26)
            .and_then(|v| v.checked_add(digit))
            .filter(|&v| v <= XLSX_MAX_COLUMNS)
            .ok_or_else(|| column_out_of_range(cell_ref))?;
    }
    Ok(any.then(|| n - 1))
}

fn column_out_of_range(cell_ref: &str) -> ExtractError {
    ExtractError::Ooxml(format!(
        "cell reference {} is beyond the last column (XFD)",
        cell_ref
    ))
}

#[derive(Clone, Copy, PartialEq)]
enum CellType {
    Shared,
    Inline,
    Other,
}

/// Read `<row>`/`<c>` elements into a dense grid of strings.
fn read_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    use quick_xml::events::Event;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut in_row = false;
    let mut col = 0usize;
    let mut cell_type = CellType::Other;
    let mut capture = false;
    let mut value = String::new();
    let mut cells = 0usize;

    loop {
        match reader.read_event_into(&mut buf).map_err(ooxml)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    in_row = true;
                    row = Vec::new();
                    col = 0;
                }
                b"c" if in_row => {
                    cell_type = CellType::Other;
                    value.clear();
                    for attr in e.attributes().flatten() {
                        match attr.key.local_name().as_ref() {
                            b"r" => {
                                if let Some(idx) =
                                    column_index(&String::from_utf8_lossy(&attr.value))?
                                {
                                    col = idx;
                                }
                            }
                            b"t" => {
                                cell_type = match attr.value.as_ref() {
                                    b"s" => CellType::Shared,
                                    b"inlineStr" => CellType::Inline,
                                    _ => CellType::Other,
                                };
                            }
                            _ => {}
                        }
                    }
                }
                b"v" => capture = true,
                b"t" if cell_type == CellType::Inline => capture = true,
                _ => {}
            },
            Event::Text(te) if capture => {
                value.push_str(&te.unescape().map_err(ooxml)?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" if in_row => {
                    let text = match cell_type {
                        CellType::Shared => value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared_strings.get(i).cloned())
                            .unwrap_or_default(),
                        CellType::Inline | CellType::Other => value.clone(),
                    };
                    if col >= XLSX_MAX_COLUMNS {
                        return Err(ExtractError::Ooxml(format!(
                            "row has more than {} columns",
                            XLSX_MAX_COLUMNS
                        )));
                    }
                    if row.len() <= col {
                        row.resize(col + 1, String::new());
                    }
                    row[col] = text;
                    col += 1;
                    cells += 1;
                    if cells >= XLSX_MAX_CELLS {
                        rows.push(std::mem::take(&mut row));
                        break;
                    }
                }
                b"row" => {
                    in_row = false;
                    rows.push(std::mem::take(&mut row));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn xlsx_with_sheet(sheet_xml: &str, shared: Option<&str>) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            let opts = zip::write::SimpleFileOptions::default();
            if let Some(shared) = shared {
                zip.start_file("xl/sharedStrings.xml", opts).unwrap();
                zip.write_all(shared.as_bytes()).unwrap();
            }
            zip.start_file("xl/worksheets/sheet1.xml", opts).unwrap();
            zip.write_all(sheet_xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    /// Minimal single-page PDF showing `phrase`, with correct xref offsets.
    fn minimal_pdf(phrase: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                stream.len(),
                stream
            )
            .as_bytes(),
        );
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for off in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn test_kind_from_name_is_case_insensitive() {
        assert_eq!(FileKind::from_name("Report.PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_name("data.Csv"), Some(FileKind::Csv));
        assert_eq!(FileKind::from_name("sheet.xlsx"), Some(FileKind::Xlsx));
        assert_eq!(FileKind::from_name("notes.txt"), Some(FileKind::Text));
        assert_eq!(FileKind::from_name("slides.pptx"), None);
        assert_eq!(FileKind::from_name("README"), None);
    }

    #[test]
    fn test_unsupported_type() {
        let err = ingest_bytes("image.png", b"\x89PNG").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFileType));
        assert_eq!(err.to_string(), "Unsupported file type");
    }

    #[test]
    fn test_txt_is_document() {
        let content = ingest_bytes("notes.txt", "héllo\nworld".as_bytes()).unwrap();
        assert_eq!(
            content,
            ExtractedContent::Document {
                text: "héllo\nworld".to_string()
            }
        );
    }

    #[test]
    fn test_txt_invalid_utf8() {
        let err = ingest_bytes("notes.txt", &[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, ExtractError::InvalidUtf8(_)));
    }

    #[test]
    fn test_csv_is_table() {
        let csv = "name,age,city\nAda,36,London\nGrace,,Arlington\nLinus,54\n";
        let content = ingest_bytes("people.csv", csv.as_bytes()).unwrap();
        let table = match content {
            ExtractedContent::Table(t) => t,
            other => panic!("expected table, got {:?}", other),
        };
        assert_eq!(table.columns, vec!["name", "age", "city"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.rows[1], vec!["Grace", "", "Arlington"]);
        assert_eq!(table.rows[2], vec!["Linus", "54"]);
    }

    #[test]
    fn test_invalid_pdf() {
        let err = ingest_bytes("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_pdf_text() {
        let content = ingest_bytes("memo.pdf", &minimal_pdf("quarterly revenue grew")).unwrap();
        match content {
            ExtractedContent::Document { text } => {
                assert!(text.contains("quarterly revenue grew"), "got: {:?}", text)
            }
            other => panic!("expected document, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_zip_for_xlsx() {
        let err = ingest_bytes("book.xlsx", b"not a zip").unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn test_xlsx_shared_inline_and_numeric_cells() {
        let shared = r#"<?xml version="1.0"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>product</t></si><si><t>price</t></si><si><r><t>Wid</t></r><r><t>get</t></r></si><si><t>Gadget</t></si></sst>"#;
        let sheet = r#"<?xml version="1.0"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>note</t></is></c></row>
<row r="2"><c r="A2" t="s"><v>2</v></c><c r="B2"><v>9.5</v></c></row>
<row r="3"><c r="A3" t="s"><v>3</v></c><c r="C3" t="inlineStr"><is><t>on sale</t></is></c></row>
</sheetData></worksheet>"#;
        let content = ingest_bytes("stock.xlsx", &xlsx_with_sheet(sheet, Some(shared))).unwrap();
        let table = match content {
            ExtractedContent::Table(t) => t,
            other => panic!("expected table, got {:?}", other),
        };
        assert_eq!(table.columns, vec!["product", "price", "note"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Widget", "9.5"]);
        assert_eq!(table.rows[1], vec!["Gadget", "", "on sale"]);
    }

    #[test]
    fn test_xlsx_without_shared_strings() {
        let sheet = r#"<worksheet><sheetData><row><c t="inlineStr"><is><t>qty</t></is></c></row><row><c><v>3</v></c></row></sheetData></worksheet>"#;
        let content = ingest_bytes("q.xlsx", &xlsx_with_sheet(sheet, None)).unwrap();
        assert_eq!(
            content,
            ExtractedContent::Table(Table::new(vec!["qty".into()], vec![vec!["3".into()]]))
        );
    }

    #[test]
    fn test_xlsx_column_beyond_sheet_limit_is_rejected() {
        for cell_ref in ["ZZZZZZZZZZZZZZ1", "ZZZZZZ1", "XFE1"] {
            let sheet = format!(
                r#"<worksheet><sheetData><row><c r="{}" t="inlineStr"><is><t>x</t></is></c></row></sheetData></worksheet>"#,
                cell_ref
            );
            let err = ingest_bytes("wide.xlsx", &xlsx_with_sheet(&sheet, None)).unwrap_err();
            match err {
                ExtractError::Ooxml(msg) => assert!(msg.contains(cell_ref), "{}", msg),
                other => panic!("expected Ooxml error for {}, got {:?}", cell_ref, other),
            }
        }
    }

    #[test]
    fn test_xlsx_last_column_is_accepted() {
        let sheet = r#"<worksheet><sheetData><row><c r="XFD1" t="inlineStr"><is><t>edge</t></is></c></row></sheetData></worksheet>"#;
        let content = ingest_bytes("edge.xlsx", &xlsx_with_sheet(sheet, None)).unwrap();
        match content {
            ExtractedContent::Table(t) => {
                assert_eq!(t.columns.len(), 16_384);
                assert_eq!(t.columns[16_383], "edge");
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_column_index() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("Z9").unwrap(), Some(25));
        assert_eq!(column_index("AA10").unwrap(), Some(26));
        assert_eq!(column_index("ab3").unwrap(), Some(27));
        assert_eq!(column_index("XFD1").unwrap(), Some(16_383));
        assert_eq!(column_index("12").unwrap(), None);
        assert!(column_index("XFE1").is_err());
        assert!(column_index("ZZZZZZZZZZZZZZ1").is_err());
    }

    #[test]
    fn test_ingest_path_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.TXT");
        std::fs::write(&path, "solar energy").unwrap();
        let content = ingest_path(&path).unwrap();
        assert_eq!(
            content,
            ExtractedContent::Document {
                text: "solar energy".to_string()
            }
        );
    }
}
